//! Pipeline – ties together parsing, styling, layout, pagination, and
//! rendering, and on top of that the order → HTML → PDF → file flow.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::assets::ImageStore;
use crate::dom::{body_children, body_element, collect_stylesheets, document_title, parse_html};
use crate::error::{InvoiceError, RenderError};
use crate::format::AssetDir;
use crate::layout::compute_layout;
use crate::layout_config::LayoutConfig;
use crate::order::{Order, Shop};
use crate::output::{downloads_dir, write_invoice};
use crate::pagination::{paginate, PAGE_MARGIN_PT};
use crate::render::render_pdf_with_images;
use crate::style::{build_styled_element, build_styled_tree, StyledNode, Stylesheet};
use crate::templates::InvoiceRenderer;

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageOrientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

/// Geometry and metadata of the generated PDF.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Document title embedded in the PDF metadata (default: "Invoice").
    /// When empty, the document's own `<title>` is used.
    pub title: String,
    /// Page width in points (default: A4 = 595.28).
    pub page_width: f32,
    /// Page height in points (default: A4 = 841.89).
    pub page_height: f32,
    /// Page margin in points (default: 40).
    pub page_margin: f32,
    /// Page orientation; swaps effective width/height when `Landscape`.
    pub orientation: PageOrientation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title: "Invoice".to_string(),
            page_width: 595.28,
            page_height: 841.89,
            page_margin: PAGE_MARGIN_PT,
            orientation: PageOrientation::Portrait,
        }
    }
}

impl PipelineConfig {
    /// Effective page width after applying orientation.
    pub fn effective_width(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_width,
            PageOrientation::Landscape => self.page_height,
        }
    }

    /// Effective page height after applying orientation.
    pub fn effective_height(&self) -> f32 {
        match self.orientation {
            PageOrientation::Portrait => self.page_height,
            PageOrientation::Landscape => self.page_width,
        }
    }

    pub fn a4_landscape() -> Self {
        Self {
            orientation: PageOrientation::Landscape,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// HTML → PDF
// ---------------------------------------------------------------------------

/// Parse + style + lay out + paginate, keeping the decoded images around
/// for the render step.
fn layout_document(
    html: &str,
    config: &PipelineConfig,
    images: &mut ImageStore,
) -> Result<LayoutConfig, RenderError> {
    // 1. Parse HTML
    let dom = parse_html(html)?;

    // 2. Build styled tree
    let sheet = Stylesheet::parse(&collect_stylesheets(&dom));
    let styled: Vec<StyledNode> = match body_element(&dom) {
        Some(body) => vec![build_styled_element(body, &sheet)],
        None => build_styled_tree(&body_children(&dom), None, &sheet),
    };

    // 3. Compute layout
    let eff_w = config.effective_width();
    let eff_h = config.effective_height();
    let boxes = compute_layout(&styled, eff_w, config.page_margin, images)?;

    // 4. Paginate
    let title = if config.title.is_empty() {
        document_title(&dom).unwrap_or_default()
    } else {
        config.title.clone()
    };
    Ok(paginate(&boxes, eff_w, eff_h, config.page_margin, &title))
}

/// Full pipeline: HTML string → PDF bytes.
///
/// Returns the PDF together with the layout it was rendered from.
pub fn generate_pdf(
    html: &str,
    config: &PipelineConfig,
) -> Result<(Vec<u8>, LayoutConfig), RenderError> {
    let mut images = ImageStore::new();
    let layout_config = layout_document(html, config, &mut images)?;

    // 5. Render PDF
    let pdf_bytes = render_pdf_with_images(&layout_config, &mut images)?;
    Ok((pdf_bytes, layout_config))
}

/// Convenience: generate PDF with default A4 config.
pub fn generate_pdf_from_html(html: &str) -> Result<Vec<u8>, RenderError> {
    let (bytes, _) = generate_pdf(html, &PipelineConfig::default())?;
    Ok(bytes)
}

/// Generate only the layout config (no PDF rendering).
pub fn compute_layout_config(html: &str, config: &PipelineConfig) -> Result<LayoutConfig, RenderError> {
    layout_document(html, config, &mut ImageStore::new())
}

// ---------------------------------------------------------------------------
// Order → file
// ---------------------------------------------------------------------------

/// Order → HTML → PDF → Downloads.
///
/// ```no_run
/// use invoice_forge::order::{sample_order, sample_shop};
/// use invoice_forge::InvoicePipeline;
///
/// let path = InvoicePipeline::default()
///     .with_output_dir("/tmp")
///     .run(&sample_order(), &sample_shop())?;
/// println!("{}", path.display());
/// # Ok::<(), invoice_forge::InvoiceError>(())
/// ```
#[derive(Clone)]
pub struct InvoicePipeline {
    pub assets: AssetDir,
    /// Where the PDF goes; `None` means the Downloads directory.
    pub output_dir: Option<PathBuf>,
    /// Page geometry. The title is replaced per order by [`render_pdf`](Self::render_pdf).
    pub pdf: PipelineConfig,
    /// Locates Downloads when `output_dir` is `None`.
    downloads: DownloadsResolver,
}

type DownloadsResolver = Arc<dyn Fn() -> Result<PathBuf, InvoiceError> + Send + Sync>;

impl Default for InvoicePipeline {
    fn default() -> Self {
        Self {
            assets: AssetDir::default(),
            output_dir: None,
            pdf: PipelineConfig::default(),
            downloads: Arc::new(downloads_dir),
        }
    }
}

impl fmt::Debug for InvoicePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvoicePipeline")
            .field("assets", &self.assets)
            .field("output_dir", &self.output_dir)
            .field("pdf", &self.pdf)
            .finish_non_exhaustive()
    }
}

impl InvoicePipeline {
    pub fn with_assets(mut self, assets: AssetDir) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Replace the user's Downloads lookup (see [`downloads_dir`]).
    pub fn with_downloads_resolver(
        mut self,
        resolve: impl Fn() -> Result<PathBuf, InvoiceError> + Send + Sync + 'static,
    ) -> Self {
        self.downloads = Arc::new(resolve);
        self
    }

    pub fn with_pdf_config(mut self, pdf: PipelineConfig) -> Self {
        self.pdf = pdf;
        self
    }

    pub fn render_html(&self, order: &Order, shop: &Shop) -> Result<String, InvoiceError> {
        InvoiceRenderer::with_assets(self.assets.clone())?.render(order, shop)
    }

    pub fn render_pdf(&self, order: &Order, shop: &Shop) -> Result<Vec<u8>, InvoiceError> {
        let html = self.render_html(order, shop)?;
        let config = PipelineConfig {
            title: format!("Invoice {}", order.order_number),
            ..self.pdf.clone()
        };
        let (bytes, layout) = generate_pdf(&html, &config)?;
        log::debug!(
            "rendered {} page(s), {} bytes of PDF",
            layout.pages.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Produce the invoice PDF for `order` and write it to disk. Returns the
    /// absolute path of the written file.
    pub fn run(&self, order: &Order, shop: &Shop) -> Result<PathBuf, InvoiceError> {
        log::debug!("generating invoice {}", order.order_number);
        let bytes = self.render_pdf(order, shop)?;

        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => (self.downloads)()?,
        };
        log::debug!("writing invoice into {}", dir.display());
        write_invoice(&dir, &order.order_number, &bytes)
    }
}
