//! Integration tests for the invoice pipeline.
//!
//! These tests validate:
//! - The sample order renders to a complete invoice (HTML and PDF)
//! - The PDF lands in the requested directory under the expected name
//! - Layout config carries the invoice text, styling and pagination
//! - Failures surface with the right stage

use std::fs;

use invoice_forge::dom::{parse_html, DomNode, Tag};
use invoice_forge::layout_config::{LayoutBox, LayoutConfig};
use invoice_forge::order::{sample_order, sample_shop, LineItem, Order};
use invoice_forge::pipeline::{compute_layout_config, generate_pdf, PipelineConfig};
use invoice_forge::render::render_pdf;
use invoice_forge::{AssetDir, InvoiceError, InvoicePipeline, InvoiceRenderer, RenderError};

// =====================================================================
// Helpers
// =====================================================================

fn assets() -> AssetDir {
    AssetDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static"))
}

fn pipeline() -> InvoicePipeline {
    InvoicePipeline::default().with_assets(assets())
}

fn sample_html() -> String {
    pipeline().render_html(&sample_order(), &sample_shop()).unwrap()
}

fn sample_layout() -> LayoutConfig {
    compute_layout_config(&sample_html(), &PipelineConfig::default()).unwrap()
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(0);
    assert!(bytes[..end].ends_with(b"%%EOF"), "Missing %%EOF trailer");
}

/// Read the PDF back and return its pages.
fn parse_pdf(bytes: &[u8]) -> printpdf::PdfDocument {
    let mut warnings = Vec::new();
    printpdf::PdfDocument::parse(bytes, &printpdf::PdfParseOptions::default(), &mut warnings)
        .unwrap_or_else(|e| panic!("PDF does not parse: {e}"))
}

fn find_box_with_text<'a>(config: &'a LayoutConfig, needle: &str) -> &'a LayoutBox {
    config
        .boxes()
        .find(|b| {
            b.text
                .as_ref()
                .map(|t| t.plain_text().contains(needle))
                .unwrap_or(false)
        })
        .unwrap_or_else(|| panic!("no box containing {needle:?}"))
}

// =====================================================================
// End to end
// =====================================================================

#[test]
fn sample_invoice_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = pipeline()
        .with_output_dir(dir.path())
        .run(&sample_order(), &sample_shop())
        .unwrap();

    assert_eq!(path.file_name().unwrap(), "invoice_INV-1001.pdf");
    assert_eq!(path.parent().unwrap(), dir.path());
    assert!(path.is_absolute());
    let bytes = fs::read(&path).unwrap();
    assert_valid_pdf(&bytes);

    let doc = parse_pdf(&bytes);
    assert_eq!(doc.pages.len(), sample_layout().pages.len());
    assert!(doc.pages[0]
        .ops
        .iter()
        .any(|op| matches!(op, printpdf::Op::StartTextSection)));
}

#[test]
fn sample_invoice_html() {
    let html = sample_html();
    for needle in ["Tax Invoice", "Order Details", "FREE", "$115.00"] {
        assert!(html.contains(needle), "missing {needle:?}");
    }
    assert_eq!(html.matches("text-decoration: line-through").count(), 1);
}

#[test]
fn rendered_html_is_well_formed() {
    let dom = parse_html(&sample_html()).unwrap();
    let html = dom
        .iter()
        .find_map(|n| match n {
            DomNode::Element(e) if e.tag == Tag::Html => Some(e),
            _ => None,
        })
        .expect("<html> root");
    assert!(html
        .children
        .iter()
        .any(|n| matches!(n, DomNode::Element(e) if e.tag == Tag::Body)));
}

#[test]
fn missing_output_dir_is_output_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = pipeline()
        .with_output_dir(dir.path().join("nope"))
        .run(&sample_order(), &sample_shop())
        .unwrap_err();
    assert_eq!(err.stage(), "output");
    assert!(!dir.path().join("nope").exists());
}

#[test]
fn missing_logo_is_pdf_stage_error() {
    let empty = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let err = InvoicePipeline::default()
        .with_assets(AssetDir::new(empty.path()))
        .with_output_dir(out.path())
        .run(&sample_order(), &sample_shop())
        .unwrap_err();
    assert!(
        matches!(err, InvoiceError::Render(RenderError::Asset { .. })),
        "{err}"
    );
    assert_eq!(err.stage(), "pdf");
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

// =====================================================================
// Layout of the rendered invoice
// =====================================================================

#[test]
fn invoice_layout_text() {
    let config = sample_layout();
    let text = config.text_lines().join("\n");
    for needle in [
        "FOR ALL THINGS TECH",
        "Tax Invoice",
        "Invoice Number: INV-1001",
        "PO: PO-7890",
        "Invoice Date: 2025-07-01",
        "ABN: 90",
        "Order Details",
        "Keyboard",
        "10% Off (-$10.00)",
        "Subtotal",
        "$110.00",
        "FREE",
        "Total Paid",
        "Deliver ASAP.",
        "accounts@bits-mart.com",
    ] {
        assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
    }
    assert!(!text.contains("$0.00"));
}

#[test]
fn invoice_stays_inside_the_page() {
    let config = sample_layout();
    assert!(!config.pages.is_empty());
    for b in config.boxes() {
        assert!(b.x >= 0.0 && b.x + b.width <= config.page_width_pt + 0.5, "{b:?}");
    }
    for page in &config.pages {
        for b in &page.boxes {
            assert!(b.y + b.height <= config.page_height_pt + 0.5, "{b:?}");
        }
    }
    // The footer is the last thing on the last page.
    let last = config.pages.last().unwrap();
    let footer = last.boxes.last().unwrap();
    let text: String = footer
        .descendants()
        .into_iter()
        .filter_map(|b| b.text.as_ref())
        .map(|t| t.plain_text())
        .collect();
    assert!(text.contains("accounts@bits-mart.com"), "{text}");
}

#[test]
fn original_price_is_struck_through() {
    let config = sample_layout();
    let struck: Vec<_> = config
        .boxes()
        .filter_map(|b| b.text.as_ref())
        .flat_map(|t| t.lines.iter())
        .flat_map(|l| l.fragments.iter())
        .filter(|f| f.line_through)
        .collect();
    assert_eq!(struck.len(), 1);
    assert_eq!(struck[0].text, "$50.00");
}

#[test]
fn total_is_bold() {
    let config = sample_layout();
    let total = find_box_with_text(&config, "$115.00");
    let lines = &total.text.as_ref().unwrap().lines;
    assert!(lines
        .iter()
        .flat_map(|l| l.fragments.iter())
        .all(|f| f.bold));
}

#[test]
fn logo_is_embedded_at_requested_width() {
    let config = sample_layout();
    let logo = config
        .boxes()
        .find_map(|b| b.image.as_ref())
        .expect("logo image");
    assert!(logo.src.starts_with("file://"));
    assert!(logo.src.ends_with("/logo.png"));
    assert!((logo.width - 210.0).abs() < 0.01);
    // static/logo.png is 420x120.
    assert!((logo.height - 60.0).abs() < 0.01);
}

#[test]
fn prices_are_right_aligned() {
    let config = sample_layout();
    let price = find_box_with_text(&config, "$110.00");
    let line = &price.text.as_ref().unwrap().lines[0];
    let last = line.fragments.last().unwrap();
    let gap = price.width - (last.x_offset + last.width);
    // Text ends flush with the cell's content edge.
    assert!(gap < 1.0, "gap {gap}");
}

// =====================================================================
// Orders beyond the sample
// =====================================================================

#[test]
fn long_order_paginates() {
    let mut order = sample_order();
    order.line_items = (1..=60)
        .map(|i| LineItem {
            quantity: 1,
            title: format!("Widget {i}"),
            original_price: 10.0,
            final_price: 10.0,
            discount_allocations: Vec::new(),
        })
        .collect();
    let html = pipeline().render_html(&order, &sample_shop()).unwrap();
    let (bytes, config) = generate_pdf(&html, &PipelineConfig::default()).unwrap();

    assert_valid_pdf(&bytes);
    assert!(config.pages.len() > 1);
    let text = config.text_lines().join("\n");
    assert!(text.contains("Widget 1"));
    assert!(text.contains("Widget 60"));
    assert!(!config
        .boxes()
        .filter_map(|b| b.text.as_ref())
        .flat_map(|t| t.lines.iter())
        .flat_map(|l| l.fragments.iter())
        .any(|f| f.line_through));
}

#[test]
fn long_note_breaks_across_pages() {
    let mut order = sample_order();
    order.note = Some("please leave the parcel at the back door ".repeat(400));
    let html = pipeline().render_html(&order, &sample_shop()).unwrap();
    let (bytes, config) = generate_pdf(&html, &PipelineConfig::default()).unwrap();

    assert!(config.pages.len() > 1);
    for page in &config.pages {
        for b in page.boxes.iter().flat_map(|b| b.descendants()) {
            assert!(
                b.y + b.height <= config.page_height_pt + 0.5,
                "page {} box overflows: {b:?}",
                page.page_index
            );
        }
    }
    let words: usize = config
        .text_lines()
        .iter()
        .map(|l| l.matches("parcel").count())
        .sum();
    assert_eq!(words, 400);
    assert_eq!(parse_pdf(&bytes).pages.len(), config.pages.len());
}

#[test]
fn order_from_json_renders() {
    let json = r#"{
        "order_number": "B-42",
        "created_at": "2024-12-24",
        "shipping_address": { "name": "Ann", "city": "Perth", "country": "Australia" },
        "line_items": [
            { "quantity": 3, "title": "Cable", "original_price": 5, "final_price": 5 }
        ],
        "subtotal_price": 15,
        "tax_price": 1.5,
        "shipping_price": 9.95,
        "total_price": 26.45,
        "net_payment": 26.45
    }"#;
    let order = Order::from_json(json).unwrap();
    let html = InvoiceRenderer::with_assets(assets())
        .unwrap()
        .render(&order, &sample_shop())
        .unwrap();
    assert!(html.contains("$9.95"));
    assert!(!html.contains("FREE"));
    assert!(!html.contains("Bill to"));
    assert!(html.contains("Ann<br>Perth<br>Australia"));

    let (bytes, _) = generate_pdf(&html, &PipelineConfig::default()).unwrap();
    assert_valid_pdf(&bytes);
}

// =====================================================================
// Engine
// =====================================================================

#[test]
fn layout_config_json_round_trip_renders() {
    let config = sample_layout();
    let restored = LayoutConfig::from_json(&config.to_json()).unwrap();
    assert_eq!(restored.pages.len(), config.pages.len());
    assert_eq!(restored.text_lines(), config.text_lines());
    assert_valid_pdf(&render_pdf(&restored).unwrap());
}

#[test]
fn malformed_html_is_rejected() {
    let err = generate_pdf("<table><tr><td>1</tr></table>", &PipelineConfig::default())
        .unwrap_err();
    assert!(matches!(err, RenderError::MalformedHtml { .. }), "{err}");
}

#[test]
fn unknown_image_source_is_rejected() {
    let err = generate_pdf(r#"<img src="logo.png">"#, &PipelineConfig::default()).unwrap_err();
    assert!(matches!(err, RenderError::Asset { .. }), "{err}");
}
