//! # invoice-forge – order data → tax invoice PDF
//!
//! An order is rendered through a tera HTML template and the HTML is turned
//! into a PDF by a small engine. The engine stages are:
//!
//! 1. **Parse** – HTML string → DOM tree ([`dom`])
//! 2. **Style** – `<style>` sheets, inline styles and tag defaults ([`style`])
//! 3. **Layout** – flexbox/table layout with Taffy ([`layout`])
//! 4. **Paginate** – split into A4 pages ([`pagination`])
//! 5. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! [`InvoicePipeline`] runs template → PDF → Downloads in one call.

pub mod assets;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod format;
pub mod layout;
pub mod layout_config;
pub mod order;
pub mod output;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod style;
pub mod templates;

// Re-exports for convenience
pub use error::{InvoiceError, RenderError};
pub use format::{address_to_markup, asset_uri, money, AssetDir};
pub use layout_config::LayoutConfig;
pub use order::{Address, DiscountAllocation, LineItem, Order, Shop};
pub use output::{downloads_dir, invoice_filename, write_invoice};
pub use pipeline::{
    compute_layout_config, generate_pdf, generate_pdf_from_html, InvoicePipeline, PageOrientation,
    PipelineConfig,
};
pub use templates::InvoiceRenderer;
