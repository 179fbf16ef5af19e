//! Error types for the invoice pipeline.
//!
//! [`InvoiceError`] is what the pipeline surfaces to the caller; each variant
//! maps to one pipeline stage. [`RenderError`] is produced by the HTML → PDF
//! engine and is wrapped by [`InvoiceError::Render`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("asset directory '{}' could not be resolved: {source}", path.display())]
    ResourceNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error("PDF rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("{message}")]
    FileSystem {
        message: String,
        #[source]
        source: Option<io::Error>,
    },
}

impl InvoiceError {
    /// Short name of the pipeline stage that failed, for operator messages.
    pub fn stage(&self) -> &'static str {
        match self {
            InvoiceError::InvalidInput(_) => "formatting",
            InvoiceError::ResourceNotFound { .. } => "assets",
            InvoiceError::Template(_) => "template",
            InvoiceError::Render(_) => "pdf",
            InvoiceError::FileSystem { .. } => "output",
        }
    }

    pub(crate) fn file_system(message: impl Into<String>, source: io::Error) -> Self {
        InvoiceError::FileSystem {
            message: message.into(),
            source: Some(source),
        }
    }
}

impl From<tera::Error> for InvoiceError {
    fn from(e: tera::Error) -> Self {
        // Tera nests filter failures a few levels deep; keep the whole chain.
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        InvoiceError::Template(message)
    }
}

/// Failures of the HTML → PDF engine.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("malformed HTML at byte {offset}: {reason}")]
    MalformedHtml { offset: usize, reason: String },

    #[error("asset '{src}' could not be loaded: {reason}")]
    Asset { src: String, reason: String },

    #[error("layout failed: {0}")]
    Layout(String),

    #[error("{0}")]
    Pdf(String),
}

impl RenderError {
    pub(crate) fn asset(src: &str, reason: impl Into<String>) -> Self {
        RenderError::Asset {
            src: preview(src, 80),
            reason: reason.into(),
        }
    }
}

impl From<taffy::TaffyError> for RenderError {
    fn from(e: taffy::TaffyError) -> Self {
        RenderError::Layout(e.to_string())
    }
}

/// Data URIs can be huge; keep messages readable.
fn preview(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(InvoiceError::InvalidInput("x".into()).stage(), "formatting");
        let fs = InvoiceError::FileSystem {
            message: "no home".into(),
            source: None,
        };
        assert_eq!(fs.stage(), "output");
        assert_eq!(fs.to_string(), "no home");
        let render: InvoiceError = RenderError::Pdf("boom".into()).into();
        assert_eq!(render.stage(), "pdf");
    }

    #[test]
    fn long_asset_sources_are_truncated() {
        let src = format!("data:image/png;base64,{}", "A".repeat(500));
        let err = RenderError::asset(&src, "bad");
        assert!(err.to_string().len() < 200);
    }
}
