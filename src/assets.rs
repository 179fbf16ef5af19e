//! Image loading for `<img src>` values.
//!
//! Two source forms are understood: `file://` URIs (what the template's
//! `asset_uri` filter produces) and base64 `data:` URIs. Anything that cannot
//! be read or decoded is an error; images are never silently dropped.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};

use crate::error::RenderError;
use crate::format::path_from_file_uri;

/// Encoded image bytes plus their pixel dimensions.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub bytes: Vec<u8>,
    pub px_width: u32,
    pub px_height: u32,
}

impl LoadedImage {
    pub fn aspect_ratio(&self) -> f32 {
        self.px_width as f32 / self.px_height as f32
    }
}

/// Cache of decoded images keyed by their `src` string.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: HashMap<String, LoadedImage>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load (or fetch from cache) the image behind `src`.
    pub fn load(&mut self, src: &str) -> Result<&LoadedImage, RenderError> {
        if !self.images.contains_key(src) {
            let image = load_image(src)?;
            log::debug!(
                "loaded image {}x{} ({} bytes)",
                image.px_width,
                image.px_height,
                image.bytes.len()
            );
            self.images.insert(src.to_string(), image);
        }
        self.images
            .get(src)
            .ok_or_else(|| RenderError::asset(src, "image cache miss"))
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn load_image(src: &str) -> Result<LoadedImage, RenderError> {
    let bytes = read_source(src)?;
    let decoded =
        ::image::load_from_memory(&bytes).map_err(|e| RenderError::asset(src, e.to_string()))?;
    let (px_width, px_height) = (decoded.width(), decoded.height());
    if px_width == 0 || px_height == 0 {
        return Err(RenderError::asset(src, "image has zero size"));
    }
    Ok(LoadedImage {
        bytes,
        px_width,
        px_height,
    })
}

fn read_source(src: &str) -> Result<Vec<u8>, RenderError> {
    if src.starts_with("data:") {
        return parse_data_uri(src);
    }
    if src.starts_with("file:") {
        let path = path_from_file_uri(src)
            .ok_or_else(|| RenderError::asset(src, "malformed file URI"))?;
        return std::fs::read(&path)
            .map_err(|e| RenderError::asset(src, format!("{}: {e}", path.display())));
    }
    if src.trim().is_empty() {
        return Err(RenderError::asset(src, "empty image source"));
    }
    Err(RenderError::asset(
        src,
        "only file:// and base64 data: URIs are supported",
    ))
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
fn parse_data_uri(src: &str) -> Result<Vec<u8>, RenderError> {
    let rest = &src["data:".len()..];
    let comma_pos = rest
        .find(',')
        .ok_or_else(|| RenderError::asset(src, "missing `,` between header and data"))?;
    let header = &rest[..comma_pos];
    if !header.contains(";base64") {
        return Err(RenderError::asset(src, "data URI is not base64 encoded"));
    }
    BASE64_STD
        .decode(rest[comma_pos + 1..].trim())
        .map_err(|e| RenderError::asset(src, format!("base64 decode error: {e}")))
}
