//! Formatting helpers used by the invoice template: currency amounts,
//! address blocks and asset URIs.
//!
//! All helpers are pure except [`AssetDir::resolve`], which consults the
//! working directory when the asset directory is relative.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::InvoiceError;
use crate::order::Address;

/// Currency symbol prefixed to every amount.
pub const CURRENCY_SYMBOL: &str = "$";

/// Directory (relative to the working directory) holding the logo.
pub const DEFAULT_ASSETS_DIR: &str = "static";

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Format `amount` as `$1,234.50`: comma thousands separators and exactly
/// two decimals. Negative amounts render as `$-10.00`.
pub fn money(amount: f64) -> Result<String, InvoiceError> {
    if !amount.is_finite() {
        return Err(InvoiceError::InvalidInput(format!(
            "cannot format {amount} as money"
        )));
    }

    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };

    Ok(format!(
        "{CURRENCY_SYMBOL}{sign}{}.{cents}",
        group_thousands(whole)
    ))
}

/// Coerce a template value into an amount and format it with [`money`].
///
/// Numbers and numeric strings are accepted.
pub fn money_value(value: &Value) -> Result<String, InvoiceError> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match amount {
        Some(a) => money(a),
        None => Err(InvoiceError::InvalidInput(format!(
            "cannot format {value} as money"
        ))),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Render an address as an HTML block: name, street, "city zip", country,
/// one per line. Empty lines are left out entirely so no `<br>` dangles.
pub fn address_to_markup(address: &Address) -> String {
    let locality = format!("{} {}", address.city.trim(), address.zip.trim());
    [
        address.name.trim(),
        address.address1.trim(),
        locality.trim(),
        address.country.trim(),
    ]
    .iter()
    .filter(|line| !line.is_empty())
    .map(|line| tera::escape_html(line))
    .collect::<Vec<_>>()
    .join("<br>")
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Location of static assets (the logo) referenced by the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDir {
    dir: PathBuf,
}

impl Default for AssetDir {
    fn default() -> Self {
        Self::new(DEFAULT_ASSETS_DIR)
    }
}

impl AssetDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Absolute form of the asset directory. The directory itself does not
    /// have to exist.
    pub fn resolve(&self) -> Result<PathBuf, InvoiceError> {
        std::path::absolute(&self.dir).map_err(|source| InvoiceError::ResourceNotFound {
            path: self.dir.clone(),
            source,
        })
    }

    /// `file://` URI of `filename` inside the asset directory.
    pub fn uri(&self, filename: &str) -> Result<String, InvoiceError> {
        Ok(file_uri(&self.resolve()?.join(filename)))
    }
}

/// `file://` URI of `filename` inside the default `static` directory.
pub fn asset_uri(filename: &str) -> Result<String, InvoiceError> {
    AssetDir::default().uri(filename)
}

/// Build a `file://` URI for an absolute path, percent-encoding anything
/// outside the unreserved set.
pub fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut uri = String::with_capacity(raw.len() + 8);
    uri.push_str("file://");
    // Windows drive paths ("C:/...") need the extra slash of an empty host.
    if !raw.starts_with('/') {
        uri.push('/');
    }
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b':' => {
                uri.push(byte as char)
            }
            _ => uri.push_str(&format!("%{byte:02X}")),
        }
    }
    uri
}

/// Inverse of [`file_uri`]. Returns `None` for anything that is not a
/// well-formed `file://` URI.
pub fn path_from_file_uri(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix("file://")?;
    // Drop an optional "localhost" host.
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);

    let bytes = rest.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = rest.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    let path = String::from_utf8(decoded).ok()?;

    // "/C:/dir" → "C:/dir"
    let trimmed = path.strip_prefix('/').unwrap_or(&path);
    let is_drive = trimmed.len() >= 2
        && trimmed.as_bytes()[0].is_ascii_alphabetic()
        && trimmed.as_bytes()[1] == b':';
    if is_drive {
        Some(PathBuf::from(trimmed))
    } else {
        Some(PathBuf::from(path))
    }
}
