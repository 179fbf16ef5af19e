//! Layout config – the intermediate representation between layout computation
//! and PDF rendering. This is the "frozen" structure that encodes exactly what
//! goes on each page; it round-trips through JSON so a layout can be stored
//! and rendered later.

use serde::{Deserialize, Serialize};

use crate::style::FontFamily;

/// A complete document layout ready for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Document title embedded in the PDF metadata.
    #[serde(default = "LayoutConfig::default_title")]
    pub title: String,
    /// Width of each page in PDF points (1 pt = 1/72 inch).
    pub page_width_pt: f32,
    /// Height of each page in PDF points.
    pub page_height_pt: f32,
    /// Ordered list of pages.
    pub pages: Vec<PageLayout>,
}

/// One page of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_index: usize,
    pub boxes: Vec<LayoutBox>,
}

/// A positioned rectangle with optional content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBox {
    /// Position relative to page top-left, in points.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,

    pub background_color: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Borders::is_empty")]
    pub borders: Borders,

    /// Content (mutually exclusive in practice)
    pub text: Option<TextContent>,
    pub image: Option<ImageContent>,

    pub children: Vec<LayoutBox>,
}

/// Per-side borders, drawn along the box edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Borders {
    pub top: Option<BorderStyle>,
    pub right: Option<BorderStyle>,
    pub bottom: Option<BorderStyle>,
    pub left: Option<BorderStyle>,
}

impl Borders {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.right.is_none() && self.bottom.is_none() && self.left.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderStyle {
    pub width: f32,
    pub color: [f32; 4],
}

/// Pre-wrapped, pre-aligned text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub lines: Vec<TextLine>,
}

impl TextContent {
    /// Plain text of all lines joined with newlines.
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(TextLine::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    /// Offset of the line top from the top of the text box.
    pub y_offset: f32,
    /// Line box height.
    pub height: f32,
    /// Offset of the baseline from the line top.
    pub baseline: f32,
    pub fragments: Vec<TextFragment>,
}

impl TextLine {
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        let mut end = None;
        for frag in &self.fragments {
            if let Some(prev_end) = end {
                if frag.x_offset > prev_end + 0.01 {
                    out.push(' ');
                }
            }
            out.push_str(&frag.text);
            end = Some(frag.x_offset + frag.width);
        }
        out
    }
}

/// A run of text sharing one font, colour and decoration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Offset from the left edge of the text box.
    pub x_offset: f32,
    pub width: f32,
    pub font: FontFamily,
    pub bold: bool,
    pub italic: bool,
    pub font_size: f32,
    pub color: [f32; 4],
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub line_through: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub src: String,
    pub width: f32,
    pub height: f32,
}

impl LayoutConfig {
    /// Create an A4 layout config.
    pub fn a4() -> Self {
        Self {
            title: Self::default_title(),
            // A4: 210mm × 297mm = 595.28 × 841.89 points
            page_width_pt: 595.28,
            page_height_pt: 841.89,
            pages: Vec::new(),
        }
    }

    fn default_title() -> String {
        "Invoice".to_string()
    }

    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Depth-first iterator over every box on every page.
    pub fn boxes(&self) -> impl Iterator<Item = &LayoutBox> {
        self.pages.iter().flat_map(|p| p.boxes.iter().flat_map(LayoutBox::descendants))
    }

    /// All text in document order, one entry per line.
    pub fn text_lines(&self) -> Vec<String> {
        self.boxes()
            .filter_map(|b| b.text.as_ref())
            .flat_map(|t| t.lines.iter().map(TextLine::plain_text))
            .collect()
    }
}

impl LayoutBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            background_color: None,
            borders: Borders::default(),
            text: None,
            image: None,
            children: Vec::new(),
        }
    }

    /// This box followed by all of its descendants, depth first.
    pub fn descendants(&self) -> Vec<&LayoutBox> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.descendants());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str, x: f32, width: f32) -> TextFragment {
        TextFragment {
            text: text.to_string(),
            x_offset: x,
            width,
            font: FontFamily::Helvetica,
            bold: false,
            italic: false,
            font_size: 12.0,
            color: [0.0, 0.0, 0.0, 1.0],
            underline: false,
            line_through: false,
        }
    }

    #[test]
    fn plain_text_inserts_spaces_between_gapped_fragments() {
        let line = TextLine {
            y_offset: 0.0,
            height: 15.6,
            baseline: 11.0,
            fragments: vec![
                fragment("Visit:", 0.0, 30.0),
                fragment("bits-mart.com", 33.3, 70.0),
                fragment(".", 103.3, 3.0),
            ],
        };
        assert_eq!(line.plain_text(), "Visit: bits-mart.com.");
    }

    #[test]
    fn json_roundtrip_keeps_decorations() {
        let mut lb = LayoutBox::new(40.0, 40.0, 100.0, 20.0);
        let mut struck = fragment("$50.00", 0.0, 36.0);
        struck.line_through = true;
        lb.text = Some(TextContent {
            lines: vec![TextLine {
                y_offset: 0.0,
                height: 15.6,
                baseline: 11.0,
                fragments: vec![struck],
            }],
        });
        let mut config = LayoutConfig::a4();
        config.pages.push(PageLayout {
            page_index: 0,
            boxes: vec![lb],
        });

        let restored = LayoutConfig::from_json(&config.to_json()).unwrap();
        let text = restored.pages[0].boxes[0].text.as_ref().unwrap();
        assert!(text.lines[0].fragments[0].line_through);
        assert!(restored.pages[0].boxes[0].borders.is_empty());
        assert_eq!(restored.text_lines(), vec!["$50.00".to_string()]);
    }
}
