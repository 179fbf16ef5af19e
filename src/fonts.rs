//! Text measurement for the PDF base-14 fonts.
//!
//! The renderer only emits builtin fonts, so no font files are embedded.
//! Widths come from the Adobe AFM tables (units per em = 1000) for the
//! printable ASCII range; anything else falls back to an average advance.

use crate::style::{ComputedStyle, FontFamily};

const UNITS_PER_EM: f32 = 1000.0;
const FALLBACK_ADVANCE: u16 = 556;

/// Advance widths for U+0020 ..= U+007E.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Identifies one of the builtin faces.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
}

impl FontKey {
    pub fn for_style(style: &ComputedStyle) -> Self {
        Self {
            family: style.font_family,
            bold: style.is_bold(),
            italic: style.is_italic(),
        }
    }
}

impl Default for FontKey {
    fn default() -> Self {
        Self {
            family: FontFamily::Helvetica,
            bold: false,
            italic: false,
        }
    }
}

/// Vertical metrics in font units.
#[derive(Debug, Clone, Copy)]
struct VerticalMetrics {
    ascender: f32,
    descender: f32,
}

/// Width and height oracle for builtin fonts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontMetrics;

impl FontMetrics {
    pub fn new() -> Self {
        Self
    }

    fn advance(&self, ch: char, key: FontKey) -> f32 {
        if key.family == FontFamily::Courier {
            return 600.0;
        }
        let table = if key.bold { &HELVETICA_BOLD } else { &HELVETICA };
        let units = match ch as u32 {
            cp @ 0x20..=0x7E => table[(cp - 0x20) as usize],
            // no-break space
            0xA0 => table[0],
            _ => FALLBACK_ADVANCE,
        };
        // Times is narrower than Helvetica on average.
        let scale = if key.family == FontFamily::Times { 0.9 } else { 1.0 };
        units as f32 * scale
    }

    fn vertical(&self, key: FontKey) -> VerticalMetrics {
        match key.family {
            FontFamily::Helvetica => VerticalMetrics {
                ascender: 718.0,
                descender: -207.0,
            },
            FontFamily::Times => VerticalMetrics {
                ascender: 683.0,
                descender: -217.0,
            },
            FontFamily::Courier => VerticalMetrics {
                ascender: 629.0,
                descender: -157.0,
            },
        }
    }

    /// Width of `text` in pt at `font_size`.
    pub fn measure_text_width(&self, text: &str, font_size: f32, key: FontKey) -> f32 {
        let units: f32 = text.chars().map(|c| self.advance(c, key)).sum();
        units * font_size / UNITS_PER_EM
    }

    /// Distance from the top of the em box to the baseline, in pt.
    pub fn ascender(&self, font_size: f32, key: FontKey) -> f32 {
        self.vertical(key).ascender * font_size / UNITS_PER_EM
    }

    /// Distance below the baseline (positive), in pt.
    pub fn descender(&self, font_size: f32, key: FontKey) -> f32 {
        -self.vertical(key).descender * font_size / UNITS_PER_EM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> FontKey {
        FontKey {
            bold: true,
            ..FontKey::default()
        }
    }

    #[test]
    fn helvetica_widths() {
        let fm = FontMetrics::new();
        // H e l l o = 722 + 556 + 222 + 222 + 556
        let w = fm.measure_text_width("Hello", 10.0, FontKey::default());
        assert!((w - 22.78).abs() < 0.01, "{w}");
        // Digits are tabular.
        let a = fm.measure_text_width("$111.11", 12.0, FontKey::default());
        let b = fm.measure_text_width("$888.88", 12.0, FontKey::default());
        assert!((a - b).abs() < 0.001);
    }

    #[test]
    fn bold_is_wider() {
        let fm = FontMetrics::new();
        let regular = fm.measure_text_width("Invoice", 12.0, FontKey::default());
        let heavy = fm.measure_text_width("Invoice", 12.0, bold());
        assert!(heavy > regular);
    }

    #[test]
    fn courier_is_monospaced() {
        let fm = FontMetrics::new();
        let key = FontKey {
            family: FontFamily::Courier,
            ..FontKey::default()
        };
        assert_eq!(fm.measure_text_width("iiii", 10.0, key), 24.0);
        assert_eq!(fm.measure_text_width("WWWW", 10.0, key), 24.0);
    }

    #[test]
    fn non_ascii_uses_fallback() {
        let fm = FontMetrics::new();
        let w = fm.measure_text_width("€", 10.0, FontKey::default());
        assert!((w - 5.56).abs() < 0.01);
    }

    #[test]
    fn vertical_metrics() {
        let fm = FontMetrics::new();
        let key = FontKey::default();
        assert!((fm.ascender(10.0, key) - 7.18).abs() < 0.001);
        assert!((fm.descender(10.0, key) - 2.07).abs() < 0.001);
    }
}
