//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API) and the builtin base-14 fonts.

use std::collections::{BTreeSet, HashMap};

use printpdf::*;

use crate::assets::ImageStore;
use crate::error::RenderError;
use crate::layout_config::*;
use crate::style::FontFamily;

const PT_TO_MM: f32 = 0.352778;

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Render a LayoutConfig into PDF bytes, loading images from scratch.
pub fn render_pdf(config: &LayoutConfig) -> Result<Vec<u8>, RenderError> {
    render_pdf_with_images(config, &mut ImageStore::new())
}

/// Render a LayoutConfig into PDF bytes, reusing images already decoded
/// during layout.
///
/// Every `image.src` must load; a missing or undecodable image fails the
/// whole render with [`RenderError::Asset`].
pub fn render_pdf_with_images(
    config: &LayoutConfig,
    images: &mut ImageStore,
) -> Result<Vec<u8>, RenderError> {
    let page_w = Mm(config.page_width_pt * PT_TO_MM);
    let page_h = Mm(config.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&config.title);

    // ── Register images ──────────────────────────────────────────────────
    let mut all_srcs: BTreeSet<&str> = BTreeSet::new();
    for lbox in config.pages.iter().flat_map(|p| p.boxes.iter()) {
        collect_image_srcs(lbox, &mut all_srcs);
    }

    let mut image_resources: HashMap<String, ImageResource> = HashMap::new();
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    for src in all_srcs {
        let loaded = images.load(src)?;
        let raw = RawImage::decode_from_bytes(&loaded.bytes, &mut warnings)
            .map_err(|e| RenderError::asset(src, e.to_string()))?;
        let xobj_id = doc.add_image(&raw);
        image_resources.insert(
            src.to_string(),
            ImageResource {
                xobj_id,
                px_width: loaded.px_width,
                px_height: loaded.px_height,
            },
        );
    }
    if !warnings.is_empty() {
        log::debug!("{} warning(s) while embedding images", warnings.len());
    }

    // ── Render pages ─────────────────────────────────────────────────────
    let mut pages = Vec::with_capacity(config.pages.len().max(1));
    for page_layout in &config.pages {
        let mut ops = Vec::new();
        for lbox in &page_layout.boxes {
            render_box(&mut ops, lbox, config.page_height_pt, &image_resources);
        }
        pages.push(PdfPage::new(page_w, page_h, ops));
    }
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let mut save_warnings = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut save_warnings);
    if bytes.is_empty() {
        return Err(RenderError::Pdf("printpdf produced an empty document".into()));
    }
    log::debug!("rendered {} page(s), {} bytes", config.pages.len(), bytes.len());
    Ok(bytes)
}

/// Characters outside WinAnsiEncoding (Latin-1 plus the cp1252 extras)
/// have no glyph in the builtin fonts. They are replaced by `?`; the second
/// value counts the replacements.
fn encodable_text(s: &str) -> (String, usize) {
    let mut replaced = 0;
    let text = s
        .chars()
        .map(|c| match c {
            '\u{00A0}' => ' ',
            '\u{20AC}' | '\u{2026}' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}'
            | '\u{2022}' | '\u{2013}' | '\u{2014}' | '\u{2122}' => c,
            c if (c as u32) < 256 => c,
            _ => {
                replaced += 1;
                '?'
            }
        })
        .collect();
    (text, replaced)
}

fn builtin_font(family: FontFamily, bold: bool, italic: bool) -> BuiltinFont {
    match (family, bold, italic) {
        (FontFamily::Helvetica, false, false) => BuiltinFont::Helvetica,
        (FontFamily::Helvetica, true, false) => BuiltinFont::HelveticaBold,
        (FontFamily::Helvetica, false, true) => BuiltinFont::HelveticaOblique,
        (FontFamily::Helvetica, true, true) => BuiltinFont::HelveticaBoldOblique,
        (FontFamily::Times, false, false) => BuiltinFont::TimesRoman,
        (FontFamily::Times, true, false) => BuiltinFont::TimesBold,
        (FontFamily::Times, false, true) => BuiltinFont::TimesItalic,
        (FontFamily::Times, true, true) => BuiltinFont::TimesBoldItalic,
        (FontFamily::Courier, false, false) => BuiltinFont::Courier,
        (FontFamily::Courier, true, false) => BuiltinFont::CourierBold,
        (FontFamily::Courier, false, true) => BuiltinFont::CourierOblique,
        (FontFamily::Courier, true, true) => BuiltinFont::CourierBoldOblique,
    }
}

fn rgb(c: &[f32; 4]) -> Color {
    Color::Rgb(Rgb {
        r: c[0],
        g: c[1],
        b: c[2],
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

fn stroke(ops: &mut Vec<Op>, from: (f32, f32), to: (f32, f32), width: f32, color: &[f32; 4]) {
    ops.push(Op::SetOutlineColor { col: rgb(color) });
    ops.push(Op::SetOutlineThickness { pt: Pt(width) });
    ops.push(Op::DrawLine {
        line: Line {
            points: vec![point(from.0, from.1), point(to.0, to.1)],
            is_closed: false,
        },
    });
}

/// Recursively collect all unique `image.src` strings from a [`LayoutBox`] tree.
fn collect_image_srcs<'a>(lbox: &'a LayoutBox, srcs: &mut BTreeSet<&'a str>) {
    if let Some(img) = &lbox.image {
        srcs.insert(img.src.as_str());
    }
    for child in &lbox.children {
        collect_image_srcs(child, srcs);
    }
}

/// Recursively render a LayoutBox and its children into PDF ops.
fn render_box(
    ops: &mut Vec<Op>,
    lbox: &LayoutBox,
    page_height: f32,
    images: &HashMap<String, ImageResource>,
) {
    // PDF origin is bottom-left; layout origin is top-left.
    let top = page_height - lbox.y;
    let bottom = top - lbox.height;
    let left = lbox.x;
    let right = lbox.x + lbox.width;

    if let Some(bg) = &lbox.background_color {
        ops.push(Op::SetFillColor { col: rgb(bg) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![
                        point(left, bottom),
                        point(right, bottom),
                        point(right, top),
                        point(left, top),
                    ],
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    // Borders are stroked centred on the inside of each edge.
    let b = &lbox.borders;
    if let Some(s) = &b.top {
        let y = top - s.width / 2.0;
        stroke(ops, (left, y), (right, y), s.width, &s.color);
    }
    if let Some(s) = &b.bottom {
        let y = bottom + s.width / 2.0;
        stroke(ops, (left, y), (right, y), s.width, &s.color);
    }
    if let Some(s) = &b.left {
        let x = left + s.width / 2.0;
        stroke(ops, (x, top), (x, bottom), s.width, &s.color);
    }
    if let Some(s) = &b.right {
        let x = right - s.width / 2.0;
        stroke(ops, (x, top), (x, bottom), s.width, &s.color);
    }

    if let Some(text) = &lbox.text {
        for line in &text.lines {
            let baseline_y = top - line.y_offset - line.baseline;
            for frag in &line.fragments {
                render_fragment(ops, frag, left, baseline_y, line.height);
            }
        }
    }

    if let Some(img) = &lbox.image {
        if let Some(res) = images.get(&img.src) {
            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(left)),
                    translate_y: Some(Pt(top - img.height)),
                    dpi: Some(72.0),
                    scale_x: Some(img.width / res.px_width.max(1) as f32),
                    scale_y: Some(img.height / res.px_height.max(1) as f32),
                    rotate: None,
                },
            });
        }
    }

    for child in &lbox.children {
        render_box(ops, child, page_height, images);
    }
}

fn render_fragment(ops: &mut Vec<Op>, frag: &TextFragment, left: f32, baseline_y: f32, line_height: f32) {
    if frag.text.is_empty() {
        return;
    }
    let font = builtin_font(frag.font, frag.bold, frag.italic);
    let x = left + frag.x_offset;
    let (text, replaced) = encodable_text(&frag.text);
    if replaced > 0 {
        log::warn!(
            "{replaced} character(s) in {:?} cannot be encoded by the builtin fonts; drawn as '?'",
            frag.text
        );
    }

    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(x),
            y: Pt(baseline_y),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(frag.font_size),
        font,
    });
    ops.push(Op::SetLineHeight { lh: Pt(line_height) });
    ops.push(Op::SetFillColor {
        col: rgb(&frag.color),
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(text)],
        font,
    });
    ops.push(Op::EndTextSection);

    let thickness = (frag.font_size / 18.0).max(0.5);
    if frag.underline {
        let y = baseline_y - frag.font_size * 0.1;
        stroke(ops, (x, y), (x + frag.width, y), thickness, &frag.color);
    }
    if frag.line_through {
        // Roughly through the middle of the x-height.
        let y = baseline_y + frag.font_size * 0.3;
        stroke(ops, (x, y), (x + frag.width, y), thickness, &frag.color);
    }
}
