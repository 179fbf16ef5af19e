//! Pagination – splits positioned boxes into pages.
//!
//! Handles:
//! - Page boundaries for the configured page size
//! - Page-break-before / page-break-after hints
//! - Table splitting between rows (through thead/tbody)
//! - Oversized plain containers, which are opened up so their children can
//!   land on different pages

use crate::layout::{BoxContent, PositionedBox};
use crate::layout_config::*;
use crate::style::{self, BorderSide, Display};

/// Default page margins in points.
pub const PAGE_MARGIN_PT: f32 = 40.0;

/// Recursively expand any pure-container box whose height exceeds a single
/// page so its children can be split across pages individually.
fn flatten_for_pagination(boxes: &[PositionedBox], content_height: f32) -> Vec<&PositionedBox> {
    let mut result = Vec::new();
    for pbox in boxes {
        if pbox.height > content_height
            && matches!(pbox.content, BoxContent::None)
            && !pbox.children.is_empty()
            && !is_table_like(pbox)
        {
            result.extend(flatten_for_pagination(&pbox.children, content_height));
        } else {
            result.push(pbox);
        }
    }
    result
}

/// Mutable page-building state.
struct Paginator<'c> {
    config: &'c mut LayoutConfig,
    current: PageLayout,
    /// Document-space y at which the current page begins.
    page_start_doc_y: f32,
    content_height: f32,
    page_margin: f32,
}

impl Paginator<'_> {
    fn new_page(&mut self, start_doc_y: f32) {
        let next = PageLayout {
            page_index: self.config.pages.len() + 1,
            boxes: Vec::new(),
        };
        self.config.pages.push(std::mem::replace(&mut self.current, next));
        self.page_start_doc_y = start_doc_y;
    }

    fn y_on_page(&self, pbox: &PositionedBox) -> f32 {
        (pbox.y - self.page_start_doc_y).max(0.0)
    }

    fn place(&mut self, pbox: &PositionedBox) {
        let y = self.page_margin + self.y_on_page(pbox);
        self.current.boxes.push(build_layout_box(pbox, pbox.x, y));
    }

    fn push(&mut self, pbox: &PositionedBox) {
        if pbox.style.page_break_before && !self.current.boxes.is_empty() {
            self.new_page(pbox.y);
        }

        let box_bottom = self.y_on_page(pbox) + pbox.height;
        if box_bottom > self.content_height {
            match &pbox.content {
                _ if is_table_like(pbox)
                    && (!pbox.style.page_break_inside_avoid || self.current.boxes.is_empty()) =>
                {
                    self.split_table(pbox);
                }
                BoxContent::Text { lines } if pbox.height > self.content_height => {
                    self.split_text(pbox, lines);
                }
                _ => {
                    self.break_before(pbox.y);
                    self.place(pbox);
                }
            }
        } else {
            self.place(pbox);
        }

        if pbox.style.page_break_after {
            self.new_page(pbox.y + pbox.height);
        }
    }

    /// Place a table (or table section) row by row, starting new pages
    /// between rows.
    fn split_table(&mut self, pbox: &PositionedBox) {
        for child in &pbox.children {
            if is_table_like(child) {
                self.split_table(child);
                continue;
            }
            if child.height > self.content_height {
                // A single row taller than a page: its cells go in one by one.
                for part in flatten_for_pagination(std::slice::from_ref(child), self.content_height) {
                    self.push(part);
                }
                continue;
            }
            let bottom = self.y_on_page(child) + child.height;
            if bottom > self.content_height && !self.current.boxes.is_empty() {
                self.new_page(child.y);
            }
            self.place(child);
        }
    }

    /// Place a text block taller than a page, breaking it between lines.
    fn split_text(&mut self, pbox: &PositionedBox, lines: &[TextLine]) {
        // Page y of the text box top; lines sit at `origin + y_offset`.
        let mut origin = self.y_on_page(pbox);
        let mut chunk: Vec<TextLine> = Vec::new();
        for line in lines {
            if origin + line.y_offset + line.height > self.content_height {
                if !chunk.is_empty() || !self.current.boxes.is_empty() {
                    self.place_lines(pbox, origin, std::mem::take(&mut chunk));
                    self.new_page(pbox.y + line.y_offset);
                } else {
                    self.page_start_doc_y = pbox.y + line.y_offset;
                }
                origin = -line.y_offset;
            }
            chunk.push(line.clone());
        }
        self.place_lines(pbox, origin, chunk);
    }

    /// Place consecutive lines of `pbox` as their own text box. `origin` is
    /// the page y that a line offset of zero maps to.
    fn place_lines(&mut self, pbox: &PositionedBox, origin: f32, mut lines: Vec<TextLine>) {
        let Some(top) = lines.first().map(|l| l.y_offset) else {
            return;
        };
        let height = lines
            .last()
            .map(|l| l.y_offset + l.height - top)
            .unwrap_or(0.0);
        for line in &mut lines {
            line.y_offset -= top;
        }

        let y = self.page_margin + origin + top;
        let mut lb = LayoutBox::new(pbox.x, y, pbox.width, height);
        lb.text = Some(TextContent { lines });
        self.current.boxes.push(lb);
    }

    /// Move to a fresh page starting at `doc_y`. An empty page is reused.
    fn break_before(&mut self, doc_y: f32) {
        if self.current.boxes.is_empty() {
            self.page_start_doc_y = doc_y;
        } else {
            self.new_page(doc_y);
        }
    }
}

/// Convert positioned boxes into a paginated LayoutConfig.
pub fn paginate(
    boxes: &[PositionedBox],
    page_width: f32,
    page_height: f32,
    page_margin: f32,
    title: &str,
) -> LayoutConfig {
    let mut config = LayoutConfig {
        title: title.to_string(),
        page_width_pt: page_width,
        page_height_pt: page_height,
        pages: Vec::new(),
    };

    let content_height = page_height - 2.0 * page_margin;
    let flat = flatten_for_pagination(boxes, content_height);

    let mut paginator = Paginator {
        config: &mut config,
        current: PageLayout {
            page_index: 0,
            boxes: Vec::new(),
        },
        page_start_doc_y: 0.0,
        content_height,
        page_margin,
    };
    for pbox in flat {
        paginator.push(pbox);
    }

    let last = paginator.current;
    if !last.boxes.is_empty() || config.pages.is_empty() {
        config.pages.push(last);
    }
    log::debug!("paginated into {} page(s)", config.pages.len());
    config
}

fn is_table_like(pbox: &PositionedBox) -> bool {
    matches!(pbox.style.display, Display::Table | Display::TableSection)
        && !pbox.children.is_empty()
}

fn border_style(side: &BorderSide) -> Option<BorderStyle> {
    (side.width > 0.0 && !side.color.is_transparent()).then(|| BorderStyle {
        width: side.width,
        color: side.color.to_array(),
    })
}

/// Recursively build a LayoutBox tree where every box carries *page-absolute*
/// x/y coordinates (origin = top-left of the physical page).
///
/// PositionedBox.y values are document-space absolutes, so
/// `child_abs_y = parent_abs_y + (child.y − parent.y)`.
fn build_layout_box(pbox: &PositionedBox, abs_x: f32, abs_y: f32) -> LayoutBox {
    let mut lb = LayoutBox::new(abs_x, abs_y, pbox.width, pbox.height);
    let s: &style::ComputedStyle = &pbox.style;

    if !s.background_color.is_transparent() {
        lb.background_color = Some(s.background_color.to_array());
    }
    lb.borders = Borders {
        top: border_style(&s.border.top),
        right: border_style(&s.border.right),
        bottom: border_style(&s.border.bottom),
        left: border_style(&s.border.left),
    };

    match &pbox.content {
        BoxContent::Text { lines } => {
            lb.text = Some(TextContent {
                lines: lines.clone(),
            });
        }
        BoxContent::Image { src } => {
            lb.image = Some(ImageContent {
                src: src.clone(),
                width: pbox.width,
                height: pbox.height,
            });
        }
        BoxContent::None => {}
    }

    for child in &pbox.children {
        let child_abs_y = abs_y + (child.y - pbox.y);
        lb.children.push(build_layout_box(child, child.x, child_abs_y));
    }

    lb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ImageStore;
    use crate::dom::parse_html;
    use crate::layout::compute_layout;
    use crate::style::{build_styled_tree, Stylesheet};

    fn paginate_html(html: &str, css: &str) -> LayoutConfig {
        let dom = parse_html(html).unwrap();
        let styled = build_styled_tree(&dom, None, &Stylesheet::parse(css));
        let boxes = compute_layout(&styled, 595.0, PAGE_MARGIN_PT, &mut ImageStore::new()).unwrap();
        paginate(&boxes, 595.0, 842.0, PAGE_MARGIN_PT, "test")
    }

    #[test]
    fn single_page() {
        let config = paginate_html("<p>Short text</p>", "");
        assert_eq!(config.pages.len(), 1);
        assert_eq!(config.title, "test");
    }

    #[test]
    fn empty_document_still_has_a_page() {
        let config = paginate_html("", "");
        assert_eq!(config.pages.len(), 1);
        assert!(config.pages[0].boxes.is_empty());
    }

    #[test]
    fn multiple_pages() {
        let mut html = String::new();
        for i in 0..60 {
            html.push_str(&format!("<p>Paragraph {i} with some text</p>"));
        }
        let config = paginate_html(&html, "");
        assert!(config.pages.len() > 1, "got {}", config.pages.len());
        for (i, page) in config.pages.iter().enumerate() {
            assert_eq!(page.page_index, i);
            for b in &page.boxes {
                assert!(b.y + b.height <= 842.0 - PAGE_MARGIN_PT + 0.01);
            }
        }
    }

    #[test]
    fn page_break_before_starts_new_page() {
        let config = paginate_html(
            r#"<p>First</p><p style="page-break-before: always;">Second</p>"#,
            "",
        );
        assert_eq!(config.pages.len(), 2);
    }

    #[test]
    fn long_table_splits_between_rows() {
        let mut html = String::from("<table><thead><tr><th>Qty</th><th>Item</th></tr></thead><tbody>");
        for i in 0..80 {
            html.push_str(&format!("<tr><td>{i}</td><td>Item {i}</td></tr>"));
        }
        html.push_str("</tbody></table>");
        let config = paginate_html(&html, "td { padding: 6px; }");
        assert!(config.pages.len() > 1);
        // Rows are placed whole: each top-level box on later pages is a row.
        let rows_on_page_two = &config.pages[1].boxes;
        assert!(!rows_on_page_two.is_empty());
        for row in rows_on_page_two {
            assert_eq!(row.children.len(), 2);
        }
        // Rows are placed below the top margin on a fresh page.
        assert!((rows_on_page_two[0].y - PAGE_MARGIN_PT).abs() < 0.01);
    }

    fn assert_lines_inside_pages(config: &LayoutConfig) {
        for b in config.boxes() {
            if let Some(text) = &b.text {
                for line in &text.lines {
                    let bottom = b.y + line.y_offset + line.height;
                    assert!(bottom <= 842.0 - PAGE_MARGIN_PT + 0.01, "line ends at {bottom}");
                }
            }
        }
    }

    #[test]
    fn tall_paragraph_breaks_between_lines() {
        let words = "lorem ipsum dolor sit amet ".repeat(600);
        let config = paginate_html(&format!("<p>First</p><div><p>{words}</p></div>"), "");
        assert!(config.pages.len() > 2, "got {}", config.pages.len());
        assert_lines_inside_pages(&config);

        let laid_out: usize = config
            .text_lines()
            .iter()
            .map(|l| l.split_whitespace().count())
            .sum();
        assert_eq!(laid_out, 1 + 3000);

        // Continuation pages start at the top margin.
        let second = &config.pages[1].boxes[0];
        assert!((second.y - PAGE_MARGIN_PT).abs() < 0.01);
        assert!((second.text.as_ref().unwrap().lines[0].y_offset).abs() < 0.01);
    }

    #[test]
    fn tall_table_cell_is_not_clipped() {
        let words = "widget ".repeat(2000);
        let html = format!(
            "<table><tbody><tr><td>1</td><td>{words}</td><td>$5.00</td></tr></tbody></table>"
        );
        let config = paginate_html(&html, "");
        assert!(config.pages.len() > 1);
        assert_lines_inside_pages(&config);
        let text = config.text_lines().join(" ");
        assert_eq!(text.matches("widget").count(), 2000);
        assert!(text.contains("$5.00"));
    }

    #[test]
    fn per_side_borders_are_carried() {
        let config = paginate_html(
            "<table><thead><tr><th>A</th></tr></thead></table>",
            "thead tr { border-top: 1px solid #ddd; border-bottom: 1px solid #ddd; }",
        );
        let row = config
            .boxes()
            .find(|b| b.borders.top.is_some())
            .expect("bordered row");
        assert!(row.borders.bottom.is_some());
        assert!(row.borders.left.is_none());
        assert!(row.borders.right.is_none());
    }
}
