//! Layout engine – uses Taffy to compute flexbox layout from a styled DOM
//! tree, then converts the result into a tree of positioned boxes in
//! document coordinates.
//!
//! Widths are decided top-down before Taffy runs: every text paragraph is
//! wrapped against the width its container will get, and Taffy then only has
//! to stack and align fixed-size leaves. Consecutive inline children of a
//! block form one anonymous paragraph whose runs keep their own font, colour
//! and decoration.

use std::collections::HashMap;

use taffy::{
    AvailableSpace, LengthPercentage, LengthPercentageAuto, NodeId, Rect, Size, Style, TaffyTree,
};

use crate::assets::ImageStore;
use crate::dom::Tag;
use crate::error::RenderError;
use crate::fonts::{FontKey, FontMetrics};
use crate::layout_config::{TextFragment, TextLine};
use crate::style::{
    self, Color, ComputedStyle, Display, FlexDirection, StyledNode, TextAlign, TextDecoration,
};

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    /// Wrapped and aligned lines; offsets are relative to the box.
    Text { lines: Vec<TextLine> },
    Image { src: String },
}

// ---------------------------------------------------------------------------
// Inline formatting
// ---------------------------------------------------------------------------

/// Everything that distinguishes one text run from another.
#[derive(Debug, Clone, PartialEq)]
struct RunStyle {
    key: FontKey,
    font_size: f32,
    color: Color,
    decoration: TextDecoration,
    line_height: f32,
}

impl RunStyle {
    fn from_style(style: &ComputedStyle) -> Self {
        Self {
            key: FontKey::for_style(style),
            font_size: style.font_size,
            color: style.color,
            decoration: style.text_decoration,
            line_height: style.line_height_pt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word {
        text: String,
        run: usize,
        space_before: bool,
    },
    Break,
}

/// Inline content flattened into words and forced breaks, with whitespace
/// collapsed across element boundaries.
#[derive(Debug, Default)]
struct InlineFlow {
    runs: Vec<RunStyle>,
    tokens: Vec<Token>,
    pending_space: bool,
}

#[derive(Debug, Default)]
struct PendingLine {
    fragments: Vec<(usize, String, f32, f32)>, // run, text, x, width
    width: f32,
}

impl InlineFlow {
    fn from_nodes(nodes: &[&StyledNode]) -> Self {
        let mut flow = Self::default();
        for node in nodes {
            flow.collect(node);
        }
        flow
    }

    fn collect(&mut self, node: &StyledNode) {
        match node {
            StyledNode::Text { text, style } => {
                let run = self.run_index(style);
                self.push_text(text, run);
            }
            StyledNode::Element { tag: Tag::Br, .. } => {
                self.tokens.push(Token::Break);
                self.pending_space = false;
            }
            StyledNode::Element { children, .. } => {
                for child in children {
                    self.collect(child);
                }
            }
        }
    }

    fn run_index(&mut self, style: &ComputedStyle) -> usize {
        let run = RunStyle::from_style(style);
        match self.runs.iter().position(|r| *r == run) {
            Some(i) => i,
            None => {
                self.runs.push(run);
                self.runs.len() - 1
            }
        }
    }

    fn push_text(&mut self, text: &str, run: usize) {
        let mut word = String::new();
        for ch in text.chars() {
            // U+00A0 is Unicode whitespace but must not break or collapse.
            if ch.is_whitespace() && ch != '\u{a0}' {
                self.flush_word(&mut word, run);
                self.pending_space = true;
            } else {
                word.push(ch);
            }
        }
        self.flush_word(&mut word, run);
    }

    fn flush_word(&mut self, word: &mut String, run: usize) {
        if word.is_empty() {
            return;
        }
        self.tokens.push(Token::Word {
            text: std::mem::take(word),
            run,
            space_before: self.pending_space,
        });
        self.pending_space = false;
    }

    fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Break into lines no wider than `max_width` (a single word may
    /// overflow) and align them within it.
    fn lay_out(
        &self,
        fonts: &FontMetrics,
        max_width: f32,
        container: &ComputedStyle,
    ) -> Vec<TextLine> {
        let mut finished: Vec<PendingLine> = Vec::new();
        let mut line = PendingLine::default();

        for token in &self.tokens {
            match token {
                Token::Break => finished.push(std::mem::take(&mut line)),
                Token::Word {
                    text,
                    run,
                    space_before,
                } => {
                    let rs = &self.runs[*run];
                    let word_w = fonts.measure_text_width(text, rs.font_size, rs.key);
                    let mut space_w = if *space_before && !line.fragments.is_empty() {
                        fonts.measure_text_width(" ", rs.font_size, rs.key)
                    } else {
                        0.0
                    };
                    if !line.fragments.is_empty() && line.width + space_w + word_w > max_width + 0.01
                    {
                        finished.push(std::mem::take(&mut line));
                        space_w = 0.0;
                    }

                    let start = line.width + space_w;
                    match line.fragments.last_mut() {
                        Some(last) if last.0 == *run => {
                            if space_w > 0.0 {
                                last.1.push(' ');
                            }
                            last.1.push_str(text);
                            last.3 = start + word_w - last.2;
                        }
                        _ => line.fragments.push((*run, text.clone(), start, word_w)),
                    }
                    line.width = start + word_w;
                }
            }
        }
        if !line.fragments.is_empty() {
            finished.push(line);
        }

        let mut y = 0.0;
        finished
            .into_iter()
            .map(|pending| {
                let text_line = self.finish_line(pending, fonts, max_width, container, y);
                y += text_line.height;
                text_line
            })
            .collect()
    }

    fn finish_line(
        &self,
        pending: PendingLine,
        fonts: &FontMetrics,
        max_width: f32,
        container: &ComputedStyle,
        y_offset: f32,
    ) -> TextLine {
        let shift = if max_width.is_finite() {
            let free = (max_width - pending.width).max(0.0);
            match container.text_align {
                TextAlign::Left => 0.0,
                TextAlign::Center => free / 2.0,
                TextAlign::Right => free,
            }
        } else {
            0.0
        };

        let mut height = 0.0f32;
        let mut baseline = 0.0f32;
        for (run, ..) in &pending.fragments {
            let rs = &self.runs[*run];
            let ascent = fonts.ascender(rs.font_size, rs.key);
            let descent = fonts.descender(rs.font_size, rs.key);
            let half_leading = (rs.line_height - ascent - descent) / 2.0;
            height = height.max(rs.line_height);
            baseline = baseline.max(half_leading + ascent);
        }
        if pending.fragments.is_empty() {
            height = container.line_height_pt();
        }

        let fragments = pending
            .fragments
            .into_iter()
            .map(|(run, text, x, width)| {
                let rs = &self.runs[run];
                TextFragment {
                    text,
                    x_offset: x + shift,
                    width,
                    font: rs.key.family,
                    bold: rs.key.bold,
                    italic: rs.key.italic,
                    font_size: rs.font_size,
                    color: rs.color.to_array(),
                    underline: rs.decoration == TextDecoration::Underline,
                    line_through: rs.decoration == TextDecoration::LineThrough,
                }
            })
            .collect();

        TextLine {
            y_offset,
            height,
            baseline,
            fragments,
        }
    }
}

/// Children of a block container, grouped into runs of inline content and
/// single block-level elements.
enum FlowItem<'n> {
    Inline(Vec<&'n StyledNode>),
    Block(&'n StyledNode),
}

fn group_flow(children: &[StyledNode]) -> Vec<FlowItem<'_>> {
    let mut items = Vec::new();
    let mut run: Vec<&StyledNode> = Vec::new();
    for child in children {
        if child.is_inline() {
            run.push(child);
        } else {
            if !run.is_empty() {
                items.push(FlowItem::Inline(std::mem::take(&mut run)));
            }
            items.push(FlowItem::Block(child));
        }
    }
    if !run.is_empty() {
        items.push(FlowItem::Inline(run));
    }
    items
}

fn colspan(attrs: &HashMap<String, String>) -> usize {
    attrs
        .get("colspan")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .max(1)
}

/// Table cells of a row element.
fn row_cells(row: &StyledNode) -> Vec<&StyledNode> {
    match row {
        StyledNode::Element { children, .. } => children
            .iter()
            .filter(|c| c.style().display == Display::TableCell)
            .collect(),
        StyledNode::Text { .. } => Vec::new(),
    }
}

/// Rows of a table, looking through thead/tbody/tfoot.
fn table_rows(children: &[StyledNode]) -> Vec<&StyledNode> {
    let mut rows = Vec::new();
    for child in children {
        match child.style().display {
            Display::TableRow => rows.push(child),
            Display::TableSection => {
                if let StyledNode::Element { children, .. } = child {
                    rows.extend(
                        children
                            .iter()
                            .filter(|c| c.style().display == Display::TableRow),
                    );
                }
            }
            _ => {}
        }
    }
    rows
}

// ---------------------------------------------------------------------------
// Build Taffy tree from styled nodes
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: FontMetrics,
    images: &'a mut ImageStore,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(images: &'a mut ImageStore) -> Self {
        // Fractional widths; percentages must not be snapped to whole points.
        let mut taffy = TaffyTree::new();
        taffy.disable_rounding();
        Self {
            taffy,
            fonts: FontMetrics::new(),
            images,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
        }
    }

    /// Build a block-level node. `forced_width` is the border-box width
    /// assigned by a flex row or table; otherwise the node's own `width`
    /// (or the available width) applies.
    fn build_node(
        &mut self,
        node: &StyledNode,
        available: f32,
        forced_width: Option<f32>,
    ) -> Result<NodeId, RenderError> {
        match node {
            StyledNode::Text { style, .. } => {
                let container = ComputedStyle::inherit_from(style);
                let id = self.build_paragraph(&[node], &container, available)?;
                match id {
                    Some(id) => Ok(id),
                    None => Ok(self.taffy.new_leaf(Style::default())?),
                }
            }
            StyledNode::Element {
                tag,
                style,
                children,
                attrs,
            } => {
                if *tag == Tag::Img {
                    self.build_image(style, attrs, available, forced_width)
                } else if style.display == Display::Table {
                    self.build_table(style, children, available, forced_width)
                } else {
                    self.build_container(style, children, available, forced_width)
                }
            }
        }
    }

    fn box_width(style: &ComputedStyle, available: f32, forced_width: Option<f32>) -> f32 {
        forced_width
            .or_else(|| style.width.resolve(available))
            .unwrap_or(available - style.margin.left - style.margin.right)
            .max(0.0)
    }

    fn build_container(
        &mut self,
        style: &ComputedStyle,
        children: &[StyledNode],
        available: f32,
        forced_width: Option<f32>,
    ) -> Result<NodeId, RenderError> {
        let width = Self::box_width(style, available, forced_width);
        let inner = (width - style.horizontal_insets()).max(0.0);

        let child_ids = if style.display == Display::Flex && style.flex_direction == FlexDirection::Row
        {
            self.build_row_items(style, children, inner)?
        } else {
            self.build_flow(style, children, inner)?
        };

        let explicit = forced_width.or_else(|| style.width.resolve(available));
        let taffy_style = self.computed_to_taffy(style, explicit);
        let node = self.taffy.new_with_children(taffy_style, &child_ids)?;
        self.node_styles.insert(node, style.clone());
        Ok(node)
    }

    /// Vertical stacking with sibling margins collapsed.
    fn build_flow(
        &mut self,
        container: &ComputedStyle,
        children: &[StyledNode],
        inner: f32,
    ) -> Result<Vec<NodeId>, RenderError> {
        let mut ids = Vec::new();
        let mut prev_margin_bottom = 0.0f32;
        for item in group_flow(children) {
            match item {
                FlowItem::Inline(nodes) => {
                    if let Some(id) = self.build_paragraph(&nodes, container, inner)? {
                        ids.push(id);
                        prev_margin_bottom = 0.0;
                    }
                }
                FlowItem::Block(node) => {
                    let id = self.build_node(node, inner, None)?;
                    let margin = node.style().margin;
                    if prev_margin_bottom > 0.0 && margin.top > 0.0 {
                        let collapsed = (margin.top - prev_margin_bottom).max(0.0);
                        let mut ts = self.taffy.style(id)?.clone();
                        ts.margin.top = LengthPercentageAuto::Length(collapsed);
                        self.taffy.set_style(id, ts)?;
                    }
                    prev_margin_bottom = margin.bottom;
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Flex row items: explicit widths are honoured, the remaining items
    /// share what is left equally.
    fn build_row_items(
        &mut self,
        container: &ComputedStyle,
        children: &[StyledNode],
        inner: f32,
    ) -> Result<Vec<NodeId>, RenderError> {
        let mut items = group_flow(children);
        items.retain(|item| match item {
            FlowItem::Inline(nodes) => !InlineFlow::from_nodes(nodes).is_empty(),
            FlowItem::Block(_) => true,
        });
        let gap_total = container.gap * items.len().saturating_sub(1) as f32;
        let usable = (inner - gap_total).max(0.0);

        let explicit: Vec<Option<f32>> = items
            .iter()
            .map(|item| match item {
                FlowItem::Block(node) => node.style().width.resolve(inner).map(|w| {
                    w + node.style().margin.left + node.style().margin.right
                }),
                FlowItem::Inline(_) => None,
            })
            .collect();
        let fixed: f32 = explicit.iter().flatten().sum();
        let free_count = explicit.iter().filter(|w| w.is_none()).count();
        let share = if free_count > 0 {
            ((usable - fixed).max(0.0) / free_count as f32).max(1.0)
        } else {
            0.0
        };

        let mut ids = Vec::new();
        for (item, width) in items.iter().zip(explicit) {
            match item {
                FlowItem::Inline(nodes) => {
                    if let Some(id) = self.build_paragraph(nodes, container, share)? {
                        ids.push(id);
                    }
                }
                FlowItem::Block(node) => {
                    let style = node.style();
                    let outer = width.unwrap_or(share);
                    let border_box = (outer - style.margin.left - style.margin.right).max(0.0);
                    ids.push(self.build_node(node, outer, Some(border_box))?);
                }
            }
        }
        Ok(ids)
    }

    /// Anonymous paragraph leaf for a run of inline nodes. Returns `None`
    /// when the run is only collapsible whitespace.
    fn build_paragraph(
        &mut self,
        nodes: &[&StyledNode],
        container: &ComputedStyle,
        width: f32,
    ) -> Result<Option<NodeId>, RenderError> {
        let flow = InlineFlow::from_nodes(nodes);
        if flow.is_empty() {
            return Ok(None);
        }
        let lines = flow.lay_out(&self.fonts, width, container);
        let height: f32 = lines.iter().map(|l| l.height).sum();

        let taffy_style = Style {
            size: Size {
                width: taffy::Dimension::Length(width),
                height: taffy::Dimension::Length(height),
            },
            flex_shrink: 0.0,
            ..Default::default()
        };
        let node = self.taffy.new_leaf(taffy_style)?;
        self.node_styles
            .insert(node, ComputedStyle::inherit_from(container));
        self.node_content.insert(node, BoxContent::Text { lines });
        Ok(Some(node))
    }

    fn build_image(
        &mut self,
        style: &ComputedStyle,
        attrs: &HashMap<String, String>,
        available: f32,
        forced_width: Option<f32>,
    ) -> Result<NodeId, RenderError> {
        let src = attrs
            .get("src")
            .map(String::as_str)
            .unwrap_or_default();
        let (px_w, px_h, aspect) = {
            let img = self.images.load(src)?;
            (img.px_width as f32, img.px_height as f32, img.aspect_ratio())
        };

        let known_w = forced_width.or_else(|| style.width.resolve(available));
        let known_h = match style.height {
            style::Dimension::Px(v) => Some(v),
            _ => None,
        };
        // 1 px = 1 pt for intrinsic sizes.
        let (w, h) = match (known_w, known_h) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w / aspect),
            (None, Some(h)) => (h * aspect, h),
            (None, None) => (px_w, px_h),
        };

        let mut taffy_style = self.computed_to_taffy(style, Some(w));
        taffy_style.size.height = taffy::Dimension::Length(h);
        let node = self.taffy.new_leaf(taffy_style)?;
        self.node_styles.insert(node, style.clone());
        self.node_content.insert(
            node,
            BoxContent::Image {
                src: src.to_string(),
            },
        );
        Ok(node)
    }

    // -----------------------------------------------------------------------
    // Tables
    // -----------------------------------------------------------------------

    fn build_table(
        &mut self,
        style: &ComputedStyle,
        children: &[StyledNode],
        available: f32,
        forced_width: Option<f32>,
    ) -> Result<NodeId, RenderError> {
        let width = Self::box_width(style, available, forced_width);
        let inner = (width - style.horizontal_insets()).max(0.0);
        let columns = self.column_widths(&table_rows(children), inner);
        log::trace!("table columns: {columns:?}");

        let mut child_ids = Vec::new();
        for child in children {
            let StyledNode::Element {
                style: child_style,
                children: grandchildren,
                ..
            } = child
            else {
                continue;
            };
            match child_style.display {
                Display::TableRow => child_ids.push(self.build_row(child, &columns)?),
                Display::TableSection => {
                    let mut row_ids = Vec::new();
                    for row in grandchildren
                        .iter()
                        .filter(|c| c.style().display == Display::TableRow)
                    {
                        row_ids.push(self.build_row(row, &columns)?);
                    }
                    let mut ts = self.computed_to_taffy(child_style, None);
                    ts.size.width = taffy::Dimension::Percent(1.0);
                    let section = self.taffy.new_with_children(ts, &row_ids)?;
                    self.node_styles.insert(section, child_style.clone());
                    child_ids.push(section);
                }
                _ => child_ids.push(self.build_node(child, inner, None)?),
            }
        }

        let explicit = forced_width.or_else(|| style.width.resolve(available));
        let taffy_style = self.computed_to_taffy(style, explicit.or(Some(width)));
        let node = self.taffy.new_with_children(taffy_style, &child_ids)?;
        self.node_styles.insert(node, style.clone());
        Ok(node)
    }

    /// Explicit cell widths win; other columns get their max-content width,
    /// scaled proportionally to fill the table.
    fn column_widths(&self, rows: &[&StyledNode], inner: f32) -> Vec<f32> {
        let count = rows
            .iter()
            .map(|row| {
                row_cells(row)
                    .iter()
                    .map(|c| match c {
                        StyledNode::Element { attrs, .. } => colspan(attrs),
                        StyledNode::Text { .. } => 1,
                    })
                    .sum::<usize>()
            })
            .max()
            .unwrap_or(0);

        let mut explicit: Vec<Option<f32>> = vec![None; count];
        let mut natural = vec![0.0f32; count];
        for row in rows {
            let mut col = 0;
            for cell in row_cells(row) {
                let StyledNode::Element { style, attrs, .. } = cell else {
                    continue;
                };
                let span = colspan(attrs);
                if span == 1 && col < count {
                    if explicit[col].is_none() {
                        explicit[col] = style.width.resolve(inner);
                    }
                    natural[col] = natural[col].max(self.max_content_width(cell));
                }
                col += span;
            }
        }

        let fixed: f32 = explicit.iter().flatten().sum();
        let auto_space = (inner - fixed).max(0.0);
        let auto_natural: f32 = explicit
            .iter()
            .zip(&natural)
            .filter(|(e, _)| e.is_none())
            .map(|(_, n)| *n)
            .sum();
        let auto_count = explicit.iter().filter(|e| e.is_none()).count();

        explicit
            .iter()
            .zip(&natural)
            .map(|(e, n)| match e {
                Some(w) => *w,
                None if auto_natural > 0.0 => auto_space * n / auto_natural,
                None => auto_space / auto_count.max(1) as f32,
            })
            .collect()
    }

    /// Widest unbreakable line of a subtree, including box insets.
    fn max_content_width(&self, node: &StyledNode) -> f32 {
        match node {
            StyledNode::Text { style, .. } => {
                let flow = InlineFlow::from_nodes(&[node]);
                widest_line(&flow.lay_out(&self.fonts, f32::INFINITY, style))
            }
            StyledNode::Element {
                style, children, ..
            } => {
                let content = group_flow(children)
                    .iter()
                    .map(|item| match item {
                        FlowItem::Inline(nodes) => {
                            let flow = InlineFlow::from_nodes(nodes);
                            widest_line(&flow.lay_out(&self.fonts, f32::INFINITY, style))
                        }
                        FlowItem::Block(child) => {
                            let m = child.style().margin;
                            self.max_content_width(child) + m.left + m.right
                        }
                    })
                    .fold(0.0f32, f32::max);
                match style.width {
                    style::Dimension::Px(w) => w,
                    _ => content + style.horizontal_insets(),
                }
            }
        }
    }

    fn build_row(&mut self, row: &StyledNode, columns: &[f32]) -> Result<NodeId, RenderError> {
        let mut cell_ids = Vec::new();
        let mut col = 0;
        for cell in row_cells(row) {
            let StyledNode::Element { attrs, .. } = cell else {
                continue;
            };
            let span = colspan(attrs);
            let end = (col + span).min(columns.len());
            let width = columns
                .get(col..end)
                .map(|c| c.iter().sum::<f32>())
                .unwrap_or(0.0);
            col += span;
            cell_ids.push(self.build_node(cell, width, Some(width))?);
        }

        let style = row.style();
        let mut ts = self.computed_to_taffy(style, None);
        ts.flex_direction = taffy::FlexDirection::Row;
        ts.align_items = Some(taffy::AlignItems::Stretch);
        ts.size.width = taffy::Dimension::Percent(1.0);
        let node = self.taffy.new_with_children(ts, &cell_ids)?;
        self.node_styles.insert(node, style.clone());
        Ok(node)
    }

    // -----------------------------------------------------------------------
    // Style conversion
    // -----------------------------------------------------------------------

    fn computed_to_taffy(&self, s: &ComputedStyle, width: Option<f32>) -> Style {
        let mut ts = Style {
            display: taffy::Display::Flex,
            flex_direction: taffy::FlexDirection::Column,
            flex_shrink: 0.0,
            ..Default::default()
        };

        match s.display {
            Display::Flex => {
                ts.flex_direction = match s.flex_direction {
                    FlexDirection::Row => taffy::FlexDirection::Row,
                    FlexDirection::Column => taffy::FlexDirection::Column,
                };
                ts.justify_content = Some(match s.justify_content {
                    style::JustifyContent::Start => taffy::JustifyContent::Start,
                    style::JustifyContent::End => taffy::JustifyContent::End,
                    style::JustifyContent::Center => taffy::JustifyContent::Center,
                    style::JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
                    style::JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
                    style::JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
                });
                ts.align_items = Some(match s.align_items {
                    style::AlignItems::Start => taffy::AlignItems::Start,
                    style::AlignItems::End => taffy::AlignItems::End,
                    style::AlignItems::Center => taffy::AlignItems::Center,
                    style::AlignItems::Stretch => taffy::AlignItems::Stretch,
                });
                ts.gap = Size {
                    width: LengthPercentage::Length(s.gap),
                    height: LengthPercentage::Length(s.gap),
                };
            }
            // Cell content sits in the vertical middle of the row.
            Display::TableCell => ts.justify_content = Some(taffy::JustifyContent::Center),
            Display::None => ts.display = taffy::Display::None,
            _ => {}
        }

        ts.size = Size {
            width: match width {
                Some(w) => taffy::Dimension::Length(w),
                None => taffy::Dimension::Auto,
            },
            height: match s.height {
                style::Dimension::Px(h) => taffy::Dimension::Length(h),
                _ => taffy::Dimension::Auto,
            },
        };
        ts.min_size.width = taffy::Dimension::Length(0.0);

        ts.margin = Rect {
            top: LengthPercentageAuto::Length(s.margin.top),
            right: LengthPercentageAuto::Length(s.margin.right),
            bottom: LengthPercentageAuto::Length(s.margin.bottom),
            left: LengthPercentageAuto::Length(s.margin.left),
        };
        ts.padding = Rect {
            top: LengthPercentage::Length(s.padding.top),
            right: LengthPercentage::Length(s.padding.right),
            bottom: LengthPercentage::Length(s.padding.bottom),
            left: LengthPercentage::Length(s.padding.left),
        };
        ts.border = Rect {
            top: LengthPercentage::Length(s.border.top.width),
            right: LengthPercentage::Length(s.border.right.width),
            bottom: LengthPercentage::Length(s.border.bottom.width),
            left: LengthPercentage::Length(s.border.left.width),
        };
        ts
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, RenderError> {
        let layout = self.taffy.layout(node)?;
        let style = self.node_styles.get(&node).cloned().unwrap_or_default();
        let content = self
            .node_content
            .get(&node)
            .cloned()
            .unwrap_or(BoxContent::None);

        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)?
            .iter()
            .map(|&child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style,
            content,
            children,
        })
    }
}

fn widest_line(lines: &[TextLine]) -> f32 {
    lines
        .iter()
        .filter_map(|l| l.fragments.last().map(|f| f.x_offset + f.width))
        .fold(0.0f32, f32::max)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute layout for a styled tree, returning the top-level positioned
/// boxes in document coordinates (x already includes the page margin).
pub fn compute_layout(
    styled_nodes: &[StyledNode],
    page_width: f32,
    page_margin: f32,
    images: &mut ImageStore,
) -> Result<Vec<PositionedBox>, RenderError> {
    let content_width = (page_width - 2.0 * page_margin).max(0.0);
    let mut builder = LayoutBuilder::new(images);

    let root_style = ComputedStyle::default();
    let child_ids = builder.build_flow(&root_style, styled_nodes, content_width)?;

    let root = builder.taffy.new_with_children(
        Style {
            display: taffy::Display::Flex,
            flex_direction: taffy::FlexDirection::Column,
            size: Size {
                width: taffy::Dimension::Length(content_width),
                height: taffy::Dimension::Auto,
            },
            ..Default::default()
        },
        &child_ids,
    )?;

    builder.taffy.compute_layout(
        root,
        Size {
            width: AvailableSpace::Definite(content_width),
            height: AvailableSpace::MaxContent,
        },
    )?;

    let root_box = builder.extract(root, page_margin, 0.0)?;
    Ok(root_box.children)
}
