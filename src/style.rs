//! Style resolver – cascades tag defaults, `<style>` sheets and inline
//! `style` attributes into a flat [`ComputedStyle`] consumed by the layout
//! engine.
//!
//! Selector support is limited to what invoice templates need: type, class,
//! id, `tag.class` compounds, descendant chains (`>` is treated as a
//! descendant combinator) and comma-separated lists. `!important` is
//! accepted and ignored. Lengths resolve to points with 1px = 1pt.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dom::{DomNode, ElementNode, Tag};

/// Font size of the document root, used for `rem` and the initial style.
pub const ROOT_FONT_SIZE: f32 = 16.0;

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    // Layout
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub justify_content: JustifyContent,
    pub align_items: AlignItems,
    pub gap: f32,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,

    // Box model (pt)
    pub margin: Edges<f32>,
    pub padding: Edges<f32>,
    pub border: Edges<BorderSide>,

    // Typography (inherited)
    pub font_size: f32,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub font_family: FontFamily,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub text_decoration: TextDecoration,

    pub background_color: Color,

    // Pagination hints
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub page_break_inside_avoid: bool,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            justify_content: JustifyContent::Start,
            align_items: AlignItems::Stretch,
            gap: 0.0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            margin: Edges::default(),
            padding: Edges::default(),
            border: Edges::default(),
            font_size: ROOT_FONT_SIZE,
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            font_family: FontFamily::Helvetica,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.3,
            text_decoration: TextDecoration::None,
            background_color: Color::TRANSPARENT,
            page_break_before: false,
            page_break_after: false,
            page_break_inside_avoid: false,
        }
    }
}

impl ComputedStyle {
    /// Initial style of a child: text properties copied from `parent`, box
    /// properties reset.
    pub fn inherit_from(parent: &ComputedStyle) -> Self {
        Self {
            font_size: parent.font_size,
            font_weight: parent.font_weight,
            font_style: parent.font_style,
            font_family: parent.font_family,
            color: parent.color,
            text_align: parent.text_align,
            line_height: parent.line_height,
            // Not inherited in CSS, but decorations propagate to all
            // descendant text, which is what the renderer needs.
            text_decoration: parent.text_decoration,
            ..Self::default()
        }
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.font_style == FontStyle::Italic
    }

    /// Line box height in pt.
    pub fn line_height_pt(&self) -> f32 {
        self.font_size * self.line_height
    }

    pub fn horizontal_insets(&self) -> f32 {
        self.padding.left + self.padding.right + self.border.left.width + self.border.right.width
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Inline,
    Table,
    TableSection,
    TableRow,
    TableCell,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Normal,
    Italic,
}

/// The three PDF base-14 families; CSS family lists map onto one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontFamily {
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Pick the first recognisable family from a CSS `font-family` list.
    pub fn from_css(list: &str) -> Self {
        for name in list.split(',') {
            let name = name.trim().trim_matches(['"', '\'']).to_ascii_lowercase();
            match name.as_str() {
                "helvetica" | "arial" | "sans-serif" | "verdana" | "system-ui" => {
                    return FontFamily::Helvetica
                }
                "times" | "times new roman" | "georgia" | "serif" => return FontFamily::Times,
                "courier" | "courier new" | "monospace" | "consolas" => {
                    return FontFamily::Courier
                }
                _ => {}
            }
        }
        FontFamily::Helvetica
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDecoration {
    None,
    Underline,
    LineThrough,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against the containing block size.
    pub fn resolve(&self, container: f32) -> Option<f32> {
        match *self {
            Dimension::Auto => None,
            Dimension::Px(v) => Some(v),
            Dimension::Percent(p) => Some(container * p / 100.0),
        }
    }
}

/// Per-side values in top, right, bottom, left order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges<T> {
    pub top: T,
    pub right: T,
    pub bottom: T,
    pub left: T,
}

impl<T: Copy> Edges<T> {
    pub fn all(v: T) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

/// One side of a border. A zero width means no border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderSide {
    pub width: f32,
    pub color: Color,
}

impl Default for BorderSide {
    fn default() -> Self {
        Self {
            width: 0.0,
            color: Color::BLACK,
        }
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb8(0, 0, 0);
    pub const WHITE: Self = Self::rgb8(255, 255, 255);
    pub const GRAY: Self = Self::rgb8(128, 128, 128);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb8(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb8(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Parse `#hex`, `rgb(r, g, b)` or a common colour keyword.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with('#') {
            return Self::from_hex(value);
        }
        if let Some(args) = value
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let parts: Vec<u8> = args
                .split(',')
                .filter_map(|p| p.trim().parse::<f32>().ok())
                .map(|v| v.clamp(0.0, 255.0) as u8)
                .collect();
            return match parts.as_slice() {
                [r, g, b] => Some(Self::rgb8(*r, *g, *b)),
                _ => None,
            };
        }
        let named = match value.to_ascii_lowercase().as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "gray" | "grey" => Self::GRAY,
            "darkgray" | "darkgrey" => Self::rgb8(169, 169, 169),
            "lightgray" | "lightgrey" => Self::rgb8(211, 211, 211),
            "silver" => Self::rgb8(192, 192, 192),
            "red" => Self::rgb8(255, 0, 0),
            "green" => Self::rgb8(0, 128, 0),
            "blue" => Self::rgb8(0, 0, 255),
            "navy" => Self::rgb8(0, 0, 128),
            "maroon" => Self::rgb8(128, 0, 0),
            "orange" => Self::rgb8(255, 165, 0),
            "transparent" => Self::TRANSPARENT,
            _ => return None,
        };
        Some(named)
    }
}

// ---------------------------------------------------------------------------
// Stylesheets
// ---------------------------------------------------------------------------

/// A parsed `<style>` sheet.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Selector,
    specificity: (u32, u32, u32),
    order: usize,
    declarations: Vec<(String, String)>,
}

/// Descendant chain of compound selectors; the last one is the subject.
#[derive(Debug, Clone, PartialEq)]
struct Selector {
    parts: Vec<Compound>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(token: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let mut rest = token;
        let tag_end = rest.find(['.', '#']).unwrap_or(rest.len());
        let tag = &rest[..tag_end];
        if !tag.is_empty() && tag != "*" {
            if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return None;
            }
            compound.tag = Some(tag.to_ascii_lowercase());
        }
        rest = &rest[tag_end..];
        while !rest.is_empty() {
            let marker = rest.as_bytes()[0];
            let body = &rest[1..];
            let end = body.find(['.', '#']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return None;
            }
            match marker {
                b'.' => compound.classes.push(name.to_string()),
                b'#' => compound.id = Some(name.to_string()),
                _ => return None,
            }
            rest = &body[end..];
        }
        Some(compound)
    }

    fn matches(&self, element: &ElementNode) -> bool {
        if let Some(tag) = &self.tag {
            if tag != element.tag.name() {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        let classes = element.classes();
        self.classes.iter().all(|c| classes.contains(&c.as_str()))
    }
}

impl Selector {
    fn parse(text: &str) -> Option<Self> {
        let parts = text
            .replace('>', " ")
            .split_whitespace()
            .map(Compound::parse)
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(Self { parts })
    }

    fn specificity(&self) -> (u32, u32, u32) {
        self.parts.iter().fold((0, 0, 0), |(a, b, c), part| {
            (
                a + part.id.is_some() as u32,
                b + part.classes.len() as u32,
                c + part.tag.is_some() as u32,
            )
        })
    }

    /// `ancestors` is ordered root first, nearest parent last.
    fn matches(&self, element: &ElementNode, ancestors: &[&ElementNode]) -> bool {
        let Some((subject, rest)) = self.parts.split_last() else {
            return false;
        };
        if !subject.matches(element) {
            return false;
        }
        let mut remaining = rest.iter().rev().peekable();
        for ancestor in ancestors.iter().rev() {
            match remaining.peek() {
                Some(part) if part.matches(ancestor) => {
                    remaining.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        remaining.peek().is_none()
    }
}

impl Stylesheet {
    /// Parse CSS text. Unparseable rules and at-rules are skipped.
    pub fn parse(css: &str) -> Self {
        let css = strip_comments(css);
        let mut rules = Vec::new();
        let mut rest = css.as_str();

        while let Some(open) = rest.find('{') {
            let prelude = rest[..open].trim();
            let after = &rest[open + 1..];
            if prelude.starts_with('@') {
                rest = skip_block(after);
                continue;
            }
            let Some(close) = after.find('}') else {
                break;
            };
            let declarations = parse_declarations(&after[..close]);
            for selector_text in prelude.split(',') {
                match Selector::parse(selector_text.trim()) {
                    Some(selector) => {
                        let specificity = selector.specificity();
                        rules.push(Rule {
                            selector,
                            specificity,
                            order: rules.len(),
                            declarations: declarations.clone(),
                        });
                    }
                    None => log::debug!("ignoring unsupported selector {selector_text:?}"),
                }
            }
            rest = &after[close + 1..];
        }

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Declarations of all matching rules in cascade order.
    fn matching_declarations(
        &self,
        element: &ElementNode,
        ancestors: &[&ElementNode],
    ) -> Vec<(String, String)> {
        let mut matched: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.selector.matches(element, ancestors))
            .collect();
        matched.sort_by_key(|r| (r.specificity, r.order));
        matched
            .into_iter()
            .flat_map(|r| r.declarations.iter().cloned())
            .collect()
    }
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Skip past the `}` closing a block whose `{` was already consumed,
/// honouring nested blocks.
fn skip_block(s: &str) -> &str {
    let mut depth = 1;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &s[i + 1..];
                }
            }
            _ => {}
        }
    }
    ""
}

/// Split `prop: value; ...` into lower-cased property / trimmed value pairs.
fn parse_declarations(block: &str) -> Vec<(String, String)> {
    block
        .split(';')
        .filter_map(|decl| {
            let (prop, val) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let val = val.trim();
            let val = val.strip_suffix("!important").unwrap_or(val).trim();
            if prop.is_empty() || val.is_empty() {
                None
            } else {
                Some((prop, val.to_string()))
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element.
///
/// `ancestors` is ordered root first; `parent` is the computed style of the
/// nearest ancestor (or `None` for the root).
pub fn resolve_style(
    element: &ElementNode,
    ancestors: &[&ElementNode],
    parent: Option<&ComputedStyle>,
    sheet: &Stylesheet,
) -> ComputedStyle {
    let root = ComputedStyle::default();
    let parent = parent.unwrap_or(&root);
    let mut style = base_style_for_tag(&element.tag, parent);

    let mut declarations = sheet.matching_declarations(element, ancestors);
    if let Some(inline) = element.inline_style() {
        declarations.extend(parse_declarations(inline));
    }

    // font-size first so `em` lengths in the same block use the new size.
    for (prop, val) in declarations.iter().filter(|(p, _)| p == "font-size" || p == "font") {
        apply_css_property(&mut style, parent, prop, val);
    }
    for (prop, val) in declarations.iter().filter(|(p, _)| p != "font-size" && p != "font") {
        apply_css_property(&mut style, parent, prop, val);
    }

    style
}

/// Default styles based on tag semantics, relative to the parent style.
fn base_style_for_tag(tag: &Tag, parent: &ComputedStyle) -> ComputedStyle {
    let mut s = ComputedStyle::inherit_from(parent);
    let em = parent.font_size;
    match tag {
        Tag::Head | Tag::Title | Tag::Meta | Tag::Link | Tag::Style | Tag::Script | Tag::Input => {
            s.display = Display::None;
        }
        Tag::H1 => heading(&mut s, em * 2.0, 0.67),
        Tag::H2 => heading(&mut s, em * 1.5, 0.83),
        Tag::H3 => heading(&mut s, em * 1.17, 1.0),
        Tag::P => {
            s.margin.top = em;
            s.margin.bottom = em;
        }
        Tag::Ul | Tag::Ol => {
            s.margin.top = em;
            s.margin.bottom = em;
            s.padding.left = 40.0;
        }
        Tag::Hr => {
            s.margin.top = em * 0.5;
            s.margin.bottom = em * 0.5;
            s.border.top = BorderSide {
                width: 1.0,
                color: Color::GRAY,
            };
        }
        Tag::Span | Tag::Br | Tag::Em | Tag::I => {
            s.display = Display::Inline;
            if matches!(tag, Tag::Em | Tag::I) {
                s.font_style = FontStyle::Italic;
            }
        }
        Tag::Strong | Tag::B => {
            s.display = Display::Inline;
            s.font_weight = FontWeight::Bold;
        }
        Tag::A => {
            s.display = Display::Inline;
            s.color = Color::rgb8(0, 0, 238);
            s.text_decoration = TextDecoration::Underline;
        }
        Tag::Table => s.display = Display::Table,
        Tag::Thead | Tag::Tbody | Tag::Tfoot => s.display = Display::TableSection,
        Tag::Tr => s.display = Display::TableRow,
        Tag::Td | Tag::Th => {
            s.display = Display::TableCell;
            s.padding = Edges::all(1.0);
            if *tag == Tag::Th {
                s.font_weight = FontWeight::Bold;
                s.text_align = TextAlign::Center;
            }
        }
        Tag::Html | Tag::Body | Tag::Div | Tag::Li | Tag::Img | Tag::Unknown(_) => {}
    }
    s
}

fn heading(s: &mut ComputedStyle, size: f32, margin_em: f32) {
    s.font_size = size;
    s.font_weight = FontWeight::Bold;
    s.margin.top = size * margin_em;
    s.margin.bottom = size * margin_em;
}

fn apply_css_property(s: &mut ComputedStyle, parent: &ComputedStyle, prop: &str, val: &str) {
    let em = s.font_size;
    match prop {
        "display" => {
            s.display = match val {
                "flex" | "inline-flex" => Display::Flex,
                "block" | "inline-block" | "list-item" => Display::Block,
                "inline" => Display::Inline,
                "table" => Display::Table,
                "table-row" => Display::TableRow,
                "table-cell" => Display::TableCell,
                "none" => Display::None,
                _ => s.display,
            }
        }
        "flex-direction" => {
            s.flex_direction = match val {
                "column" | "column-reverse" => FlexDirection::Column,
                _ => FlexDirection::Row,
            }
        }
        "justify-content" => {
            s.justify_content = match val {
                "flex-end" | "end" | "right" => JustifyContent::End,
                "center" => JustifyContent::Center,
                "space-between" => JustifyContent::SpaceBetween,
                "space-around" => JustifyContent::SpaceAround,
                "space-evenly" => JustifyContent::SpaceEvenly,
                _ => JustifyContent::Start,
            }
        }
        "align-items" => {
            s.align_items = match val {
                "flex-start" | "start" => AlignItems::Start,
                "flex-end" | "end" => AlignItems::End,
                "center" => AlignItems::Center,
                _ => AlignItems::Stretch,
            }
        }
        "gap" => {
            if let Some(px) = parse_length(val, em) {
                s.gap = px;
            }
        }
        "width" => s.width = parse_dimension(val, em),
        "height" => s.height = parse_dimension(val, em),
        "margin" => {
            if let Some(edges) = parse_edges(val, em) {
                s.margin = edges;
            }
        }
        "padding" => {
            if let Some(edges) = parse_edges(val, em) {
                s.padding = edges;
            }
        }
        "margin-top" | "margin-right" | "margin-bottom" | "margin-left" | "padding-top"
        | "padding-right" | "padding-bottom" | "padding-left" => {
            if let Some(px) = parse_length(val, em) {
                let (box_prop, side) = prop.split_once('-').unwrap_or((prop, ""));
                let edges = if box_prop == "margin" {
                    &mut s.margin
                } else {
                    &mut s.padding
                };
                set_side(edges, side, px);
            }
        }
        "border" => {
            let side = parse_border(val, em);
            s.border = Edges::all(side);
        }
        "border-top" | "border-right" | "border-bottom" | "border-left" => {
            let side = parse_border(val, em);
            let name = prop.trim_start_matches("border-");
            set_side(&mut s.border, name, side);
        }
        "border-width" => {
            if let Some(widths) = parse_edges(val, em) {
                s.border.top.width = widths.top;
                s.border.right.width = widths.right;
                s.border.bottom.width = widths.bottom;
                s.border.left.width = widths.left;
            }
        }
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border.top.color = c;
                s.border.right.color = c;
                s.border.bottom.color = c;
                s.border.left.color = c;
            }
        }
        "border-style" => {
            if matches!(val, "none" | "hidden") {
                s.border = Edges::default();
            }
        }
        "font-size" => {
            if let Some(px) = parse_font_size(val, parent.font_size) {
                s.font_size = px;
            }
        }
        "font-weight" => {
            s.font_weight = match val {
                "bold" | "bolder" => FontWeight::Bold,
                v => match v.parse::<u32>() {
                    Ok(n) if n >= 600 => FontWeight::Bold,
                    _ => FontWeight::Normal,
                },
            }
        }
        "font-style" => {
            s.font_style = match val {
                "italic" | "oblique" => FontStyle::Italic,
                _ => FontStyle::Normal,
            }
        }
        "font-family" => s.font_family = FontFamily::from_css(val),
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.text_decoration = if val.contains("line-through") {
                TextDecoration::LineThrough
            } else if val.contains("underline") {
                TextDecoration::Underline
            } else {
                TextDecoration::None
            }
        }
        "line-height" => {
            if val == "normal" {
                s.line_height = ComputedStyle::default().line_height;
            } else if let Ok(factor) = val.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(px) = parse_length(val, em) {
                if em > 0.0 {
                    s.line_height = px / em;
                }
            }
        }
        "break-before" | "page-break-before" => {
            s.page_break_before = val == "always" || val == "page";
        }
        "break-after" | "page-break-after" => {
            s.page_break_after = val == "always" || val == "page";
        }
        "break-inside" | "page-break-inside" => {
            s.page_break_inside_avoid = val == "avoid";
        }
        _ => log::debug!("ignoring unsupported CSS property {prop}: {val}"),
    }
}

fn set_side<T>(edges: &mut Edges<T>, side: &str, value: T) {
    match side {
        "top" => edges.top = value,
        "right" => edges.right = value,
        "bottom" => edges.bottom = value,
        "left" => edges.left = value,
        _ => {}
    }
}

/// Parse a length in px, pt, em or rem. Percentages are not lengths here.
fn parse_length(s: &str, em: f32) -> Option<f32> {
    let s = s.trim();
    if s == "0" || s == "auto" {
        return Some(0.0);
    }
    let (number, factor) = if let Some(n) = s.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix("pt") {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix("rem") {
        (n, ROOT_FONT_SIZE)
    } else if let Some(n) = s.strip_suffix("em") {
        (n, em)
    } else {
        (s, 1.0)
    };
    number.trim().parse::<f32>().ok().map(|v| v * factor)
}

fn parse_font_size(s: &str, parent_size: f32) -> Option<f32> {
    let s = s.trim();
    match s {
        "x-small" => return Some(10.0),
        "small" => return Some(13.0),
        "medium" => return Some(ROOT_FONT_SIZE),
        "large" => return Some(18.0),
        "x-large" => return Some(24.0),
        "smaller" => return Some(parent_size / 1.2),
        "larger" => return Some(parent_size * 1.2),
        _ => {}
    }
    if let Some(p) = s.strip_suffix('%') {
        return p.trim().parse::<f32>().ok().map(|v| parent_size * v / 100.0);
    }
    parse_length(s, parent_size)
}

fn parse_dimension(s: &str, em: f32) -> Dimension {
    let s = s.trim();
    if s == "auto" {
        Dimension::Auto
    } else if let Some(p) = s.strip_suffix('%') {
        p.trim()
            .parse::<f32>()
            .map(Dimension::Percent)
            .unwrap_or(Dimension::Auto)
    } else {
        parse_length(s, em)
            .map(Dimension::Px)
            .unwrap_or(Dimension::Auto)
    }
}

/// CSS 1–4 value box shorthand.
fn parse_edges(val: &str, em: f32) -> Option<Edges<f32>> {
    let parts: Vec<f32> = val
        .split_whitespace()
        .map(|p| parse_length(p, em))
        .collect::<Option<Vec<_>>>()?;
    let edges = match parts.as_slice() {
        [a] => Edges::all(*a),
        [v, h] => Edges {
            top: *v,
            right: *h,
            bottom: *v,
            left: *h,
        },
        [t, h, b] => Edges {
            top: *t,
            right: *h,
            bottom: *b,
            left: *h,
        },
        [t, r, b, l] => Edges {
            top: *t,
            right: *r,
            bottom: *b,
            left: *l,
        },
        _ => return None,
    };
    Some(edges)
}

/// `1px solid #ddd` in any order; `none` clears the side.
fn parse_border(val: &str, em: f32) -> BorderSide {
    let mut side = BorderSide {
        width: 1.0,
        color: Color::BLACK,
    };
    for token in val.split_whitespace() {
        match token {
            "none" | "hidden" => return BorderSide::default(),
            "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge" | "inset" | "outset" => {}
            "thin" => side.width = 1.0,
            "medium" => side.width = 3.0,
            "thick" => side.width = 5.0,
            t => {
                if let Some(c) = Color::parse(t) {
                    side.color = c;
                } else if let Some(w) = parse_length(t, em) {
                    side.width = w;
                }
            }
        }
    }
    side
}

// ---------------------------------------------------------------------------
// Styled DOM tree
// ---------------------------------------------------------------------------

/// A DOM node annotated with its computed style.
#[derive(Debug, Clone)]
pub enum StyledNode {
    Element {
        tag: Tag,
        style: ComputedStyle,
        children: Vec<StyledNode>,
        /// Original attributes (image src, colspan, ...).
        attrs: HashMap<String, String>,
    },
    Text {
        text: String,
        style: ComputedStyle,
    },
}

impl StyledNode {
    pub fn style(&self) -> &ComputedStyle {
        match self {
            StyledNode::Element { style, .. } | StyledNode::Text { style, .. } => style,
        }
    }

    /// True for text and inline elements (spans, `<br>`, links, ...).
    pub fn is_inline(&self) -> bool {
        match self {
            StyledNode::Text { .. } => true,
            StyledNode::Element { style, .. } => style.display == Display::Inline,
        }
    }
}

/// Build a styled tree from DOM nodes, resolving styles top-down.
pub fn build_styled_tree(
    nodes: &[DomNode],
    parent_style: Option<&ComputedStyle>,
    sheet: &Stylesheet,
) -> Vec<StyledNode> {
    let mut ancestors = Vec::new();
    build_children(nodes, parent_style, sheet, &mut ancestors)
}

/// Style a single element (e.g. `<body>`) together with its subtree.
pub fn build_styled_element(element: &ElementNode, sheet: &Stylesheet) -> StyledNode {
    let mut ancestors = Vec::new();
    build_element(element, None, sheet, &mut ancestors)
}

fn build_children<'a>(
    nodes: &'a [DomNode],
    parent_style: Option<&ComputedStyle>,
    sheet: &Stylesheet,
    ancestors: &mut Vec<&'a ElementNode>,
) -> Vec<StyledNode> {
    let mut result = Vec::new();
    for node in nodes {
        match node {
            DomNode::Element(e) => {
                let styled = build_element(e, parent_style, sheet, ancestors);
                if styled.style().display != Display::None {
                    result.push(styled);
                }
            }
            DomNode::Text(text) => {
                if !text.is_empty() {
                    let style = parent_style
                        .map(ComputedStyle::inherit_from)
                        .unwrap_or_default();
                    result.push(StyledNode::Text {
                        text: text.clone(),
                        style,
                    });
                }
            }
        }
    }
    result
}

fn build_element<'a>(
    e: &'a ElementNode,
    parent_style: Option<&ComputedStyle>,
    sheet: &Stylesheet,
    ancestors: &mut Vec<&'a ElementNode>,
) -> StyledNode {
    let style = resolve_style(e, ancestors, parent_style, sheet);
    ancestors.push(e);
    let children = build_children(&e.children, Some(&style), sheet, ancestors);
    ancestors.pop();
    StyledNode::Element {
        tag: e.tag.clone(),
        style,
        children,
        attrs: e.attributes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    fn element(html: &str) -> ElementNode {
        match parse_html(html).unwrap().remove(0) {
            DomNode::Element(e) => e,
            DomNode::Text(_) => panic!("expected element"),
        }
    }

    #[test]
    fn inline_style_font_size_and_color() {
        let e = element(r#"<div style="font-size: 24px; color: #ff0000">x</div>"#);
        let s = resolve_style(&e, &[], None, &Stylesheet::default());
        assert_eq!(s.font_size, 24.0);
        assert!((s.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn em_lengths_use_element_font_size() {
        let parent = ComputedStyle {
            font_size: 10.0,
            ..ComputedStyle::default()
        };
        let e = element(r#"<p style="font-size: 2em; margin-top: 1.5em;">x</p>"#);
        let s = resolve_style(&e, &[], Some(&parent), &Stylesheet::default());
        assert_eq!(s.font_size, 20.0);
        assert_eq!(s.margin.top, 30.0);
        // Default bottom margin is 1em of the parent.
        assert_eq!(s.margin.bottom, 10.0);
    }

    #[test]
    fn margin_shorthand() {
        let e = element(r#"<hr style="margin: 2em 0;" />"#);
        let s = resolve_style(&e, &[], None, &Stylesheet::default());
        assert_eq!(s.margin.top, 32.0);
        assert_eq!(s.margin.left, 0.0);
        assert_eq!(s.border.top.width, 1.0);
    }

    #[test]
    fn line_through_decoration() {
        let e = element(r#"<span style="text-decoration: line-through; color: gray;">$50.00</span>"#);
        let s = resolve_style(&e, &[], None, &Stylesheet::default());
        assert_eq!(s.text_decoration, TextDecoration::LineThrough);
        assert_eq!(s.color, Color::GRAY);
        assert_eq!(s.display, Display::Inline);
    }

    #[test]
    fn stylesheet_type_class_and_descendant_selectors() {
        let sheet = Stylesheet::parse(
            r#"
            /* light lines */
            body { font-size: 12px; }
            td.price, th.price { text-align: right; }
            thead tr { border-bottom: 1px solid #ddd; }
            table, th, td { border-style: none !important; }
            @page { margin: 0; }
            "#,
        );
        let table = element(
            r#"<table><thead><tr><th class="price">Price</th></tr></thead></table>"#,
        );
        let DomNode::Element(thead) = &table.children[0] else {
            panic!("thead")
        };
        let DomNode::Element(tr) = &thead.children[0] else {
            panic!("tr")
        };
        let DomNode::Element(th) = &tr.children[0] else {
            panic!("th")
        };

        let tr_style = resolve_style(tr, &[&table, thead], None, &sheet);
        assert_eq!(tr_style.border.bottom.width, 1.0);
        assert_eq!(tr_style.border.top.width, 0.0);

        let th_style = resolve_style(th, &[&table, thead, tr], None, &sheet);
        assert_eq!(th_style.text_align, TextAlign::Right);
        assert_eq!(th_style.border.bottom.width, 0.0);

        // `thead tr` does not match a row outside a thead.
        let lone_tr = element("<tr><td>x</td></tr>");
        let s = resolve_style(&lone_tr, &[], None, &sheet);
        assert_eq!(s.border.bottom.width, 0.0);
    }

    #[test]
    fn specificity_beats_source_order() {
        let sheet = Stylesheet::parse("td.price { color: #ff0000 } td { color: #0000ff }");
        let td = element(r#"<td class="price">1</td>"#);
        let s = resolve_style(&td, &[], None, &sheet);
        assert!((s.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn inherited_text_properties() {
        let sheet = Stylesheet::parse("div { color: #00B67A; font-weight: bold }");
        let nodes = parse_html("<div><span>tech</span></div>").unwrap();
        let styled = build_styled_tree(&nodes, None, &sheet);
        let StyledNode::Element { children, .. } = &styled[0] else {
            panic!("div")
        };
        let span = children[0].style();
        assert!(span.is_bold());
        assert_eq!(span.color, Color::from_hex("#00B67A").unwrap());
    }

    #[test]
    fn head_elements_are_not_styled_into_tree() {
        let nodes = parse_html("<style>p { color: red }</style><p>x</p>").unwrap();
        let styled = build_styled_tree(&nodes, None, &Stylesheet::default());
        assert_eq!(styled.len(), 1);
    }

    #[test]
    fn color_parsing() {
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.r - 1.0).abs() < 0.01);
        assert!((c.g - 0.533).abs() < 0.01);
        assert_eq!(Color::parse("#ddd"), Some(Color::rgb8(0xdd, 0xdd, 0xdd)));
        assert_eq!(Color::parse("rgb(0, 182, 122)"), Some(Color::rgb8(0, 182, 122)));
        assert_eq!(Color::parse("grey"), Some(Color::GRAY));
        assert_eq!(Color::parse("chartreuse-ish"), None);
    }

    #[test]
    fn font_family_mapping() {
        assert_eq!(FontFamily::from_css("Arial, sans-serif"), FontFamily::Helvetica);
        assert_eq!(FontFamily::from_css("'Times New Roman', serif"), FontFamily::Times);
        assert_eq!(FontFamily::from_css("monospace"), FontFamily::Courier);
        assert_eq!(FontFamily::from_css("Comic Sans"), FontFamily::Helvetica);
    }
}
