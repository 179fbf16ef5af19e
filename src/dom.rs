//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! The parser targets well-formed documents such as the rendered invoice:
//! - Void elements (`br`, `hr`, `img`, `meta`, `link`, `input`) never take
//!   children; `<x/>` is accepted for any element.
//! - `style`, `script` and `title` hold raw text.
//! - Comments, doctype and processing instructions are skipped.
//! - A closing tag that does not match the open element, or an element left
//!   open at the end of input, is a [`RenderError::MalformedHtml`].

use std::collections::HashMap;

use crate::error::RenderError;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of a supported element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Title,
    Meta,
    Link,
    Style,
    Script,
    Div,
    P,
    H1,
    H2,
    H3,
    Ul,
    Ol,
    Li,
    Hr,
    Br,
    Span,
    Strong,
    B,
    Em,
    I,
    A,
    Img,
    Table,
    Thead,
    Tbody,
    Tfoot,
    Tr,
    Th,
    Td,
    Input,
    /// Unknown tags are kept and laid out like a `div`.
    Unknown(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "title" => Tag::Title,
            "meta" => Tag::Meta,
            "link" => Tag::Link,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "hr" => Tag::Hr,
            "br" => Tag::Br,
            "span" => Tag::Span,
            "strong" => Tag::Strong,
            "b" => Tag::B,
            "em" => Tag::Em,
            "i" => Tag::I,
            "a" => Tag::A,
            "img" => Tag::Img,
            "table" => Tag::Table,
            "thead" => Tag::Thead,
            "tbody" => Tag::Tbody,
            "tfoot" => Tag::Tfoot,
            "tr" => Tag::Tr,
            "th" => Tag::Th,
            "td" => Tag::Td,
            "input" => Tag::Input,
            other => Tag::Unknown(other.to_string()),
        }
    }

    /// Lower-case tag name as written in HTML.
    pub fn name(&self) -> &str {
        match self {
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Body => "body",
            Tag::Title => "title",
            Tag::Meta => "meta",
            Tag::Link => "link",
            Tag::Style => "style",
            Tag::Script => "script",
            Tag::Div => "div",
            Tag::P => "p",
            Tag::H1 => "h1",
            Tag::H2 => "h2",
            Tag::H3 => "h3",
            Tag::Ul => "ul",
            Tag::Ol => "ol",
            Tag::Li => "li",
            Tag::Hr => "hr",
            Tag::Br => "br",
            Tag::Span => "span",
            Tag::Strong => "strong",
            Tag::B => "b",
            Tag::Em => "em",
            Tag::I => "i",
            Tag::A => "a",
            Tag::Img => "img",
            Tag::Table => "table",
            Tag::Thead => "thead",
            Tag::Tbody => "tbody",
            Tag::Tfoot => "tfoot",
            Tag::Tr => "tr",
            Tag::Th => "th",
            Tag::Td => "td",
            Tag::Input => "input",
            Tag::Unknown(name) => name,
        }
    }

    /// Elements that never have content or a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(
            self,
            Tag::Br | Tag::Hr | Tag::Img | Tag::Meta | Tag::Link | Tag::Input
        )
    }

    /// Elements whose content is raw text up to the matching closing tag.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script | Tag::Title)
    }

    /// Phrasing elements that flow inside a line.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Span | Tag::Strong | Tag::B | Tag::Em | Tag::I | Tag::A | Tag::Br
        )
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attr("style")
    }

    pub fn src(&self) -> Option<&str> {
        self.attr("src")
    }

    /// `colspan` attribute, clamped to at least 1.
    pub fn colspan(&self) -> usize {
        self.attr("colspan")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .max(1)
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                DomNode::Text(t) => out.push_str(t),
                DomNode::Element(e) => out.push_str(&e.text_content()),
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of top-level DOM nodes.
pub fn parse_html(html: &str) -> Result<Vec<DomNode>, RenderError> {
    let mut parser = Parser::new(html);
    let nodes = parser.parse_nodes(None)?;
    if !parser.eof() {
        // A stray closing tag with nothing open.
        return Err(parser.error("closing tag without a matching open element"));
    }
    Ok(nodes)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> RenderError {
        RenderError::MalformedHtml {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    /// Parse siblings until the closing tag of `parent` (left unconsumed) or
    /// end of input.
    fn parse_nodes(&mut self, parent: Option<&Tag>) -> Result<Vec<DomNode>, RenderError> {
        let mut nodes = Vec::new();
        loop {
            if self.eof() {
                if let Some(tag) = parent {
                    return Err(self.error(format!("<{}> is never closed", tag.name())));
                }
                break;
            }
            if self.starts_with("</") {
                break;
            }
            if let Some(node) = self.parse_node()? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn parse_node(&mut self) -> Result<Option<DomNode>, RenderError> {
        if self.starts_with("<!--") {
            self.skip_past("-->", "unterminated comment")?;
            return Ok(None);
        }
        if self.starts_with("<!") || self.starts_with("<?") {
            self.skip_past(">", "unterminated declaration")?;
            return Ok(None);
        }
        if self.starts_with("<") && self.peek_tag_start() {
            return self.parse_element().map(Some);
        }
        Ok(Some(self.parse_text()))
    }

    /// `<` followed by a letter opens a tag; anything else is literal text.
    fn peek_tag_start(&self) -> bool {
        self.input[self.pos + 1..]
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // Always consume at least one char so a lone '<' makes progress.
        self.advance_char();
        while !self.eof() && !self.starts_with("<") {
            self.advance_char();
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self) -> Result<DomNode, RenderError> {
        let open_at = self.pos;
        self.pos += 1; // '<'
        let tag = Tag::from_name(&self.parse_name());
        let mut elem = ElementNode::new(tag);

        loop {
            self.skip_whitespace();
            if self.eof() {
                self.pos = open_at;
                return Err(self.error(format!("unterminated <{}> tag", elem.tag.name())));
            }
            if self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let (key, value) = self.parse_attribute()?;
            elem.attributes.entry(key).or_insert(value);
        }

        if self.starts_with("/>") {
            self.pos += 2;
            return Ok(DomNode::Element(elem));
        }
        self.pos += 1; // '>'

        if elem.tag.is_void() {
            return Ok(DomNode::Element(elem));
        }

        if elem.tag.is_raw_text() {
            let close = format!("</{}", elem.tag.name());
            let rest = &self.input[self.pos..];
            let end = find_ascii_case_insensitive(rest, &close).ok_or_else(|| {
                self.error(format!("<{}> is never closed", elem.tag.name()))
            })?;
            let raw = &rest[..end];
            if !raw.is_empty() {
                let text = if elem.tag == Tag::Title {
                    decode_entities(raw)
                } else {
                    raw.to_string()
                };
                elem.children.push(DomNode::Text(text));
            }
            self.pos += end;
        } else {
            elem.children = self.parse_nodes(Some(&elem.tag))?;
        }

        self.expect_closing_tag(&elem.tag)?;
        Ok(DomNode::Element(elem))
    }

    fn expect_closing_tag(&mut self, tag: &Tag) -> Result<(), RenderError> {
        let at = self.pos;
        self.pos += 2; // "</"
        let name = self.parse_name();
        if !name.eq_ignore_ascii_case(tag.name()) {
            self.pos = at;
            return Err(self.error(format!(
                "expected </{}> but found </{}>",
                tag.name(),
                name
            )));
        }
        self.skip_whitespace();
        if !self.starts_with(">") {
            return Err(self.error(format!("unterminated </{}> tag", tag.name())));
        }
        self.pos += 1;
        Ok(())
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_ascii_lowercase()
    }

    fn parse_attribute(&mut self) -> Result<(String, String), RenderError> {
        let key = self.parse_name();
        if key.is_empty() {
            return Err(self.error("invalid attribute name"));
        }
        self.skip_whitespace();
        if !self.starts_with("=") {
            return Ok((key, String::new()));
        }
        self.pos += 1;
        self.skip_whitespace();
        let value = self.parse_attr_value()?;
        Ok((key, value))
    }

    fn parse_attr_value(&mut self) -> Result<String, RenderError> {
        match self.current_char() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let rest = &self.input[self.pos..];
                let end = rest
                    .find(quote)
                    .ok_or_else(|| self.error("unterminated attribute value"))?;
                let value = decode_entities(&rest[..end]);
                self.pos += end + 1;
                Ok(value)
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.current_char() {
                    if c.is_whitespace() || c == '>' || self.starts_with("/>") {
                        break;
                    }
                    self.pos += c.len_utf8();
                }
                Ok(decode_entities(&self.input[start..self.pos]))
            }
        }
    }

    fn skip_past(&mut self, terminator: &str, reason: &str) -> Result<(), RenderError> {
        match self.input[self.pos..].find(terminator) {
            Some(i) => {
                self.pos += i + terminator.len();
                Ok(())
            }
            None => Err(self.error(reason)),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.current_char() {
            self.pos += c.len_utf8();
        }
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Decode named and numeric character references. Unknown references are
/// kept verbatim.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "euro" => '\u{20AC}',
        "pound" => '\u{00A3}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "bull" => '\u{2022}',
        _ => return None,
    };
    Some(c)
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    find_element(nodes, &Tag::Body)
        .map(|body| body.children.clone())
        .unwrap_or_else(|| {
            nodes
                .iter()
                .filter(|n| !matches!(n, DomNode::Element(e) if e.tag == Tag::Head))
                .cloned()
                .collect()
        })
}

/// The `<body>` element itself, if present.
pub fn body_element(nodes: &[DomNode]) -> Option<&ElementNode> {
    find_element(nodes, &Tag::Body)
}

/// Depth-first search for the first element with `tag`.
pub fn find_element<'a>(nodes: &'a [DomNode], tag: &Tag) -> Option<&'a ElementNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if &e.tag == tag {
                return Some(e);
            }
            if let Some(found) = find_element(&e.children, tag) {
                return Some(found);
            }
        }
    }
    None
}

/// Concatenated contents of every `<style>` element, in document order.
pub fn collect_stylesheets(nodes: &[DomNode]) -> String {
    let mut css = String::new();
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Style {
                css.push_str(&e.text_content());
                css.push('\n');
            } else {
                css.push_str(&collect_stylesheets(&e.children));
            }
        }
    }
    css
}

/// Text of the `<title>` element, trimmed.
pub fn document_title(nodes: &[DomNode]) -> Option<String> {
    find_element(nodes, &Tag::Title)
        .map(|t| t.text_content().trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(nodes: &[DomNode]) -> &ElementNode {
        nodes
            .iter()
            .find_map(|n| match n {
                DomNode::Element(e) => Some(e),
                DomNode::Text(_) => None,
            })
            .expect("no element")
    }

    #[test]
    fn parse_simple_div() {
        let nodes = parse_html(r#"<div class="totals price"><p>Hello</p></div>"#).unwrap();
        assert_eq!(nodes.len(), 1);
        let e = first_element(&nodes);
        assert_eq!(e.tag, Tag::Div);
        assert_eq!(e.classes(), vec!["totals", "price"]);
        assert_eq!(e.children.len(), 1);
    }

    #[test]
    fn void_elements_take_no_children() {
        let nodes = parse_html(r#"<p>Line one<br>Line two<br />end</p><img src="logo.png">"#)
            .unwrap();
        assert_eq!(nodes.len(), 2);
        let p = first_element(&nodes);
        assert_eq!(p.children.len(), 5);
        if let DomNode::Element(img) = &nodes[1] {
            assert_eq!(img.tag, Tag::Img);
            assert_eq!(img.src(), Some("logo.png"));
        } else {
            panic!("Expected img element");
        }
    }

    #[test]
    fn style_contents_are_raw_text() {
        let html = "<html><head><title>Invoice</title><style>td > a { x: 1 }</style></head><body><p>x</p></body></html>";
        let nodes = parse_html(html).unwrap();
        assert_eq!(collect_stylesheets(&nodes).trim(), "td > a { x: 1 }");
        assert_eq!(document_title(&nodes).as_deref(), Some("Invoice"));
        assert_eq!(body_children(&nodes).len(), 1);
    }

    #[test]
    fn doctype_and_comments_are_skipped() {
        let nodes = parse_html("<!DOCTYPE html><!-- header --><div>a</div>").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("file:&#x2F;&#x2F;x"), "file://x");
        assert_eq!(decode_entities("&#39;q&#39;"), "'q'");
        assert_eq!(decode_entities("AT&T & co"), "AT&T & co");
        let nodes = parse_html(r#"<a href="/?a=1&amp;b=2">x</a>"#).unwrap();
        assert_eq!(first_element(&nodes).attr("href"), Some("/?a=1&b=2"));
    }

    #[test]
    fn colspan_attribute() {
        let nodes = parse_html(r#"<td colspan="2">Subtotal</td>"#).unwrap();
        assert_eq!(first_element(&nodes).colspan(), 2);
        let nodes = parse_html(r#"<td colspan="zero">x</td>"#).unwrap();
        assert_eq!(first_element(&nodes).colspan(), 1);
    }

    #[test]
    fn mismatched_closing_tag_is_an_error() {
        let err = parse_html("<div><span>x</div></span>").unwrap_err();
        assert!(matches!(err, RenderError::MalformedHtml { .. }), "{err}");
    }

    #[test]
    fn unclosed_element_is_an_error() {
        assert!(parse_html("<div><p>never closed").is_err());
        assert!(parse_html("<div class=\"x").is_err());
        assert!(parse_html("<!-- open comment").is_err());
        assert!(parse_html("</div>").is_err());
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let nodes = parse_html("<p>1 < 2</p>").unwrap();
        assert_eq!(first_element(&nodes).text_content(), "1 < 2");
    }
}
