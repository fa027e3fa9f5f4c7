//! Lenient reader and writer for stored table HTML.
//!
//! A fragment is kept as a flat list of segments: markup outside cells is
//! carried through as text, and every `td`/`th` becomes a [`Cell`] whose
//! attributes and content can be changed. Writing the fragment back only
//! regenerates the cells; everything else is emitted as read.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{escape, unescape_with};
use quick_xml::events::{BytesStart, Event};

use crate::error::{EngineError, EngineResult};

/// Attribute naming the variable a cell is bound to.
pub const BINDING_ATTR: &str = "data-variable";

fn resolve_entity(entity: &str) -> Option<&'static str> {
    match entity {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        "nbsp" => Some("\u{a0}"),
        _ => None,
    }
}

/// Decodes character references; text with an unknown entity is kept raw.
fn decode(raw: &str) -> Cow<'_, str> {
    unescape_with(raw, resolve_entity).unwrap_or(Cow::Borrowed(raw))
}

fn utf8(bytes: &[u8]) -> EngineResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| EngineError::Fragment(e.to_string()))
}

fn is_cell_tag(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(b"td") || name.eq_ignore_ascii_case(b"th")
}

/// One table cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    tag: String,
    attrs: Vec<(String, String)>,
    inner_html: String,
    text: String,
    has_image: bool,
}

impl Cell {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self
            .attrs
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// Name of the bound variable, if the cell is tagged.
    pub fn bound_variable(&self) -> Option<&str> {
        self.attr(BINDING_ATTR).filter(|name| !name.is_empty())
    }

    pub fn bind(&mut self, name: &str) {
        self.set_attr(BINDING_ATTR, name);
    }

    /// Decoded text content, as a browser's `textContent` would give it.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn inner_html(&self) -> &str {
        &self.inner_html
    }

    pub fn has_image(&self) -> bool {
        self.has_image
    }

    /// Replaces the whole content with `text`.
    pub fn set_text(&mut self, text: &str) {
        self.inner_html = escape(text).into_owned();
        self.text = text.to_string();
        self.has_image = false;
    }

    pub fn to_html(&self) -> String {
        let mut out = String::with_capacity(self.inner_html.len() + 32);
        out.push('<');
        out.push_str(&self.tag);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        out.push('>');
        out.push_str(&self.inner_html);
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Raw(String),
    Cell(Cell),
}

/// A parsed table fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableFragment {
    segments: Vec<Segment>,
}

/// A cell being read: its start tag is known, its content is accumulating.
struct OpenCell {
    cell: Cell,
    nested_tables: usize,
}

impl TableFragment {
    /// Reads `html`. Unclosed or mismatched tags are tolerated: a cell left
    /// open ends at the next cell, row or the end of its table, and a `<` that
    /// does not open markup is read as text.
    pub fn parse(html: &str) -> EngineResult<Self> {
        let html = escape_stray_lt(html);
        let mut reader = Reader::from_str(&html);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut segments = Vec::new();
        let mut raw = String::new();
        let mut open: Option<OpenCell> = None;

        loop {
            let event = reader.read_event()?;
            if let Event::Eof = event {
                break;
            }

            if open.as_ref().is_some_and(|c| c.nested_tables == 0) {
                let boundary = cell_boundary(&event);
                if boundary != Boundary::None {
                    if let Some(done) = open.take() {
                        segments.push(Segment::Cell(done.cell));
                    }
                }
                if boundary == Boundary::Consume {
                    continue;
                }
            }

            let Some(current) = open.as_mut() else {
                match &event {
                    Event::Start(e) if is_cell_tag(e.local_name().as_ref()) => {
                        if !raw.is_empty() {
                            segments.push(Segment::Raw(std::mem::take(&mut raw)));
                        }
                        open = Some(OpenCell {
                            cell: start_cell(e)?,
                            nested_tables: 0,
                        });
                    }
                    Event::Empty(e) if is_cell_tag(e.local_name().as_ref()) => {
                        if !raw.is_empty() {
                            segments.push(Segment::Raw(std::mem::take(&mut raw)));
                        }
                        segments.push(Segment::Cell(start_cell(e)?));
                    }
                    other => write_event(&mut raw, other)?,
                }
                continue;
            };

            match &event {
                Event::Start(e) | Event::Empty(e) => {
                    let name = e.local_name();
                    if name.as_ref().eq_ignore_ascii_case(b"img") {
                        current.cell.has_image = true;
                    }
                    if matches!(event, Event::Start(_)) && name.as_ref().eq_ignore_ascii_case(b"table") {
                        current.nested_tables += 1;
                    }
                }
                Event::End(e) if e.local_name().as_ref().eq_ignore_ascii_case(b"table") => {
                    current.nested_tables = current.nested_tables.saturating_sub(1);
                }
                Event::Text(t) => current.cell.text.push_str(&decode(utf8(t)?)),
                Event::CData(t) => current.cell.text.push_str(utf8(t)?),
                _ => {}
            }
            write_event(&mut current.cell.inner_html, &event)?;
        }

        // A cell still open at the end of input is closed implicitly.
        if let Some(done) = open.take() {
            segments.push(Segment::Cell(done.cell));
        }
        if !raw.is_empty() {
            segments.push(Segment::Raw(raw));
        }
        Ok(Self { segments })
    }

    pub fn cell_count(&self) -> usize {
        self.cells().count()
    }

    /// Cells in document order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Cell(cell) => Some(cell),
            Segment::Raw(_) => None,
        })
    }

    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.segments.iter_mut().filter_map(|segment| match segment {
            Segment::Cell(cell) => Some(cell),
            Segment::Raw(_) => None,
        })
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells().nth(index)
    }

    pub fn cell_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.cells_mut().nth(index)
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Raw(raw) => out.push_str(raw),
                Segment::Cell(cell) => out.push_str(&cell.to_html()),
            }
        }
        out
    }
}

/// Effect of an event met directly inside an open cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    /// Part of the cell content.
    None,
    /// The cell's own end tag.
    Consume,
    /// Markup that ends the cell implicitly and is then read on its own.
    Close,
}

const ROW_TAGS: &[&[u8]] = &[b"tr", b"tbody", b"thead", b"tfoot"];

fn is_row_or_group(name: &[u8]) -> bool {
    ROW_TAGS.iter().any(|tag| name.eq_ignore_ascii_case(tag))
}

fn cell_boundary(event: &Event<'_>) -> Boundary {
    match event {
        Event::Start(e) | Event::Empty(e) => {
            let name = e.local_name();
            if is_cell_tag(name.as_ref()) || is_row_or_group(name.as_ref()) {
                Boundary::Close
            } else {
                Boundary::None
            }
        }
        Event::End(e) => {
            let name = e.local_name();
            if is_cell_tag(name.as_ref()) {
                Boundary::Consume
            } else if is_row_or_group(name.as_ref()) || name.as_ref().eq_ignore_ascii_case(b"table") {
                Boundary::Close
            } else {
                Boundary::None
            }
        }
        _ => Boundary::None,
    }
}

/// Escapes every `<` that cannot open markup (`1 < 2`), as an HTML
/// tokenizer reads it as text.
fn escape_stray_lt(html: &str) -> Cow<'_, str> {
    let bytes = html.as_bytes();
    let mut out = String::new();
    let mut copied = 0;
    for (i, _) in html.match_indices('<') {
        let opens_markup = bytes
            .get(i + 1)
            .copied()
            .is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'));
        if !opens_markup {
            out.push_str(&html[copied..i]);
            out.push_str("&lt;");
            copied = i + 1;
        }
    }
    if copied == 0 {
        return Cow::Borrowed(html);
    }
    out.push_str(&html[copied..]);
    Cow::Owned(out)
}

fn start_cell(e: &BytesStart<'_>) -> EngineResult<Cell> {
    let tag = utf8(e.name().as_ref())?.to_string();
    let mut attrs = Vec::new();
    for attr in e.html_attributes().flatten() {
        let key = utf8(attr.key.as_ref())?.to_string();
        let value = decode(utf8(&attr.value)?).into_owned();
        attrs.push((key, value));
    }
    Ok(Cell {
        tag,
        attrs,
        inner_html: String::new(),
        text: String::new(),
        has_image: false,
    })
}

/// Appends the markup of `event` as it appeared in the input.
fn write_event(out: &mut String, event: &Event<'_>) -> EngineResult<()> {
    match event {
        Event::Start(e) => {
            out.push('<');
            out.push_str(utf8(e)?);
            out.push('>');
        }
        Event::Empty(e) => {
            out.push('<');
            out.push_str(utf8(e)?);
            out.push_str("/>");
        }
        Event::End(e) => {
            out.push_str("</");
            out.push_str(utf8(e)?);
            out.push('>');
        }
        Event::Text(e) => out.push_str(utf8(e)?),
        Event::CData(e) => {
            out.push_str("<![CDATA[");
            out.push_str(utf8(e)?);
            out.push_str("]]>");
        }
        Event::Comment(e) => {
            out.push_str("<!--");
            out.push_str(utf8(e)?);
            out.push_str("-->");
        }
        Event::DocType(e) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(utf8(e)?);
            out.push('>');
        }
        // XML declarations and processing instructions have no place in a table
        Event::Decl(_) | Event::PI(_) | Event::Eof => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cells_in_document_order() {
        let html = r#"<table><tr><th>Length</th><td data-variable="L">200</td></tr><tr><td>a &amp; b</td><td><img src="x.png"/></td></tr></table>"#;
        let fragment = TableFragment::parse(html).unwrap();
        assert_eq!(fragment.cell_count(), 4);

        let texts: Vec<&str> = fragment.cells().map(Cell::text).collect();
        assert_eq!(texts, vec!["Length", "200", "a & b", ""]);
        assert_eq!(fragment.cell(1).unwrap().bound_variable(), Some("L"));
        assert_eq!(fragment.cell(0).unwrap().tag(), "th");
        assert!(fragment.cell(3).unwrap().has_image());
    }

    #[test]
    fn test_untouched_fragment_round_trips() {
        let html = r#"<table border="1"><tbody><tr><td data-variable="W">100</td><td>x&nbsp;y</td></tr></tbody></table>"#;
        let fragment = TableFragment::parse(html).unwrap();
        assert_eq!(fragment.to_html(), html);
        assert_eq!(fragment.cell(1).unwrap().text(), "x\u{a0}y");
    }

    #[test]
    fn test_lenient_html() {
        // unquoted attribute, void <br>, unclosed <p>
        let html = "<table><tr><td class=big>one<br>two</td><td><p>three</td></tr></table>";
        let fragment = TableFragment::parse(html).unwrap();
        assert_eq!(fragment.cell_count(), 2);
        assert_eq!(fragment.cell(0).unwrap().attr("class"), Some("big"));
        assert_eq!(fragment.cell(0).unwrap().text(), "onetwo");
        assert_eq!(fragment.cell(1).unwrap().text(), "three");
    }

    #[test]
    fn test_nested_table_stays_inside_cell() {
        let html = "<table><tr><td><table><tr><td>in</td></tr></table></td><td>out</td></tr></table>";
        let fragment = TableFragment::parse(html).unwrap();
        assert_eq!(fragment.cell_count(), 2);
        assert_eq!(fragment.cell(0).unwrap().text(), "in");
        assert_eq!(fragment.cell(1).unwrap().text(), "out");
    }

    #[test]
    fn test_set_text_and_bind() {
        let mut fragment = TableFragment::parse("<table><tr><td>old</td></tr></table>").unwrap();
        let cell = fragment.cell_mut(0).unwrap();
        cell.set_text("a < b");
        cell.bind("x");
        assert_eq!(
            fragment.to_html(),
            r#"<table><tr><td data-variable="x">a &lt; b</td></tr></table>"#
        );
    }

    #[test]
    fn test_implicitly_closed_cells() {
        let fragment = TableFragment::parse("<table><tr><td>a<td>b</tr><tr><th>c</table>").unwrap();
        let texts: Vec<&str> = fragment.cells().map(Cell::text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(
            fragment.to_html(),
            "<table><tr><td>a</td><td>b</td></tr><tr><th>c</th></table>"
        );
    }

    #[test]
    fn test_stray_less_than_is_text() {
        let fragment = TableFragment::parse("<table><tr><td>1 < 2</td><td>x</td></tr></table>").unwrap();
        assert_eq!(fragment.cell_count(), 2);
        assert_eq!(fragment.cell(0).unwrap().text(), "1 < 2");
        assert_eq!(
            fragment.to_html(),
            "<table><tr><td>1 &lt; 2</td><td>x</td></tr></table>"
        );
        assert_eq!(escape_stray_lt("<a>"), Cow::Borrowed("<a>"));
        assert_eq!(escape_stray_lt("<<b>x<"), "&lt;<b>x&lt;");
    }

    #[test]
    fn test_fragment_without_cells() {
        let fragment = TableFragment::parse("<p>no table</p>").unwrap();
        assert_eq!(fragment.cell_count(), 0);
        assert_eq!(fragment.to_html(), "<p>no table</p>");
        assert_eq!(TableFragment::parse("").unwrap().cell_count(), 0);
    }
}
