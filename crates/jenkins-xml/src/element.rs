//! Generic element capture and emission.
//!
//! Jenkins configuration documents are XStream dumps: most of their shape
//! is open-ended, so decoding works on [`RawElement`] captures and each
//! variant codec picks the children it understands.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};

use crate::error::{Result, XmlError};

/// An element captured verbatim: its name, attributes and inner XML.
///
/// Used as the opaque "raw" variant of every tagged union so that unknown
/// server-side types survive a decode/encode cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawElement {
    /// Element name exactly as it appeared on the wire.
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    /// Inner markup, still escaped.
    pub inner_xml: String,
}

impl RawElement {
    /// Create an element with no attributes.
    pub fn new(name: impl Into<String>, inner_xml: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            inner_xml: inner_xml.into(),
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Parse the root element of a document.
    pub fn parse(xml: &str) -> Result<Self> {
        parse_children(xml)?.into_iter().next().ok_or(XmlError::Empty)
    }

    /// Look up an attribute value.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `class` attribute, if present.
    pub fn class(&self) -> Option<&str> {
        self.attribute("class")
    }

    /// The element name with XStream mangling undone.
    pub fn canonical_name(&self) -> Cow<'_, str> {
        canonical_name(&self.name)
    }

    /// True when the element has no inner content.
    pub fn is_empty(&self) -> bool {
        self.inner_xml.trim().is_empty()
    }

    /// The unescaped text content of a leaf element.
    pub fn text(&self) -> Result<String> {
        let inner = self.inner_xml.trim();
        if let Some(cdata) = inner
            .strip_prefix("<![CDATA[")
            .and_then(|rest| rest.strip_suffix("]]>"))
        {
            return Ok(cdata.to_string());
        }
        Ok(unescape(&self.inner_xml)?.into_owned())
    }

    /// Parse the direct children of this element.
    pub fn children(&self) -> Result<Vec<RawElement>> {
        parse_children(&self.inner_xml)
    }

    /// Emit the element.
    pub fn write(&self, w: &mut XmlWriter) {
        let attrs: Vec<(&str, &str)> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if self.inner_xml.is_empty() {
            w.empty(&self.name, &attrs);
        } else {
            w.open(&self.name, &attrs);
            w.raw(&self.inner_xml);
            w.close(&self.name);
        }
    }

    /// Serialize to a standalone XML string.
    pub fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        self.write(&mut w);
        w.finish()
    }
}

/// Parse the top-level elements of an XML fragment.
///
/// Text, comments, processing instructions and the XML declaration between
/// elements are skipped.
pub fn parse_children(fragment: &str) -> Result<Vec<RawElement>> {
    let mut reader = Reader::from_str(fragment);
    let mut out = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let (name, attributes) = read_start(&start)?;
                let end = start.name().as_ref().to_vec();
                let span = reader.read_to_end(QName(&end))?;
                let inner = fragment
                    .get(span.start as usize..span.end as usize)
                    .ok_or_else(|| XmlError::malformed(format!("bad span for <{name}>")))?;
                out.push(RawElement {
                    name,
                    attributes,
                    inner_xml: inner.to_string(),
                });
            }
            Event::Empty(start) => {
                let (name, attributes) = read_start(&start)?;
                out.push(RawElement {
                    name,
                    attributes,
                    inner_xml: String::new(),
                });
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                return Err(XmlError::malformed(format!("unexpected </{name}>")));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

fn read_start(start: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>)> {
    let name = utf8(start.name().as_ref())?.to_string();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(XmlError::malformed)?;
        let key = utf8(attr.key.as_ref())?.to_string();
        let value = unescape(utf8(&attr.value)?)?.into_owned();
        attributes.push((key, value));
    }
    Ok((name, attributes))
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(XmlError::malformed)
}

/// Undo XStream name mangling: `__` becomes `_` and `_-` becomes `$`.
pub fn canonical_name(name: &str) -> Cow<'_, str> {
    if !name.contains('_') {
        return Cow::Borrowed(name);
    }
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '_' {
            match chars.peek() {
                Some('_') => {
                    chars.next();
                    out.push('_');
                }
                Some('-') => {
                    chars.next();
                    out.push('$');
                }
                _ => out.push('_'),
            }
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

// ─────────────────────────────────────────────────────────────────────────────
// Child field access
// ─────────────────────────────────────────────────────────────────────────────

/// The children of one element, looked up by name.
#[derive(Debug)]
pub(crate) struct Fields {
    children: Vec<RawElement>,
}

impl Fields {
    pub(crate) fn of(element: &RawElement) -> Result<Self> {
        Ok(Self {
            children: element.children()?,
        })
    }

    pub(crate) fn get(&self, name: &str) -> Option<&RawElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Text of a child, empty when the child is absent.
    pub(crate) fn text(&self, name: &str) -> Result<String> {
        Ok(self.opt_text(name)?.unwrap_or_default())
    }

    pub(crate) fn opt_text(&self, name: &str) -> Result<Option<String>> {
        self.get(name).map(RawElement::text).transpose()
    }

    /// Parse a child, falling back to `default` when absent or blank.
    pub(crate) fn parse<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        let Some(text) = self.opt_text(name)? else {
            return Ok(default);
        };
        let text = text.trim();
        if text.is_empty() {
            return Ok(default);
        }
        text.parse().map_err(|_| XmlError::InvalidValue {
            field: name.to_string(),
            value: text.to_string(),
        })
    }

    pub(crate) fn flag(&self, name: &str) -> Result<bool> {
        self.parse(name, false)
    }

    /// Children not named in `known`, in document order.
    pub(crate) fn rest(self, known: &[&str]) -> Vec<RawElement> {
        self.children
            .into_iter()
            .filter(|c| !known.contains(&c.name.as_str()))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Writer
// ─────────────────────────────────────────────────────────────────────────────

/// XML writer over [`quick_xml::Writer`]. Text and attribute values are
/// escaped; [`raw`](Self::raw) markup is written as is.
pub struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self {
            inner: Writer::new(Vec::new()),
        }
    }
}

impl fmt::Debug for XmlWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlWriter")
            .field("len", &self.inner.get_ref().len())
            .finish()
    }
}

impl XmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.emit(Event::Start(start_tag(name, attrs)));
    }

    pub fn close(&mut self, name: &str) {
        self.emit(Event::End(BytesEnd::new(name)));
    }

    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.emit(Event::Empty(start_tag(name, attrs)));
    }

    /// `<name>value</name>`, or `<name/>` when the value is empty.
    pub fn text_element(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            self.empty(name, &[]);
            return;
        }
        self.open(name, &[]);
        self.emit(Event::Text(BytesText::new(value)));
        self.close(name);
    }

    pub fn display_element(&mut self, name: &str, value: impl fmt::Display) {
        self.text_element(name, &value.to_string());
    }

    /// Append pre-escaped markup.
    pub fn raw(&mut self, xml: &str) {
        self.emit(Event::Text(BytesText::from_escaped(xml)));
    }

    pub fn finish(self) -> String {
        let bytes = self.inner.into_inner();
        String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
    }

    fn emit(&mut self, event: Event<'_>) {
        // Writing into a Vec<u8> cannot fail.
        let _ = self.inner.write_event(event);
    }
}

fn start_tag<'a>(name: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
    BytesStart::new(name).with_attributes(attrs.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_children_captures_inner_xml() {
        let children =
            parse_children(r#"<a x="1">hello <b/></a><c/><d>t &amp; u</d>"#).unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].name, "a");
        assert_eq!(children[0].attribute("x"), Some("1"));
        assert_eq!(children[0].inner_xml, "hello <b/>");
        assert!(children[1].is_empty());
        assert_eq!(children[2].text().unwrap(), "t & u");
    }

    #[test]
    fn test_parse_skips_declaration_and_comments() {
        let root =
            RawElement::parse("<?xml version='1.1' encoding='UTF-8'?>\n<!-- c --><slave><name>n</name></slave>")
                .unwrap();
        assert_eq!(root.name, "slave");
        assert_eq!(root.children().unwrap()[0].text().unwrap(), "n");
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(matches!(RawElement::parse("  "), Err(XmlError::Empty)));
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(RawElement::parse("<a><b></a>").is_err());
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(
            canonical_name("hudson.node__monitors.DiskSpaceMonitorNodeProperty"),
            "hudson.node_monitors.DiskSpaceMonitorNodeProperty"
        );
        assert_eq!(
            canonical_name("hudson.tools.ToolLocationNodeProperty_-ToolLocation"),
            "hudson.tools.ToolLocationNodeProperty$ToolLocation"
        );
        assert_eq!(canonical_name("plain.Name"), "plain.Name");
    }

    #[test]
    fn test_cdata_text() {
        let el = RawElement::new("script", "<![CDATA[a < b]]>");
        assert_eq!(el.text().unwrap(), "a < b");
    }

    #[test]
    fn test_writer_escapes() {
        let mut w = XmlWriter::new();
        w.open("root", &[("class", "a\"b")]);
        w.text_element("v", "x < y & z");
        w.text_element("e", "");
        w.close("root");
        assert_eq!(
            w.finish(),
            r#"<root class="a&quot;b"><v>x &lt; y &amp; z</v><e/></root>"#
        );
    }

    #[test]
    fn test_raw_element_write_round_trip() {
        let el = RawElement::new("thing", "<inner>1</inner>").with_attribute("plugin", "p@1.0");
        let parsed = RawElement::parse(&el.to_xml()).unwrap();
        assert_eq!(parsed, el);
    }
}
