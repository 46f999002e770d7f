//! Owned XML element tree used by the outline codecs.
//!
//! # Responsibility
//! - Parse a complete XML document into an owned element tree.
//! - Build element trees and serialize them back to XML text.
//!
//! # Invariants
//! - Attribute order is preserved on read and write.
//! - Whitespace-only text between child elements is dropped on read; text in
//!   leaf elements is kept byte-for-byte.
//! - Text marked as CDATA is written as CDATA unless it contains `]]>`.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::error::Error;
use std::fmt::{Display, Formatter};

const INDENT: &str = "  ";

pub type XmlResult<T> = Result<T, XmlError>;

/// Errors from XML tree parsing and writing.
#[derive(Debug)]
pub enum XmlError {
    /// Underlying reader/writer failure.
    Syntax(quick_xml::Error),
    /// Write target failure.
    Io(std::io::Error),
    /// Element name, attribute or text is not valid UTF-8.
    Utf8(String),
    /// Input does not contain a root element.
    MissingRoot,
    /// Closing tag without matching opening tag, or unclosed elements at EOF.
    Unbalanced(String),
    /// More than one child element exists where at most one is allowed.
    DuplicateChild { parent: String, child: String },
}

impl Display for XmlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(err) => write!(f, "xml syntax error: {err}"),
            Self::Io(err) => write!(f, "xml write failed: {err}"),
            Self::Utf8(context) => write!(f, "invalid utf-8 in xml {context}"),
            Self::MissingRoot => write!(f, "xml document has no root element"),
            Self::Unbalanced(name) => write!(f, "unbalanced xml element `{name}`"),
            Self::DuplicateChild { parent, child } => {
                write!(f, "element `{parent}` has more than one `{child}` child")
            }
        }
    }
}

impl Error for XmlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Syntax(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for XmlError {
    fn from(value: quick_xml::Error) -> Self {
        Self::Syntax(value)
    }
}

impl From<std::io::Error> for XmlError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// One child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
}

/// Element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`XmlElement::set_attribute`].
    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Builder form of [`XmlElement::push_child`].
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push_child(child);
        self
    }

    /// Builder form of [`XmlElement::push_text`].
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets or replaces one attribute, keeping its original position.
    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(name, _)| name == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    pub fn push_cdata(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::CData(text.into()));
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements in document order, ignoring text.
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Child elements with the given name, in document order.
    pub fn elements_named<'a, 'b>(
        &'a self,
        name: &'b str,
    ) -> impl Iterator<Item = &'a XmlElement> + use<'a, 'b> {
        self.child_elements()
            .filter(move |element| element.name == name)
    }

    /// Returns the single child element with `name`, if any.
    ///
    /// # Errors
    /// - Returns `DuplicateChild` when more than one such child exists.
    pub fn element_for_name(&self, name: &str) -> XmlResult<Option<&XmlElement>> {
        let mut matches = self.elements_named(name);
        let first = matches.next();
        if matches.next().is_some() {
            return Err(XmlError::DuplicateChild {
                parent: self.name.clone(),
                child: name.to_string(),
            });
        }
        Ok(first)
    }

    /// Concatenated text and CDATA content of direct children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(text) | XmlNode::CData(text) => out.push_str(text),
                XmlNode::Element(_) => {}
            }
        }
        out
    }

    pub fn has_element_children(&self) -> bool {
        self.children
            .iter()
            .any(|node| matches!(node, XmlNode::Element(_)))
    }

    /// Parses a complete document and returns its root element.
    pub fn parse(input: &str) -> XmlResult<XmlElement> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    stack.push(element_from_start(&e)?);
                }
                Event::Empty(e) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(e) => {
                    let qname = e.name();
                    let name = utf8(qname.as_ref(), "element name")?;
                    let Some(mut element) = stack.pop() else {
                        return Err(XmlError::Unbalanced(name.to_string()));
                    };
                    if element.name != name {
                        return Err(XmlError::Unbalanced(name.to_string()));
                    }
                    if element.has_element_children() {
                        element.children.retain(|node| match node {
                            XmlNode::Text(text) => !text.trim().is_empty(),
                            _ => true,
                        });
                    }
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e.unescape()?.into_owned();
                        parent.children.push(XmlNode::Text(text));
                    }
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = utf8(e.as_ref(), "cdata")?.to_string();
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unbalanced(open.name));
        }
        root.ok_or(XmlError::MissingRoot)
    }

    /// Serializes this element as a complete document with an XML declaration.
    pub fn to_document_string(&self, pretty: bool) -> XmlResult<String> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
        write_element(&mut writer, self, pretty, 0)?;
        if pretty {
            writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
        }
        String::from_utf8(writer.into_inner()).map_err(|_| XmlError::Utf8("output".to_string()))
    }

    /// Serializes this element alone, without a declaration.
    pub fn to_fragment_string(&self) -> XmlResult<String> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self, false, 0)?;
        String::from_utf8(writer.into_inner()).map_err(|_| XmlError::Utf8("output".to_string()))
    }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        // Only the first top-level element is the document root.
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn element_from_start(start: &BytesStart<'_>) -> XmlResult<XmlElement> {
    let mut element = XmlElement::new(utf8(start.name().as_ref(), "element name")?);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = utf8(attribute.key.as_ref(), "attribute name")?.to_string();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn utf8<'a>(bytes: &'a [u8], context: &str) -> XmlResult<&'a str> {
    std::str::from_utf8(bytes).map_err(|_| XmlError::Utf8(context.to_string()))
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &XmlElement,
    pretty: bool,
    depth: usize,
) -> XmlResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    // Indentation is only safe where every child is an element.
    let indent_children = pretty
        && element
            .children
            .iter()
            .all(|node| matches!(node, XmlNode::Element(_)));

    for node in &element.children {
        match node {
            XmlNode::Element(child) => {
                if indent_children {
                    write_indent(writer, depth + 1)?;
                }
                write_element(writer, child, pretty, depth + 1)?;
            }
            XmlNode::Text(text) => {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            XmlNode::CData(text) if text.contains("]]>") => {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            XmlNode::CData(text) => {
                writer.write_event(Event::CData(BytesCData::new(text.as_str())))?;
            }
        }
    }

    if indent_children {
        write_indent(writer, depth)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

fn write_indent<W: std::io::Write>(writer: &mut Writer<W>, depth: usize) -> XmlResult<()> {
    let whitespace = format!("\n{}", INDENT.repeat(depth));
    writer.write_event(Event::Text(BytesText::from_escaped(whitespace)))?;
    Ok(())
}

/// Parses the boolean vocabulary used by outline attributes.
pub fn parse_yes_no(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_yes_no, XmlElement, XmlError, XmlNode};

    #[test]
    fn parse_keeps_attribute_order_and_leaf_text() {
        let root = XmlElement::parse(
            r#"<?xml version="1.0"?>
<outline b="2" a="1">
  <lit>  padded  </lit>
  <lit><![CDATA[a < b]]></lit>
</outline>"#,
        )
        .expect("document should parse");

        let attributes: Vec<_> = root.attributes().collect();
        assert_eq!(attributes, vec![("b", "2"), ("a", "1")]);
        assert_eq!(root.children().len(), 2);
        let lits: Vec<_> = root.elements_named("lit").map(XmlElement::text).collect();
        assert_eq!(lits, vec!["  padded  ".to_string(), "a < b".to_string()]);
    }

    #[test]
    fn element_for_name_rejects_duplicates() {
        let root = XmlElement::parse("<a><b/><b/></a>").unwrap();
        let err = root.element_for_name("b").unwrap_err();
        assert!(matches!(err, XmlError::DuplicateChild { .. }));
        assert!(root.element_for_name("c").unwrap().is_none());
    }

    #[test]
    fn pretty_output_does_not_touch_text_content() {
        let mut lit = XmlElement::new("lit");
        lit.push_cdata(" x ");
        let root = XmlElement::new("p").with_child(XmlElement::new("run").with_child(lit));

        let text = root.to_document_string(true).unwrap();
        assert!(text.contains("<lit><![CDATA[ x ]]></lit>"));

        let reparsed = XmlElement::parse(&text).unwrap();
        let lit = reparsed
            .element_for_name("run")
            .unwrap()
            .unwrap()
            .element_for_name("lit")
            .unwrap()
            .unwrap();
        assert_eq!(lit.children(), &[XmlNode::CData(" x ".to_string())]);
    }

    #[test]
    fn cdata_terminator_falls_back_to_escaped_text() {
        let mut lit = XmlElement::new("lit");
        lit.push_cdata("a]]>b");
        let text = lit.to_fragment_string().unwrap();
        let reparsed = XmlElement::parse(&text).unwrap();
        assert_eq!(reparsed.text(), "a]]>b");
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(matches!(
            XmlElement::parse("   ").unwrap_err(),
            XmlError::MissingRoot
        ));
    }

    #[test]
    fn yes_no_vocabulary() {
        assert_eq!(parse_yes_no(" YES "), Some(true));
        assert_eq!(parse_yes_no("0"), Some(false));
        assert_eq!(parse_yes_no("maybe"), None);
    }
}
