//! In-memory XML element tree.
//!
//! Record elements are small (one logical record each), so they are read
//! into an owned tree with `quick-xml` and navigated without a DOM library.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use thiserror::Error;

/// Errors raised while reading XML into an element tree.
#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(#[from] quick_xml::Error),

    #[error("unexpected end of document inside <{element}>")]
    UnexpectedEof { element: String },

    #[error("document has no root element")]
    NoRootElement,

    #[error("unknown entity reference '&{name};'")]
    UnknownEntity { name: String },
}

/// A child node of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with its attributes and ordered children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder-style helper for attributes.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Builder-style helper for a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder-style helper for a text node.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Parses the root element of a complete document.
    pub fn parse_str(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_reader(xml.as_bytes());
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match next_step(&mut reader, &mut buf)? {
                Step::Open(mut root) => {
                    root.read_children(&mut reader, &mut buf)?;
                    return Ok(root);
                }
                Step::Leaf(root) => return Ok(root),
                Step::Eof => return Err(XmlError::NoRootElement),
                Step::Text(_) | Step::Close | Step::Skip => {}
            }
        }
    }

    /// Creates an element from a start tag, without children.
    pub fn from_start(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    /// Reads children until the element's end tag.
    ///
    /// The reader must be positioned just after this element's start tag.
    pub fn read_children<R: BufRead>(
        &mut self,
        reader: &mut Reader<R>,
        buf: &mut Vec<u8>,
    ) -> Result<(), XmlError> {
        loop {
            buf.clear();
            match next_step(reader, buf)? {
                Step::Open(mut child) => {
                    child.read_children(reader, buf)?;
                    self.children.push(XmlNode::Element(child));
                }
                Step::Leaf(child) => self.children.push(XmlNode::Element(child)),
                Step::Text(text) => self.push_text(&text),
                Step::Close => {
                    self.drop_formatting_whitespace();
                    return Ok(());
                }
                Step::Eof => {
                    return Err(XmlError::UnexpectedEof {
                        element: self.name.clone(),
                    });
                }
                Step::Skip => {}
            }
        }
    }

    // Indentation between child elements is not content.
    fn drop_formatting_whitespace(&mut self) {
        if self.has_element_children() {
            self.children
                .retain(|node| !matches!(node, XmlNode::Text(text) if text.trim().is_empty()));
        }
    }

    // Adjacent text (split by entity references) is merged into one node.
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn has_element_children(&self) -> bool {
        self.elements().next().is_some()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Concatenated text of this element and all descendants.
    pub fn inner_text(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }
}

/// One reader event, detached from the reader's buffer.
enum Step {
    Open(XmlElement),
    Leaf(XmlElement),
    Text(String),
    Close,
    Eof,
    Skip,
}

fn next_step<R: BufRead>(reader: &mut Reader<R>, buf: &mut Vec<u8>) -> Result<Step, XmlError> {
    let step = match reader.read_event_into(buf)? {
        Event::Start(start) => Step::Open(XmlElement::from_start(&start)?),
        Event::Empty(start) => Step::Leaf(XmlElement::from_start(&start)?),
        Event::Text(text) => Step::Text(
            text.decode()
                .map_err(quick_xml::Error::from)?
                .into_owned(),
        ),
        Event::CData(data) => Step::Text(
            data.decode()
                .map_err(quick_xml::Error::from)?
                .into_owned(),
        ),
        Event::GeneralRef(reference) => Step::Text(resolve_reference(&reference)?),
        Event::End(_) => Step::Close,
        Event::Eof => Step::Eof,
        _ => Step::Skip,
    };
    Ok(step)
}

fn resolve_reference(reference: &BytesRef<'_>) -> Result<String, XmlError> {
    if let Some(ch) = reference.resolve_char_ref()? {
        return Ok(ch.to_string());
    }
    let name = reference.decode().map_err(quick_xml::Error::from)?;
    resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| XmlError::UnknownEntity {
            name: name.into_owned(),
        })
}
