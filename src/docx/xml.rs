//! Owned XML element tree for package parts.
//!
//! Parts are small enough to hold in memory, and every edit the builder makes
//! (token replacement, picture insertion, relationship remapping) is easier on
//! a tree than on an event stream. Everything that is read is written back:
//! element order, attributes, text, CDATA, comments and processing
//! instructions.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::DocxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    /// Stored as written (escaped).
    Comment(String),
    /// Stored as written (escaped).
    ProcessingInstruction(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn find_child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.is(name))
    }

    pub fn find_child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|e| e.is(name))
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Visit this element and every descendant element, depth first.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Element)) {
        f(self);
        for child in self.child_elements() {
            child.walk(f);
        }
    }

    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for child in self.child_elements_mut() {
            child.walk_mut(f);
        }
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(t) | Node::CData(t) => out.push_str(t),
            Node::Element(e) => collect_text(e, out),
            _ => {}
        }
    }
}

/// A parsed part: the root element plus whether it carried an XML declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlPart {
    pub declaration: bool,
    pub root: Element,
}

impl XmlPart {
    pub fn new(root: Element) -> Self {
        XmlPart {
            declaration: true,
            root,
        }
    }

    pub fn parse(xml: &str) -> Result<Self, DocxError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut declaration = false;
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Decl(_) => declaration = true,
                Event::Start(e) => stack.push(start_element(&e)?),
                Event::Empty(e) => {
                    let element = start_element(&e)?;
                    attach(&mut stack, &mut root, Node::Element(element))?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DocxError::Malformed("unbalanced end tag".into()))?;
                    attach(&mut stack, &mut root, Node::Element(element))?;
                }
                Event::Text(e) => {
                    if !stack.is_empty() {
                        let text = e.unescape()?.into_owned();
                        push_child(&mut stack, Node::Text(text));
                    }
                }
                Event::CData(e) => {
                    if !stack.is_empty() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        push_child(&mut stack, Node::CData(text));
                    }
                }
                Event::Comment(e) => {
                    if !stack.is_empty() {
                        push_child(&mut stack, Node::Comment(String::from_utf8_lossy(&e).into_owned()));
                    }
                }
                Event::PI(e) => {
                    if !stack.is_empty() {
                        push_child(
                            &mut stack,
                            Node::ProcessingInstruction(String::from_utf8_lossy(&e).into_owned()),
                        );
                    }
                }
                Event::DocType(_) => {}
                Event::Eof => break,
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DocxError::Malformed(format!(
                "unclosed element <{}>",
                stack[stack.len() - 1].name
            )));
        }
        let root = root.ok_or_else(|| DocxError::Malformed("no root element".into()))?;
        Ok(XmlPart { declaration, root })
    }

    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| DocxError::Malformed(format!("part is not UTF-8: {e}")))?;
        // Strip a UTF-8 byte order mark if the producer wrote one.
        Self::parse(text.trim_start_matches('\u{feff}'))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut writer = Writer::new(Vec::new());
        if self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        }
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }
}

/// Parse a standalone XML snippet into an element.
pub fn parse_element(xml: &str) -> Result<Element, DocxError> {
    XmlPart::parse(xml).map(|part| part.root)
}

fn start_element(e: &BytesStart) -> Result<Element, DocxError> {
    let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, node: Node) -> Result<(), DocxError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    match node {
        Node::Element(element) if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        _ => Err(DocxError::Malformed("more than one root element".into())),
    }
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &Element) -> Result<(), DocxError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
            Node::CData(t) => writer.write_event(Event::CData(BytesCData::new(t.as_str())))?,
            Node::Comment(t) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(t.as_str())))?
            }
            Node::ProcessingInstruction(t) => {
                writer.write_event(Event::PI(BytesText::from_escaped(t.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}
