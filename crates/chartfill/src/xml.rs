//! Owned, mutable XML tree used to edit chart parts in place.
//!
//! Element and attribute names are kept exactly as written (including their namespace
//! prefixes) so a rewritten part keeps the producer's prefix choices and namespace
//! declarations. Lookups match on the *local* name, which is how DrawingML consumers treat
//! `c:`-prefixed and default-namespace chart parts alike.

use std::borrow::Cow;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::ChartFillError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Qualified name as written in the source (`c:ser`, `ser`, ...).
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for XmlDeclaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some("yes".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub declaration: Option<XmlDeclaration>,
    pub root: XmlElement,
}

/// Local part of a possibly prefixed name (`c:ser` -> `ser`).
pub fn local_name(name: &str) -> &str {
    match name.rfind(':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.rfind(':').map(|idx| &self.name[..idx])
    }

    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    /// Name for a new element in the same namespace prefix as `self`.
    pub fn sibling_name(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute lookup by local name, ignoring the prefix (`r:id`, `rel:id`, ...).
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| !k.starts_with("xmlns") && local_name(k) == local)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((key, value)),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|el| el.is(local))
    }

    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.is(local))
    }

    pub fn has_child(&self, local: &str) -> bool {
        self.child(local).is_some()
    }

    /// Returns the child `local`, creating it (before any of `successors`) when absent.
    pub fn ensure_child(&mut self, local: &str, successors: &[&str]) -> &mut XmlElement {
        let idx = match self.child_position(local) {
            Some(idx) => idx,
            None => {
                let name = self.sibling_name(local);
                self.insert_before(XmlElement::new(name), successors)
            }
        };
        match &mut self.children[idx] {
            XmlNode::Element(el) => el,
            _ => unreachable!("child_position/insert_before always point at an element"),
        }
    }

    /// Index into `children` of the first element named `local`.
    pub fn child_position(&self, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(el) if el.is(local)))
    }

    /// Inserts `child` before the first existing element whose local name is in `successors`
    /// (schema order), or appends it. Returns the index of the inserted node.
    pub fn insert_before(&mut self, child: XmlElement, successors: &[&str]) -> usize {
        let idx = self
            .children
            .iter()
            .position(|node| {
                matches!(node, XmlNode::Element(el) if successors.contains(&el.local_name()))
            })
            .unwrap_or(self.children.len());
        self.children.insert(idx, XmlNode::Element(child));
        idx
    }

    pub fn remove_children_named(&mut self, local: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, XmlNode::Element(el) if el.is(local)));
        before - self.children.len()
    }

    /// Concatenated text content of direct text/CDATA children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(text) | XmlNode::CData(text) => out.push_str(text),
                _ => {}
            }
        }
        out
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children
            .retain(|node| !matches!(node, XmlNode::Text(_) | XmlNode::CData(_)));
        let text = text.into();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// First descendant (pre-order, excluding `self`) named `local`.
    pub fn find_descendant(&self, local: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.is(local) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(local) {
                return Some(found);
            }
        }
        None
    }

    /// Child-index paths (pre-order) of every descendant matching `pred`.
    ///
    /// Matching elements are not searched further, so nested matches are not reported.
    pub fn descendant_paths<F>(&self, pred: &F) -> Vec<Vec<usize>>
    where
        F: Fn(&XmlElement) -> bool,
    {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        collect_paths(self, pred, &mut prefix, &mut out);
        out
    }

    pub fn at_path(&self, path: &[usize]) -> Option<&XmlElement> {
        let mut current = self;
        for &idx in path {
            current = match current.children.get(idx)? {
                XmlNode::Element(el) => el,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let mut current = self;
        for &idx in path {
            current = match current.children.get_mut(idx)? {
                XmlNode::Element(el) => el,
                _ => return None,
            };
        }
        Some(current)
    }
}

fn collect_paths<F>(el: &XmlElement, pred: &F, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>)
where
    F: Fn(&XmlElement) -> bool,
{
    for (idx, node) in el.children.iter().enumerate() {
        let XmlNode::Element(child) = node else {
            continue;
        };
        prefix.push(idx);
        if pred(child) {
            out.push(prefix.clone());
        } else {
            collect_paths(child, pred, prefix, out);
        }
        prefix.pop();
    }
}

impl XmlDocument {
    pub fn parse(part_name: &str, bytes: &[u8]) -> Result<Self, ChartFillError> {
        let xml = std::str::from_utf8(bytes).map_err(|e| ChartFillError::XmlNonUtf8 {
            part_name: part_name.to_string(),
            source: e,
        })?;
        let parse_err = |source: quick_xml::Error| ChartFillError::XmlParse {
            part_name: part_name.to_string(),
            source,
        };

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut declaration = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event().map_err(parse_err)?;
            match event {
                Event::Decl(decl) => declaration = Some(read_declaration(&decl).map_err(parse_err)?),
                Event::Start(start) => stack.push(element_from_start(&start).map_err(parse_err)?),
                Event::Empty(start) => {
                    let el = element_from_start(&start).map_err(parse_err)?;
                    attach(&mut stack, &mut root, el);
                }
                Event::End(_) => {
                    let Some(el) = stack.pop() else {
                        return Err(ChartFillError::XmlStructure(format!(
                            "{part_name}: unbalanced end tag"
                        )));
                    };
                    attach(&mut stack, &mut root, el);
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = text.unescape().map_err(parse_err)?;
                        if !text.is_empty() {
                            parent.children.push(XmlNode::Text(text.into_owned()));
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Event::Comment(comment) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&comment).into_owned();
                        parent.children.push(XmlNode::Comment(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(ChartFillError::XmlStructure(format!(
                "{part_name}: unexpected end of document inside <{}>",
                stack.last().map(|el| el.name.as_str()).unwrap_or_default()
            )));
        }
        let root = root.ok_or_else(|| {
            ChartFillError::XmlStructure(format!("{part_name}: document has no root element"))
        })?;

        Ok(Self { declaration, root })
    }

    pub fn to_bytes(&self, part_name: &str) -> Result<Vec<u8>, ChartFillError> {
        let write_err = |e: std::io::Error| ChartFillError::XmlWrite {
            part_name: part_name.to_string(),
            message: e.to_string(),
        };

        let mut writer = Writer::new(Vec::new());
        if let Some(decl) = &self.declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new(
                    &decl.version,
                    decl.encoding.as_deref(),
                    decl.standalone.as_deref(),
                )))
                .map_err(write_err)?;
            writer
                .write_event(Event::Text(BytesText::from_escaped("\n")))
                .map_err(write_err)?;
        }
        write_element(&mut writer, &self.root).map_err(write_err)?;
        Ok(writer.into_inner())
    }
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, el: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(el)),
        None => {
            if root.is_none() {
                *root = Some(el);
            }
        }
    }
}

fn read_declaration(decl: &BytesDecl<'_>) -> Result<XmlDeclaration, quick_xml::Error> {
    let text = |raw: Cow<'_, [u8]>| String::from_utf8_lossy(&raw).into_owned();
    let version = text(decl.version()?);
    let encoding = decl.encoding().transpose()?.map(text);
    let standalone = decl.standalone().transpose()?.map(text);
    Ok(XmlDeclaration {
        version,
        encoding,
        standalone,
    })
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, quick_xml::Error> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(XmlElement {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    el: &XmlElement,
) -> std::io::Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if el.children.is_empty() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        match child {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            XmlNode::CData(text) => writer.write_event(Event::CData(BytesCData::new(text)))?,
            XmlNode::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_name_strips_prefix() {
        assert_eq!(local_name("c:ser"), "ser");
        assert_eq!(local_name("ser"), "ser");
    }

    #[test]
    fn parse_and_write_preserves_prefixes_and_escapes() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<c:chartSpace xmlns:c="http://schemas.openxmlformats.org/drawingml/2006/chart"><c:v>A &amp; B</c:v><c:ptCount val="2"/></c:chartSpace>"#;
        let doc = XmlDocument::parse("chart1.xml", xml).expect("parse");
        assert_eq!(doc.root.name, "c:chartSpace");
        assert_eq!(doc.root.child("v").map(XmlElement::text).as_deref(), Some("A & B"));
        assert_eq!(doc.root.child("ptCount").and_then(|el| el.attr("val")), Some("2"));

        let out = String::from_utf8(doc.to_bytes("chart1.xml").expect("write")).expect("utf-8");
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(out.contains("<c:v>A &amp; B</c:v>"));
        assert!(out.contains("<c:ptCount val=\"2\"/>"));
    }

    #[test]
    fn insert_before_respects_successors() {
        let mut el = XmlElement::new("c:ser")
            .with_child(XmlElement::new("c:idx"))
            .with_child(XmlElement::new("c:val"));
        el.insert_before(XmlElement::new("c:cat"), &["val"]);
        let names: Vec<&str> = el.elements().map(XmlElement::local_name).collect();
        assert_eq!(names, vec!["idx", "cat", "val"]);
    }

    #[test]
    fn rejects_non_utf8() {
        let err = XmlDocument::parse("chart1.xml", &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ChartFillError::XmlNonUtf8 { .. }));
    }
}
