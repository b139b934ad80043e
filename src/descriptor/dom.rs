//! Owned XML tree for deployment descriptors
//!
//! Descriptors are small, so they are parsed eagerly into an owned tree that
//! can be searched and edited freely, then written back pretty-printed.
//! Entity references other than the five predefined ones are rejected; nothing
//! is ever fetched from outside the document.

use std::fmt;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

/// Position of an element: child indices from the root element down.
///
/// Indices count every child node (text and comments included), so a path
/// stays valid as long as no node is inserted before it. Appending never
/// invalidates existing paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ElementPath(Vec<usize>);

impl ElementPath {
    /// Path of the root element itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Whether this addresses the root element.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the child node at `index` below this element.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    Instruction(String),
}

/// Nodes outside the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Misc {
    Comment(String),
    Instruction(String),
    DocType(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Empty element without attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`set_text`](Self::set_text).
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Builder form of [`push_child`](Self::push_child).
    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    /// Tag name, prefix included.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unescaped value of attribute `key`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite attribute `key`, or add it after the existing ones.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// All child nodes in document order.
    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Concatenated text and CDATA directly inside this element.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(s) | Node::CData(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace the direct text content, keeping child elements and comments.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self
            .children
            .iter()
            .position(|n| matches!(n, Node::Text(_) | Node::CData(_)))
        {
            Some(first) => {
                self.children[first] = Node::Text(text);
                let mut index = 0;
                self.children.retain(|n| {
                    let keep = index <= first || !matches!(n, Node::Text(_) | Node::CData(_));
                    index += 1;
                    keep
                });
            },
            None => self.children.push(Node::Text(text)),
        }
    }

    /// Child elements with their node indices.
    pub fn elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children.iter().enumerate().filter_map(|(i, n)| match n {
            Node::Element(e) => Some((i, e)),
            _ => None,
        })
    }

    /// First child element named `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|(_, e)| e.name == name).map(|(_, e)| e)
    }

    /// First child element named `name`, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Append `child` and return its node index.
    ///
    /// Indentation left in a formerly empty element is dropped.
    pub fn push_child(&mut self, child: Element) -> usize {
        self.children.push(Node::Element(child));
        self.drop_indentation();
        self.children.len() - 1
    }

    /// Drop whitespace-only text between child elements. Text of leaf
    /// elements is kept exactly as read.
    fn drop_indentation(&mut self) {
        if self.children.iter().any(|n| matches!(n, Node::Element(_))) {
            self.children
                .retain(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()));
        }
    }

    fn element_at(&self, index: usize) -> Option<&Element> {
        match self.children.get(index)? {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    fn element_at_mut(&mut self, index: usize) -> Option<&mut Element> {
        match self.children.get_mut(index)? {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

/// A parsed descriptor, remembering the virtual path it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    path: String,
    prolog: Vec<Misc>,
    root: Element,
    epilog: Vec<Misc>,
}

impl Document {
    /// Parse descriptor `bytes` read from virtual path `path`.
    ///
    /// Indentation between elements is dropped; text inside leaf elements is
    /// kept byte for byte. Anything malformed is an [`Error::Xml`].
    pub fn parse(path: &str, bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);

        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| {
                    xml_error(path, format!("at byte {}: {e}", reader.buffer_position()))
                })?;

            match event {
                Event::Start(start) => stack.push(element_from(path, &start)?),
                Event::Empty(start) => {
                    let element = element_from(path, &start)?;
                    attach(path, &mut stack, &mut root, element)?;
                },
                Event::End(_) => {
                    let mut element = stack
                        .pop()
                        .ok_or_else(|| xml_error(path, "unexpected closing tag"))?;
                    element.drop_indentation();
                    attach(path, &mut stack, &mut root, element)?;
                },
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| xml_error(path, e))?;
                    match stack.last_mut() {
                        Some(_) if text.is_empty() => {},
                        Some(parent) => parent.children.push(Node::Text(text.into_owned())),
                        None if text.trim().is_empty() => {},
                        None => {
                            return Err(xml_error(
                                path,
                                format!("text outside the root element: {:?}", text.trim()),
                            ));
                        },
                    }
                },
                Event::CData(cdata) => {
                    let text = utf8(path, &cdata)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::CData(text));
                    }
                },
                Event::Comment(comment) => {
                    let text = utf8(path, &comment)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Comment(text)),
                        None if root.is_none() => prolog.push(Misc::Comment(text)),
                        None => epilog.push(Misc::Comment(text)),
                    }
                },
                Event::PI(pi) => {
                    let text = utf8(path, &pi)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Instruction(text)),
                        None if root.is_none() => prolog.push(Misc::Instruction(text)),
                        None => epilog.push(Misc::Instruction(text)),
                    }
                },
                Event::DocType(doctype) => prolog.push(Misc::DocType(utf8(path, &doctype)?)),
                Event::Decl(_) => {},
                Event::Eof => break,
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(xml_error(path, format!("unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| xml_error(path, "no root element"))?;

        Ok(Self {
            path: path.to_string(),
            prolog,
            root,
            epilog,
        })
    }

    /// Virtual path the document was read from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Element at `at`, if the path still resolves.
    pub fn element(&self, at: &ElementPath) -> Option<&Element> {
        at.0
            .iter()
            .try_fold(&self.root, |element, &index| element.element_at(index))
    }

    pub fn element_mut(&mut self, at: &ElementPath) -> Option<&mut Element> {
        at.0
            .iter()
            .try_fold(&mut self.root, |element, &index| element.element_at_mut(index))
    }

    /// Element names from the root down to `at`, both ends included.
    pub fn name_path(&self, at: &ElementPath) -> Option<Vec<&str>> {
        let mut names = vec![self.root.name.as_str()];
        let mut element = &self.root;
        for &index in &at.0 {
            element = element.element_at(index)?;
            names.push(element.name.as_str());
        }
        Some(names)
    }

    /// First element, in document order, named `name`.
    pub fn find_by_name(&self, name: &str) -> Result<ElementPath> {
        self.find(|e| e.name == name)
            .ok_or_else(|| not_found(format!("<{name}> in {}", self.path)))
    }

    /// First element, in document order, named `name` whose text equals `text`.
    pub fn find_by_text(&self, name: &str, text: &str) -> Result<ElementPath> {
        self.find(|e| e.name == name && e.text() == text)
            .ok_or_else(|| not_found(format!("<{name}>{text}</{name}> in {}", self.path)))
    }

    /// First element whose [`name_path`](Self::name_path) equals `names`.
    ///
    /// Paths taken from another copy of the same descriptor locate the
    /// corresponding element here even if sibling positions differ.
    pub fn find_by_name_path(&self, names: &[&str]) -> Result<ElementPath> {
        let criteria = || not_found(format!("{} in {}", names.join("/"), self.path));
        let (first, rest) = names.split_first().ok_or_else(criteria)?;
        if *first != self.root.name {
            return Err(criteria());
        }

        let mut found = ElementPath::root();
        let mut element = &self.root;
        for name in rest {
            let (index, child) = element
                .elements()
                .find(|(_, e)| e.name == *name)
                .ok_or_else(criteria)?;
            found = found.child(index);
            element = child;
        }
        Ok(found)
    }

    /// Every element named `name` strictly below `under`, in document order.
    pub fn descendants_named(&self, under: &ElementPath, name: &str) -> Vec<ElementPath> {
        let mut found = Vec::new();
        if let Some(start) = self.element(under) {
            collect(start, under, &|e: &Element| e.name == name, &mut found, false);
        }
        found
    }

    fn find(&self, predicate: impl Fn(&Element) -> bool) -> Option<ElementPath> {
        let mut found = Vec::new();
        collect(&self.root, &ElementPath::root(), &predicate, &mut found, true);
        found.into_iter().next()
    }

    /// Serialize with two-space indentation and a UTF-8 declaration.
    pub fn to_pretty_bytes(&self) -> Result<Vec<u8>> {
        let path = self.path.as_str();
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        emit(&mut writer, path, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        for misc in &self.prolog {
            emit(&mut writer, path, misc.event())?;
        }
        write_element(&mut writer, path, &self.root)?;
        for misc in &self.epilog {
            emit(&mut writer, path, misc.event())?;
        }

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

impl Misc {
    fn event(&self) -> Event<'_> {
        match self {
            Misc::Comment(text) => Event::Comment(BytesText::from_escaped(text.as_str())),
            Misc::Instruction(text) => Event::PI(BytesPI::new(text.as_str())),
            Misc::DocType(text) => Event::DocType(BytesText::from_escaped(text.as_str())),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_pretty_bytes().map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&bytes))
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, path: &str, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return emit(writer, path, Event::Empty(start));
    }

    emit(writer, path, Event::Start(start))?;
    for node in &element.children {
        let event = match node {
            Node::Element(child) => {
                write_element(writer, path, child)?;
                continue;
            },
            Node::Text(text) => Event::Text(BytesText::new(text)),
            Node::CData(text) => Event::CData(BytesCData::new(text.as_str())),
            Node::Comment(text) => Event::Comment(BytesText::from_escaped(text.as_str())),
            Node::Instruction(text) => Event::PI(BytesPI::new(text.as_str())),
        };
        emit(writer, path, event)?;
    }
    emit(writer, path, Event::End(BytesEnd::new(element.name.as_str())))
}

fn emit(writer: &mut Writer<Vec<u8>>, path: &str, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(|e| xml_error(path, e))
}

fn collect(
    element: &Element,
    at: &ElementPath,
    predicate: &dyn Fn(&Element) -> bool,
    found: &mut Vec<ElementPath>,
    include_self: bool,
) {
    if include_self && predicate(element) {
        found.push(at.clone());
    }
    for (index, child) in element.elements() {
        collect(child, &at.child(index), predicate, found, true);
    }
}

fn attach(
    path: &str,
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(xml_error(path, format!("second root element <{}>", element.name))),
    }
    Ok(())
}

fn element_from(path: &str, start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(utf8(path, start.name().as_ref())?);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| xml_error(path, e))?;
        let key = utf8(path, attribute.key.as_ref())?;
        let value = attribute.unescape_value().map_err(|e| xml_error(path, e))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn utf8(path: &str, bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| xml_error(path, e))
}

fn xml_error(path: &str, message: impl fmt::Display) -> Error {
    Error::Xml {
        path: path.to_string(),
        message: message.to_string(),
    }
}

fn not_found(criteria: String) -> Error {
    Error::ElementNotFound { criteria }
}
