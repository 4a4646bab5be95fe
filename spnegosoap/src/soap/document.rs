//! Standalone XML documents

use xml::name::OwnedName;
use xml::reader::{EventReader, ParserConfig, XmlEvent};
use xmltree::{Element, EmitterConfig, ParseError, XMLNode};

/// A standalone XML document owning its root element
///
/// Produced by a fresh namespace-aware parse, so it never shares nodes with
/// the tree it was serialized from.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Parses `xml` as a namespace-aware document (see [`parse_element`])
    pub fn parse(xml: &[u8]) -> Result<Self, ParseError> {
        let root = parse_element(xml)?;
        Ok(Self { root })
    }

    pub fn from_element(root: Element) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }

    /// Serializes the document without XML declaration
    pub fn to_bytes(&self) -> Result<Vec<u8>, xmltree::Error> {
        serialize_element(&self.root)
    }
}

/// Parses `xml` into an element tree
///
/// Attributes are keyed by their qualified name as written (`xsi:type`,
/// `nil`), so prefixed attributes and attributes sharing a local name are
/// kept apart. Whitespace-only text is dropped, comments are kept.
pub fn parse_element(xml: &[u8]) -> Result<Element, ParseError> {
    let config = ParserConfig::new().ignore_comments(false);
    let mut reader = EventReader::new_with_config(xml, config);

    let mut open: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.next().map_err(ParseError::MalformedXml)? {
            XmlEvent::StartElement {
                name,
                attributes,
                namespace,
            } => {
                let mut element = Element::new(&name.local_name);
                element.prefix = name.prefix;
                element.namespace = name.namespace;
                if !namespace.is_essentially_empty() {
                    element.namespaces = Some(namespace);
                }
                for attribute in attributes {
                    element
                        .attributes
                        .insert(qualified_name(&attribute.name), attribute.value);
                }
                open.push(element);
            }
            XmlEvent::EndElement { .. } => {
                let element = open.pop().ok_or(ParseError::CannotParse)?;
                match open.last_mut() {
                    Some(parent) => parent.children.push(XMLNode::Element(element)),
                    None => root = Some(element),
                }
            }
            XmlEvent::Characters(text) => push_node(&mut open, XMLNode::Text(text)),
            XmlEvent::CData(text) => push_node(&mut open, XMLNode::CData(text)),
            XmlEvent::Comment(text) => push_node(&mut open, XMLNode::Comment(text)),
            XmlEvent::ProcessingInstruction { name, data } => {
                push_node(&mut open, XMLNode::ProcessingInstruction(name, data))
            }
            XmlEvent::StartDocument { .. } | XmlEvent::Whitespace(_) => {}
            XmlEvent::EndDocument => return root.ok_or(ParseError::CannotParse),
        }
    }
}

// Nodes outside the root element are discarded.
fn push_node(open: &mut [Element], node: XMLNode) {
    if let Some(parent) = open.last_mut() {
        parent.children.push(node);
    }
}

fn qualified_name(name: &OwnedName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local_name),
        None => name.local_name.clone(),
    }
}

/// Serializes one element subtree, siblings excluded
///
/// In-scope namespace declarations are carried by the element itself, so the
/// output parses on its own. Attribute keys are written verbatim.
pub fn serialize_element(element: &Element) -> Result<Vec<u8>, xmltree::Error> {
    let mut buf = Vec::new();
    let config = EmitterConfig::new().write_document_declaration(false);
    element.write_with_config(&mut buf, config)?;
    Ok(buf)
}
