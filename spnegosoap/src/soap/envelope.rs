//! SOAP message model: envelope, header, body

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use xmltree::{Element, EmitterConfig, Namespace, XMLNode};

use super::{Document, MimeHeaders};

pub const SOAP_11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// SOAP protocol version of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoapVersion {
    #[default]
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP_11_NS,
            SoapVersion::Soap12 => SOAP_12_NS,
        }
    }

    /// Prefix used when emitting envelope elements
    pub fn prefix(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "SOAP-ENV",
            SoapVersion::Soap12 => "env",
        }
    }

    pub fn from_namespace(uri: &str) -> Option<Self> {
        match uri {
            SOAP_11_NS => Some(SoapVersion::Soap11),
            SOAP_12_NS => Some(SoapVersion::Soap12),
            _ => None,
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoapVersion::Soap11 => write!(f, "1.1"),
            SoapVersion::Soap12 => write!(f, "1.2"),
        }
    }
}

impl FromStr for SoapVersion {
    type Err = String;

    /// Accepts `1.1` / `1.2` (optionally prefixed with `soap`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_ascii_lowercase();
        match label.trim_start_matches("soap").trim() {
            "1.1" | "11" => Ok(SoapVersion::Soap11),
            "1.2" | "12" => Ok(SoapVersion::Soap12),
            _ => Err(format!("Unknown SOAP version '{}'", s)),
        }
    }
}

/// SOAP header: ordered header entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoapHeader {
    elements: Vec<Element>,
}

impl SoapHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_header_element(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn child_elements(&self) -> &[Element] {
        &self.elements
    }
}

/// SOAP body: ordered body entries
///
/// Order and identity of siblings are preserved as added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoapBody {
    elements: Vec<Element>,
}

impl SoapBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body_element(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Appends a whole standalone document as one body entry
    pub fn add_document(&mut self, document: Document) {
        self.elements.push(document.into_root());
    }

    pub fn child_elements(&self) -> &[Element] {
        &self.elements
    }

    /// First entry with the given local name
    pub fn get_child_element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// SOAP envelope: optional header and mandatory body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoapEnvelope {
    pub version: SoapVersion,
    pub header: Option<SoapHeader>,
    pub body: SoapBody,
}

impl SoapEnvelope {
    pub fn new(version: SoapVersion) -> Self {
        Self {
            version,
            header: None,
            body: SoapBody::new(),
        }
    }

    /// Builds the envelope element tree
    pub fn to_element(&self) -> Element {
        let mut namespaces = Namespace::empty();
        namespaces.put(self.version.prefix(), self.version.namespace());

        let mut envelope = self.soap_element("Envelope");
        envelope.namespaces = Some(namespaces);

        if let Some(header) = &self.header {
            let mut header_elem = self.soap_element("Header");
            header_elem
                .children
                .extend(header.elements.iter().cloned().map(XMLNode::Element));
            envelope.children.push(XMLNode::Element(header_elem));
        }

        let mut body_elem = self.soap_element("Body");
        body_elem
            .children
            .extend(self.body.elements.iter().cloned().map(XMLNode::Element));
        envelope.children.push(XMLNode::Element(body_elem));

        envelope
    }

    fn soap_element(&self, local_name: &str) -> Element {
        let mut element = Element::new(local_name);
        element.prefix = Some(self.version.prefix().to_string());
        element.namespace = Some(self.version.namespace().to_string());
        element
    }
}

/// A SOAP message: MIME headers plus envelope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoapMessage {
    mime_headers: MimeHeaders,
    envelope: SoapEnvelope,
}

impl SoapMessage {
    /// Creates an empty message (no header, empty body)
    pub fn new(version: SoapVersion) -> Self {
        Self {
            mime_headers: MimeHeaders::new(),
            envelope: SoapEnvelope::new(version),
        }
    }

    pub fn version(&self) -> SoapVersion {
        self.envelope.version
    }

    pub fn mime_headers(&self) -> &MimeHeaders {
        &self.mime_headers
    }

    pub fn mime_headers_mut(&mut self) -> &mut MimeHeaders {
        &mut self.mime_headers
    }

    pub fn envelope(&self) -> &SoapEnvelope {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut SoapEnvelope {
        &mut self.envelope
    }

    pub fn header(&self) -> Option<&SoapHeader> {
        self.envelope.header.as_ref()
    }

    /// Header of the message, created empty on first access
    pub fn header_mut(&mut self) -> &mut SoapHeader {
        self.envelope.header.get_or_insert_with(SoapHeader::new)
    }

    pub fn body(&self) -> &SoapBody {
        &self.envelope.body
    }

    pub fn body_mut(&mut self) -> &mut SoapBody {
        &mut self.envelope.body
    }

    /// Writes the envelope as an XML document (with declaration)
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), xmltree::Error> {
        let config = EmitterConfig::new().write_document_declaration(true);
        self.envelope.to_element().write_with_config(writer, config)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, xmltree::Error> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}
