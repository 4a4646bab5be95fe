//! Locates and detaches the SOAP Body of a raw response

use tracing::trace;
use xmltree::{Element, XMLNode};

use super::SoapVersion;
use super::document::parse_element;
use crate::errors::MalformedResponseError;

/// Body element detached from a parsed response envelope
#[derive(Debug, Clone)]
pub struct ExtractedBody {
    /// Version implied by the Envelope namespace, if recognized
    pub version: Option<SoapVersion>,
    pub body: Element,
}

/// Parses `xml` and detaches the first `Body` child of the `Envelope` root
///
/// Both names are compared ASCII case-insensitively on the local name, so
/// the envelope namespace and prefix are not checked.
pub fn extract_body(xml: &[u8]) -> Result<ExtractedBody, MalformedResponseError> {
    let mut root = parse_element(xml)?;

    if !root.name.eq_ignore_ascii_case("Envelope") {
        return Err(MalformedResponseError::MissingEnvelope(root.name));
    }

    let version = root
        .namespace
        .as_deref()
        .and_then(SoapVersion::from_namespace);

    let position = root
        .children
        .iter()
        .position(|node| matches!(node, XMLNode::Element(e) if e.name.eq_ignore_ascii_case("Body")))
        .ok_or(MalformedResponseError::MissingBody)?;

    match root.children.remove(position) {
        XMLNode::Element(body) => {
            trace!(children = body.children.len(), ?version, "Detached SOAP Body");
            Ok(ExtractedBody { version, body })
        }
        _ => Err(MalformedResponseError::MissingBody),
    }
}
