//! Rebuilds a SOAP message from a detached response Body

use tracing::{debug, trace};
use xmltree::{Element, XMLNode};

use super::document::serialize_element;
use super::{Document, SoapMessage, SoapVersion};
use crate::errors::MalformedResponseError;

/// Builds a new message whose Body holds one standalone document per child
/// element of `body`, in order
///
/// Each child is serialized on its own and parsed again, so a malformed or
/// foreign entry fails alone and the result shares nothing with `body`.
/// Text, comments, CDATA and processing instructions directly under the Body
/// are not entries and are skipped. Any failure aborts the whole rebuild.
pub fn reconstitute_body(
    body: &Element,
    version: SoapVersion,
) -> Result<SoapMessage, MalformedResponseError> {
    let mut message = SoapMessage::new(version);

    debug!(children = body.children.len(), "Rebuilding SOAP Body");

    let entries = body.children.iter().filter_map(|node| match node {
        XMLNode::Element(element) => Some(element),
        _ => None,
    });

    for (index, entry) in entries.enumerate() {
        trace!(index, name = %entry.name, "Body entry");

        let bytes = serialize_element(entry)
            .map_err(|e| MalformedResponseError::Serialize(index, entry.name.clone(), e))?;

        let document = Document::parse(&bytes)
            .map_err(|e| MalformedResponseError::Reparse(index, entry.name.clone(), e))?;

        message.body_mut().add_document(document);
    }

    Ok(message)
}
