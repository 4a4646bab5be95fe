//! # SOAP messages
//!
//! Message model and the response-side processing of a SOAP exchange.
//!
//! ## Architecture
//!
//! - [`SoapMessage`] : MIME headers plus [`SoapEnvelope`] (optional
//!   [`SoapHeader`], mandatory [`SoapBody`])
//! - [`MimeHeaders`] : ordered multimap of MIME headers
//! - [`Document`] : standalone XML document, the unit appended to a response Body
//! - [`extract_body`] : validates a raw response and detaches its Body
//! - [`reconstitute_body`] : rebuilds a message from a detached Body, one
//!   freshly parsed document per entry
//!
//! ## Example
//!
//! ```
//! use spnegosoap::soap::{extract_body, reconstitute_body, SoapVersion};
//!
//! let raw = br#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
//!   <s:Body><a/><b/></s:Body>
//! </s:Envelope>"#;
//!
//! let extracted = extract_body(raw).unwrap();
//! let message = reconstitute_body(&extracted.body, SoapVersion::Soap11).unwrap();
//! assert_eq!(message.body().len(), 2);
//! ```

mod document;
mod envelope;
mod extract;
mod mime_headers;
mod reconstitute;

pub use document::{Document, parse_element, serialize_element};
pub use envelope::{SOAP_11_NS, SOAP_12_NS, SoapBody, SoapEnvelope, SoapHeader, SoapMessage, SoapVersion};
pub use extract::{ExtractedBody, extract_body};
pub use mime_headers::MimeHeaders;
pub use reconstitute::reconstitute_body;

/// MIME header names mapped onto transport headers
pub mod header_names {
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const SOAP_ACTION: &str = "SOAPAction";
}
