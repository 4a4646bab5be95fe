//! # spnegosoap
//!
//! Blocking SOAP client whose HTTP exchanges are authenticated with
//! SPNEGO (`Negotiate`) tokens.
//!
//! A [`SoapConnection`] serializes a [`SoapMessage`], posts it through a
//! [`Transport`] and rebuilds the response Body as a fresh message, one
//! standalone document per Body entry. The security mechanism itself
//! (Kerberos login, GSS-API contexts) is supplied through
//! [`SecurityProvider`].

pub mod connection;
pub mod errors;
pub mod headers;
pub mod soap;
pub mod transport;

pub use connection::{CallStage, SoapConnection};
pub use errors::{ConfigurationError, MalformedResponseError, SoapError, TransportError};
pub use headers::{RequestDirectives, resolve_request_headers};
pub use soap::{MimeHeaders, SoapBody, SoapEnvelope, SoapHeader, SoapMessage, SoapVersion};
pub use transport::{
    Credentials, DelegatedCredential, Endpoint, HttpOptions, Method, NegotiateTransport,
    Protection, SecurityContext, SecurityProvider, Transport,
};
