//! # Authenticated transport
//!
//! [`Transport`] is the contract the SOAP connection drives for one
//! request/response exchange. [`NegotiateTransport`] implements it over
//! blocking HTTP, carrying the opaque tokens of a pluggable
//! [`SecurityProvider`] in `Negotiate` authorization headers.

mod credentials;
mod http;

use std::fmt;
use std::io::Read;

use crate::errors::TransportError;

pub use credentials::{Credentials, DelegatedCredential, Protection, SecurityContext, SecurityProvider};
pub use http::{HttpOptions, NegotiateTransport};

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    Get,
    #[default]
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination address of a call
///
/// Kept opaque until the transport connects, which is where it is parsed
/// and validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for Endpoint {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl From<&Endpoint> for Endpoint {
    fn from(endpoint: &Endpoint) -> Self {
        endpoint.clone()
    }
}

impl From<url::Url> for Endpoint {
    fn from(url: url::Url) -> Self {
        Self(url.into())
    }
}

/// An authenticated request/response channel
///
/// A connection drives one exchange as: `set_request_method`,
/// `add_request_header` (any number), `connect`, `response_stream`,
/// `disconnect`.
pub trait Transport {
    fn set_request_method(&mut self, method: Method);

    fn add_request_header(&mut self, name: &str, value: &str);

    /// Performs the security handshake and sends `body` to `endpoint`
    fn connect(&mut self, endpoint: &Endpoint, body: &[u8]) -> Result<(), TransportError>;

    /// Raw response payload of the last successful `connect`
    fn response_stream(&mut self) -> Result<Box<dyn Read + '_>, TransportError>;

    /// Releases the exchange and clears per-request state (method, headers,
    /// buffered response)
    ///
    /// Must be idempotent.
    fn disconnect(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn set_request_method(&mut self, method: Method) {
        (**self).set_request_method(method)
    }

    fn add_request_header(&mut self, name: &str, value: &str) {
        (**self).add_request_header(name, value)
    }

    fn connect(&mut self, endpoint: &Endpoint, body: &[u8]) -> Result<(), TransportError> {
        (**self).connect(endpoint, body)
    }

    fn response_stream(&mut self) -> Result<Box<dyn Read + '_>, TransportError> {
        (**self).response_stream()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }
}
