use thiserror::Error;

/// Request metadata that cannot be mapped onto transport headers.
///
/// Raised before any network I/O.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("{0} defined more than once ({1} values)")]
    DuplicateHeader(&'static str, usize),
}

/// Failures originating in the authenticated transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Malformed endpoint {0}: {1}")]
    MalformedEndpoint(String, String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("{0} answered with HTTP status {1}")]
    Status(String, u16),
    #[error("Negotiation failed: {0}")]
    Negotiation(String),
    #[error("Privileged security operation failed: {0}")]
    Privileged(String),
    #[error("No response available, transport is not connected")]
    NotConnected,
}

impl TransportError {
    pub fn malformed_endpoint(endpoint: &str, reason: impl ToString) -> Self {
        TransportError::MalformedEndpoint(endpoint.to_string(), reason.to_string())
    }

    pub fn negotiation(message: impl ToString) -> Self {
        TransportError::Negotiation(message.to_string())
    }

    pub fn privileged(message: impl ToString) -> Self {
        TransportError::Privileged(message.to_string())
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Io(e) => TransportError::Io(e),
            ureq::Error::BadUri(uri) => {
                TransportError::MalformedEndpoint(uri, "missing scheme or host".to_string())
            }
            ureq::Error::Timeout(timeout) => TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("timeout: {}", timeout),
            )),
            other => TransportError::Http(other.to_string()),
        }
    }
}

/// The response bytes do not hold a usable SOAP envelope.
#[derive(Error, Debug)]
pub enum MalformedResponseError {
    #[error("XML parse error: {0}")]
    Xml(#[from] xmltree::ParseError),
    #[error("Response did not contain a SOAP 'Envelope' (root element is '{0}')")]
    MissingEnvelope(String),
    #[error("Response did not contain a SOAP 'Body'")]
    MissingBody,
    #[error("Cannot serialize body entry #{0} '{1}': {2}")]
    Serialize(usize, String, xmltree::Error),
    #[error("Cannot re-parse body entry #{0} '{1}': {2}")]
    Reparse(usize, String, xmltree::ParseError),
}

/// Call-level failure of [`SoapConnection::call`](crate::SoapConnection::call).
///
/// Whatever the origin, the original cause stays reachable through
/// [`std::error::Error::source`].
#[derive(Error, Debug)]
pub enum SoapError {
    #[error("Invalid request configuration")]
    Configuration(#[from] ConfigurationError),
    #[error("Cannot serialize SOAP request")]
    Request(#[source] xmltree::Error),
    #[error("Transport failure")]
    Transport(#[from] TransportError),
    #[error("Malformed SOAP response")]
    MalformedResponse(#[from] MalformedResponseError),
}

impl SoapError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, SoapError::Configuration(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SoapError::Transport(_))
    }

    pub fn is_malformed_response(&self) -> bool {
        matches!(self, SoapError::MalformedResponse(_))
    }
}
