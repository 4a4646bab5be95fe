//! # SOAP connection
//!
//! [`SoapConnection`] sends a [`SoapMessage`] through a [`Transport`] and
//! turns the answer into a new message. Every call is atomic: it returns a
//! complete response or an error, and the transport is disconnected exactly
//! once on the way out.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use spnegoconfig::Config;
use tracing::{debug, trace, warn};

use crate::errors::{SoapError, TransportError};
use crate::headers::resolve_request_headers;
use crate::soap::{SoapMessage, SoapVersion, extract_body, reconstitute_body};
use crate::transport::{
    Credentials, DelegatedCredential, Endpoint, HttpOptions, NegotiateTransport,
    Protection, SecurityProvider, Transport,
};

/// Progress of one call, reported when a stage fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStage {
    Idle,
    HeadersResolved,
    Connected,
    ResponseReceived,
    EnvelopeValidated,
    BodyExtracted,
    Reconstituted,
    Closed,
}

impl fmt::Display for CallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CallStage::Idle => "idle",
            CallStage::HeadersResolved => "headers resolved",
            CallStage::Connected => "connected",
            CallStage::ResponseReceived => "response received",
            CallStage::EnvelopeValidated => "envelope validated",
            CallStage::BodyExtracted => "body extracted",
            CallStage::Reconstituted => "reconstituted",
            CallStage::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Disconnects the borrowed transport when dropped
struct TransportGuard<'a, T: Transport> {
    transport: &'a mut T,
    stage: CallStage,
}

impl<'a, T: Transport> TransportGuard<'a, T> {
    fn new(transport: &'a mut T) -> Self {
        Self {
            transport,
            stage: CallStage::Idle,
        }
    }

    fn advance(&mut self, stage: CallStage) {
        trace!(%stage, "SOAP call stage");
        self.stage = stage;
    }
}

impl<T: Transport> Drop for TransportGuard<'_, T> {
    fn drop(&mut self) {
        self.transport.disconnect();
        if self.stage != CallStage::Reconstituted {
            debug!(stage = %self.stage, "SOAP call aborted");
        }
        trace!(stage = %CallStage::Closed, "SOAP call stage");
    }
}

/// Client-side SOAP connection over an authenticated transport
pub struct SoapConnection<T: Transport> {
    transport: T,
    version: SoapVersion,
}

impl<T: Transport> SoapConnection<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            version: SoapVersion::default(),
        }
    }

    /// Version used for responses whose Envelope namespace is not recognised
    pub fn with_message_version(mut self, version: SoapVersion) -> Self {
        self.version = version;
        self
    }

    pub fn message_version(&self) -> SoapVersion {
        self.version
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Sends `request` to `endpoint` and returns the response message
    ///
    /// The response Body holds one entry per element child of the received
    /// Body, each re-parsed as its own document. Faults are returned as
    /// regular Body content.
    pub fn call(
        &mut self,
        request: &SoapMessage,
        endpoint: impl Into<Endpoint>,
    ) -> Result<SoapMessage, SoapError> {
        let endpoint = endpoint.into();
        let fallback = self.version;
        let mut guard = TransportGuard::new(&mut self.transport);

        debug!(%endpoint, "SOAP call");
        let result = exchange(&mut guard, request, &endpoint, fallback);
        if let Err(err) = &result {
            warn!(%endpoint, stage = %guard.stage, "SOAP call failed: {}", err);
        }
        result
    }

    /// Releases the transport; calling it again has no effect
    pub fn close(&mut self) {
        self.transport.disconnect();
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

fn exchange<T: Transport>(
    guard: &mut TransportGuard<'_, T>,
    request: &SoapMessage,
    endpoint: &Endpoint,
    fallback: SoapVersion,
) -> Result<SoapMessage, SoapError> {
    let directives = resolve_request_headers(request.mime_headers())?;
    guard.transport.set_request_method(directives.method);
    for (name, value) in &directives.headers {
        guard.transport.add_request_header(name, value);
    }
    guard.advance(CallStage::HeadersResolved);

    let payload = request.to_bytes().map_err(SoapError::Request)?;
    trace!(bytes = payload.len(), "Request serialized");

    guard.transport.connect(endpoint, &payload)?;
    guard.advance(CallStage::Connected);

    let raw = read_response(&mut *guard.transport)?;
    guard.advance(CallStage::ResponseReceived);
    debug!(bytes = raw.len(), "SOAP response received");

    let extracted = extract_body(&raw)?;
    guard.advance(CallStage::EnvelopeValidated);
    guard.advance(CallStage::BodyExtracted);

    let version = extracted.version.unwrap_or(fallback);
    let message = reconstitute_body(&extracted.body, version)?;
    guard.advance(CallStage::Reconstituted);

    debug!(entries = message.body().len(), %version, "SOAP response reconstituted");
    Ok(message)
}

fn read_response<T: Transport>(transport: &mut T) -> Result<Vec<u8>, TransportError> {
    let mut stream = transport.response_stream()?;
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw)?;
    Ok(raw)
}

impl SoapConnection<NegotiateTransport> {
    /// Authenticates through `module` (keytab or ticket cache)
    pub fn with_login_module(
        provider: Box<dyn SecurityProvider>,
        module: impl Into<String>,
    ) -> Self {
        Self::new(NegotiateTransport::new(
            provider,
            Credentials::login_module(module),
        ))
    }

    /// Authenticates through `module` with a username and password
    pub fn with_password(
        provider: Box<dyn SecurityProvider>,
        module: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(NegotiateTransport::new(
            provider,
            Credentials::password(module, username, password),
        ))
    }

    /// Uses an existing credential, released after each exchange when
    /// `dispose` is set
    pub fn with_credential(
        provider: Box<dyn SecurityProvider>,
        credential: Box<dyn DelegatedCredential>,
        dispose: bool,
    ) -> Self {
        Self::new(NegotiateTransport::new(
            provider,
            Credentials::delegated(credential, dispose),
        ))
    }

    pub fn with_protected_credential(
        provider: Box<dyn SecurityProvider>,
        credential: Box<dyn DelegatedCredential>,
        dispose: bool,
        confidential: bool,
        integrity: bool,
    ) -> Self {
        Self::new(
            NegotiateTransport::new(provider, Credentials::delegated(credential, dispose))
                .with_protection(Protection::new(confidential, integrity)),
        )
    }

    /// Builds a password or login-module connection from configuration
    pub fn from_config(config: &Config, provider: Box<dyn SecurityProvider>) -> anyhow::Result<Self> {
        let module = config.get_login_module();
        let credentials = match (config.get_username(), config.get_password()) {
            (Some(username), Some(password)) => Credentials::password(module, username, password),
            (Some(_), None) => anyhow::bail!("client.username is set without client.password"),
            _ => Credentials::login_module(module),
        };
        Self::configured(config, provider, credentials)
    }

    /// Builds a connection around an existing credential, disposed according
    /// to `security.dispose_credentials`
    pub fn from_config_with_credential(
        config: &Config,
        provider: Box<dyn SecurityProvider>,
        credential: Box<dyn DelegatedCredential>,
    ) -> anyhow::Result<Self> {
        let credentials = Credentials::delegated(credential, config.get_dispose_credentials());
        Self::configured(config, provider, credentials)
    }

    fn configured(
        config: &Config,
        provider: Box<dyn SecurityProvider>,
        credentials: Credentials,
    ) -> anyhow::Result<Self> {
        let version: SoapVersion = config
            .get_soap_version()
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let timeout = match config.get_http_timeout_secs() {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let options = HttpOptions {
            timeout,
            proxy_from_env: config.get_proxy_from_env(),
            max_response_bytes: config.get_max_response_bytes(),
            user_agent: config.get_user_agent(),
        };
        let protection = Protection::new(config.get_confidentiality(), config.get_integrity());

        debug!(?credentials, %version, ?protection, "SOAP connection configured");

        let transport = NegotiateTransport::new(provider, credentials)
            .with_protection(protection)
            .with_options(options);
        Ok(Self::new(transport).with_message_version(version))
    }
}
