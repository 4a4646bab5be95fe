//! Blocking `Negotiate` HTTP transport built on `ureq`

use std::io::{Cursor, Read};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, trace};
use ureq::http::{HeaderMap, Response, StatusCode};
use ureq::{Agent, Body, Proxy};
use url::Url;

use super::{Credentials, Endpoint, Method, Protection, SecurityContext, SecurityProvider, Transport};
use crate::errors::TransportError;

const AUTHORIZATION: &str = "Authorization";
const WWW_AUTHENTICATE: &str = "WWW-Authenticate";
const NEGOTIATE: &str = "Negotiate";

/// HTTP settings of a [`NegotiateTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    /// Global timeout of one exchange, `None` waits forever
    pub timeout: Option<Duration>,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY`
    pub proxy_from_env: bool,
    /// Largest response body accepted
    pub max_response_bytes: u64,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            proxy_from_env: true,
            max_response_bytes: 10 * 1024 * 1024,
            user_agent: "spnegosoap".to_string(),
        }
    }
}

/// Blocking HTTP transport authenticated with `Negotiate` tokens
///
/// Each `connect` creates a fresh security context for `HTTP@<host>`, sends
/// the request with the initial token and answers at most one `401`
/// continuation. The response body is buffered until `disconnect`.
pub struct NegotiateTransport {
    provider: Box<dyn SecurityProvider>,
    credentials: Credentials,
    protection: Protection,
    options: HttpOptions,
    method: Method,
    headers: Vec<(String, String)>,
    context: Option<Box<dyn SecurityContext>>,
    response: Option<Vec<u8>>,
}

impl NegotiateTransport {
    pub fn new(provider: Box<dyn SecurityProvider>, credentials: Credentials) -> Self {
        Self {
            provider,
            credentials,
            protection: Protection::default(),
            options: HttpOptions::default(),
            method: Method::default(),
            headers: Vec::new(),
            context: None,
            response: None,
        }
    }

    pub fn with_protection(mut self, protection: Protection) -> Self {
        self.protection = protection;
        self
    }

    pub fn with_options(mut self, options: HttpOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_confidentiality(&mut self, confidential: bool) {
        self.protection.confidentiality = confidential;
    }

    pub fn set_message_integrity(&mut self, integrity: bool) {
        self.protection.integrity = integrity;
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// `true` once the server accepted the last context
    pub fn is_context_established(&self) -> bool {
        self.context.as_ref().is_some_and(|c| c.is_established())
    }

    pub fn is_connected(&self) -> bool {
        self.response.is_some()
    }

    fn agent(&self) -> Agent {
        let proxy = if self.options.proxy_from_env {
            Proxy::try_from_env()
        } else {
            None
        };

        let config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(self.options.timeout)
            .proxy(proxy)
            .user_agent(self.options.user_agent.as_str())
            .build();

        config.into()
    }

    fn exchange(&mut self, endpoint: &Endpoint, body: &[u8]) -> Result<(), TransportError> {
        let url = parse_endpoint(endpoint)?;
        let host = url.host_str().unwrap_or_default();
        let service = format!("HTTP@{}", host);

        debug!(endpoint = %url, %service, method = %self.method, "Opening authenticated exchange");

        let agent = self.agent();
        let context = self
            .provider
            .create_context(&self.credentials, &service, self.protection)?;
        let context = self.context.insert(context);

        let token = context
            .step(None)?
            .ok_or_else(|| TransportError::negotiation("security context produced no initial token"))?;

        let mut response = send(&agent, self.method, &url, &self.headers, &token, body)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let server_token = negotiate_token(response.headers())?.ok_or_else(|| {
                TransportError::negotiation(format!("{} refused the Negotiate token", url))
            })?;
            if context.is_established() {
                return Err(TransportError::negotiation(format!(
                    "{} refused an established security context",
                    url
                )));
            }

            trace!(len = server_token.len(), "Negotiate continuation requested");
            let next = context.step(Some(server_token.as_slice()))?.ok_or_else(|| {
                TransportError::negotiation("security context produced no continuation token")
            })?;

            response = send(&agent, self.method, &url, &self.headers, &next, body)?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(TransportError::negotiation(format!(
                    "{} refused the continuation token",
                    url
                )));
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(url.to_string(), status.as_u16()));
        }

        if let Some(server_token) = negotiate_token(response.headers())? {
            if !context.is_established() {
                trace!(len = server_token.len(), "Mutual authentication token received");
                context.step(Some(server_token.as_slice()))?;
            }
        }

        let bytes = response
            .body_mut()
            .with_config()
            .limit(self.options.max_response_bytes)
            .read_to_vec()?;

        debug!(status = status.as_u16(), bytes = bytes.len(), "Response received");
        self.response = Some(bytes);
        Ok(())
    }
}

impl Transport for NegotiateTransport {
    fn set_request_method(&mut self, method: Method) {
        self.method = method;
    }

    fn add_request_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn connect(&mut self, endpoint: &Endpoint, body: &[u8]) -> Result<(), TransportError> {
        self.response = None;
        let result = self.exchange(endpoint, body);
        if self.credentials.dispose_if_requested() {
            debug!("Delegated credential disposed");
        }
        if let Err(err) = &result {
            debug!(%endpoint, "Authenticated exchange failed: {}", err);
        }
        result
    }

    fn response_stream(&mut self) -> Result<Box<dyn Read + '_>, TransportError> {
        match &self.response {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
            None => Err(TransportError::NotConnected),
        }
    }

    fn disconnect(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.dispose();
        }
        self.response = None;
        self.headers.clear();
        self.method = Method::default();
    }
}

fn parse_endpoint(endpoint: &Endpoint) -> Result<Url, TransportError> {
    let url = Url::parse(endpoint.as_str())
        .map_err(|e| TransportError::malformed_endpoint(endpoint.as_str(), e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TransportError::malformed_endpoint(
                endpoint.as_str(),
                format!("unsupported scheme '{}'", other),
            ));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(TransportError::malformed_endpoint(endpoint.as_str(), "missing host"));
    }

    Ok(url)
}

fn send(
    agent: &Agent,
    method: Method,
    url: &Url,
    headers: &[(String, String)],
    token: &[u8],
    body: &[u8],
) -> Result<Response<Body>, TransportError> {
    let authorization = format!("{} {}", NEGOTIATE, BASE64.encode(token));

    let response = match method {
        Method::Post => {
            let mut request = agent.post(url.as_str());
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request.header(AUTHORIZATION, authorization.as_str()).send(body)?
        }
        Method::Get => {
            let mut request = agent.get(url.as_str());
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
            request.header(AUTHORIZATION, authorization.as_str()).call()?
        }
    };

    trace!(status = response.status().as_u16(), "HTTP leg completed");
    Ok(response)
}

/// Decoded token of the first `WWW-Authenticate: Negotiate <token>` header
fn negotiate_token(headers: &HeaderMap) -> Result<Option<Vec<u8>>, TransportError> {
    for value in headers.get_all(WWW_AUTHENTICATE) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        let value = value.trim();
        let Some((scheme, token)) = value.split_once(' ') else {
            continue;
        };
        if !scheme.eq_ignore_ascii_case(NEGOTIATE) {
            continue;
        }
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        return BASE64
            .decode(token)
            .map(Some)
            .map_err(|e| TransportError::negotiation(format!("invalid Negotiate token: {}", e)));
    }
    Ok(None)
}
