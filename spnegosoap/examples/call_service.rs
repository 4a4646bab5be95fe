//! Sends one SOAP request to a SPNEGO protected endpoint
//!
//! ```text
//! SPNEGOSOAP_TOKEN=<base64 token> cargo run --example call_service -- <endpoint> [soap-action] < payload.xml
//! ```
//!
//! `payload.xml` holds the Body entry. The token is an initial `Negotiate`
//! token obtained out of band (e.g. from a GSS-API helper); configuration is
//! read from `~/.spnegosoap/config.yaml` or `$SPNEGOSOAP_CONFIG`.

use std::env;
use std::io::{self, Read};

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use spnegoconfig::Config;
use spnegosoap::{
    Credentials, Protection, SecurityContext, SecurityProvider, SoapConnection, SoapMessage,
    TransportError,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use xmltree::{Element, EmitterConfig};

/// Replays a token obtained outside of this process
struct StaticTokenProvider {
    token: Vec<u8>,
}

struct StaticTokenContext {
    token: Option<Vec<u8>>,
    established: bool,
}

impl SecurityContext for StaticTokenContext {
    fn step(&mut self, input: Option<&[u8]>) -> Result<Option<Vec<u8>>, TransportError> {
        match input {
            None => Ok(self.token.take()),
            Some(_) => {
                self.established = true;
                Ok(None)
            }
        }
    }

    fn is_established(&self) -> bool {
        self.established
    }
}

impl SecurityProvider for StaticTokenProvider {
    fn create_context(
        &self,
        credentials: &Credentials,
        service: &str,
        protection: Protection,
    ) -> Result<Box<dyn SecurityContext>, TransportError> {
        info!(?credentials, service, ?protection, "Using pre-obtained Negotiate token");
        Ok(Box::new(StaticTokenContext {
            token: Some(self.token.clone()),
            established: false,
        }))
    }
}

fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.get_log_min_level().to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
}

fn main() -> Result<()> {
    let config = Config::load_config("")?;
    init_tracing(&config);

    let mut args = env::args().skip(1);
    let Some(endpoint) = args.next() else {
        bail!("usage: call_service <endpoint> [soap-action] < payload.xml");
    };
    let soap_action = args.next();

    let token = env::var("SPNEGOSOAP_TOKEN").context("SPNEGOSOAP_TOKEN is not set")?;
    let token = BASE64
        .decode(token.trim())
        .context("SPNEGOSOAP_TOKEN is not valid base64")?;

    let mut payload = Vec::new();
    io::stdin().read_to_end(&mut payload)?;
    let entry = Element::parse(payload.as_slice()).context("payload is not XML")?;

    let mut connection = SoapConnection::from_config(&config, Box::new(StaticTokenProvider { token }))?;

    let mut request = SoapMessage::new(connection.message_version());
    if let Some(action) = soap_action {
        request.mime_headers_mut().add_header("SOAPAction", action);
    }
    request.body_mut().add_body_element(entry);

    let response = connection.call(&request, endpoint)?;

    let config = EmitterConfig::new()
        .perform_indent(true)
        .write_document_declaration(false);
    for element in response.body().child_elements() {
        element.write_with_config(io::stdout(), config.clone())?;
        println!();
    }

    Ok(())
}
