//! Maps the MIME headers of an outgoing message onto transport request headers

use tracing::debug;

use crate::errors::ConfigurationError;
use crate::soap::MimeHeaders;
use crate::soap::header_names::{CONTENT_TYPE, SOAP_ACTION};
use crate::transport::Method;

/// Content type synthesized when neither `Content-Type` nor `SOAPAction` is set
pub const DEFAULT_CONTENT_TYPE: &str = "application/soap+xml; charset=UTF-8;";

/// Content type synthesized when only `SOAPAction` is set
pub const SOAP_ACTION_CONTENT_TYPE: &str = "text/xml; charset=UTF-8;";

/// What the transport must send for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDirectives {
    pub method: Method,
    /// `Content-Type` first, then `SOAPAction` when present
    pub headers: Vec<(String, String)>,
}

/// Resolves the transport headers of a request
///
/// `Content-Type` and `SOAPAction` may each appear at most once. A missing
/// `Content-Type` is synthesized from the presence of `SOAPAction`.
pub fn resolve_request_headers(
    mime_headers: &MimeHeaders,
) -> Result<RequestDirectives, ConfigurationError> {
    let content_type = single_value(mime_headers, CONTENT_TYPE)?;
    let soap_action = single_value(mime_headers, SOAP_ACTION)?;

    let content_type = match (content_type, soap_action) {
        (Some(value), _) => value.to_string(),
        (None, None) => DEFAULT_CONTENT_TYPE.to_string(),
        (None, Some(_)) => SOAP_ACTION_CONTENT_TYPE.to_string(),
    };

    let mut headers = vec![(CONTENT_TYPE.to_string(), content_type)];
    if let Some(action) = soap_action {
        headers.push((SOAP_ACTION.to_string(), action.to_string()));
    }

    debug!(?headers, "Resolved request headers");

    Ok(RequestDirectives {
        method: Method::Post,
        headers,
    })
}

fn single_value<'a>(
    mime_headers: &'a MimeHeaders,
    name: &'static str,
) -> Result<Option<&'a str>, ConfigurationError> {
    match mime_headers.get_header(name) {
        None => Ok(None),
        Some(values) if values.len() > 1 => {
            Err(ConfigurationError::DuplicateHeader(name, values.len()))
        }
        Some(values) => Ok(values.first().copied()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_content_type_without_soap_action() {
        let directives = resolve_request_headers(&MimeHeaders::new()).unwrap();
        assert_eq!(directives.method, Method::Post);
        assert_eq!(
            directives.headers,
            vec![(
                "Content-Type".to_string(),
                "application/soap+xml; charset=UTF-8;".to_string()
            )]
        );
    }

    #[test]
    fn test_text_xml_when_soap_action_present() {
        let mut headers = MimeHeaders::new();
        headers.add_header("SOAPAction", "\"urn:stock#GetPrice\"");

        let directives = resolve_request_headers(&headers).unwrap();
        assert_eq!(
            directives.headers,
            vec![
                ("Content-Type".to_string(), "text/xml; charset=UTF-8;".to_string()),
                ("SOAPAction".to_string(), "\"urn:stock#GetPrice\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_explicit_content_type_is_forwarded() {
        let mut headers = MimeHeaders::new();
        headers.add_header("content-type", "text/xml; charset=\"utf-8\"");
        headers.add_header("X-Ignored", "1");

        let directives = resolve_request_headers(&headers).unwrap();
        assert_eq!(
            directives.headers,
            vec![("Content-Type".to_string(), "text/xml; charset=\"utf-8\"".to_string())]
        );
    }

    #[test]
    fn test_duplicate_content_type() {
        let mut headers = MimeHeaders::new();
        headers.add_header("Content-Type", "text/xml");
        headers.add_header("Content-Type", "application/soap+xml");

        let err = resolve_request_headers(&headers).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateHeader("Content-Type", 2)));
    }

    #[test]
    fn test_duplicate_soap_action() {
        let mut headers = MimeHeaders::new();
        headers.add_header("Content-Type", "text/xml");
        headers.add_header("SOAPAction", "a");
        headers.add_header("SOAPAction", "b");

        let err = resolve_request_headers(&headers).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateHeader("SOAPAction", 2)));
    }
}
