use std::cell::RefCell;
use std::io::{self, Cursor, Read};
use std::rc::Rc;

use spnegosoap::errors::{MalformedResponseError, TransportError};
use spnegosoap::soap::SOAP_12_NS;
use spnegosoap::transport::{Endpoint, Method, Transport};
use spnegosoap::{SoapConnection, SoapError, SoapMessage, SoapVersion};
use xmltree::{Element, XMLNode};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Method(Method),
    Header(String, String),
    Connect(String, Vec<u8>),
    ResponseStream,
    Disconnect,
}

type Log = Rc<RefCell<Vec<Call>>>;

enum Reply {
    Bytes(Vec<u8>),
    ConnectFails,
    StreamFails,
}

struct MockTransport {
    log: Log,
    reply: Reply,
}

impl MockTransport {
    fn answering(xml: &str) -> (Self, Log) {
        Self::with_reply(Reply::Bytes(xml.as_bytes().to_vec()))
    }

    fn with_reply(reply: Reply) -> (Self, Log) {
        let log = Log::default();
        (
            Self {
                log: log.clone(),
                reply,
            },
            log,
        )
    }
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
    }
}

impl Transport for MockTransport {
    fn set_request_method(&mut self, method: Method) {
        self.log.borrow_mut().push(Call::Method(method));
    }

    fn add_request_header(&mut self, name: &str, value: &str) {
        self.log
            .borrow_mut()
            .push(Call::Header(name.to_string(), value.to_string()));
    }

    fn connect(&mut self, endpoint: &Endpoint, body: &[u8]) -> Result<(), TransportError> {
        self.log
            .borrow_mut()
            .push(Call::Connect(endpoint.to_string(), body.to_vec()));
        match self.reply {
            Reply::ConnectFails => Err(TransportError::from(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            _ => Ok(()),
        }
    }

    fn response_stream(&mut self) -> Result<Box<dyn Read + '_>, TransportError> {
        self.log.borrow_mut().push(Call::ResponseStream);
        match &self.reply {
            Reply::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
            Reply::StreamFails => Ok(Box::new(FailingReader)),
            Reply::ConnectFails => Err(TransportError::NotConnected),
        }
    }

    fn disconnect(&mut self) {
        self.log.borrow_mut().push(Call::Disconnect);
    }
}

const ENDPOINT: &str = "http://soap.example.org/service";

fn request() -> SoapMessage {
    let mut message = SoapMessage::new(SoapVersion::Soap11);
    let mut ping = Element::new("Ping");
    ping.children.push(XMLNode::Text("hello".to_string()));
    message.body_mut().add_body_element(ping);
    message
}

fn disconnects(log: &Log) -> usize {
    log.borrow().iter().filter(|c| **c == Call::Disconnect).count()
}

fn connects(log: &Log) -> usize {
    log.borrow()
        .iter()
        .filter(|c| matches!(c, Call::Connect(_, _)))
        .count()
}

fn headers(log: &Log) -> Vec<(String, String)> {
    log.borrow()
        .iter()
        .filter_map(|c| match c {
            Call::Header(name, value) => Some((name.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn test_call_sequence_and_body_order() {
    let (transport, log) = MockTransport::answering("<Envelope><Body><a/><b/></Body></Envelope>");
    let mut connection = SoapConnection::new(transport);

    let response = connection.call(&request(), ENDPOINT).unwrap();

    let names: Vec<&str> = response
        .body()
        .child_elements()
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(response.version(), SoapVersion::Soap11);

    let log = log.borrow();
    assert_eq!(log.first(), Some(&Call::Method(Method::Post)));
    assert_eq!(
        log.iter().filter(|c| matches!(c, Call::Method(_))).count(),
        1
    );
    let connect = log
        .iter()
        .position(|c| matches!(c, Call::Connect(_, _)))
        .unwrap();
    let stream = log.iter().position(|c| *c == Call::ResponseStream).unwrap();
    assert!(connect < stream);
    assert_eq!(log.last(), Some(&Call::Disconnect));

    match &log[connect] {
        Call::Connect(endpoint, body) => {
            assert_eq!(endpoint, ENDPOINT);
            let sent = Element::parse(body.as_slice()).unwrap();
            assert_eq!(sent.name, "Envelope");
            let body = sent.get_child("Body").unwrap();
            assert_eq!(body.get_child("Ping").unwrap().get_text().unwrap(), "hello");
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[test]
fn test_default_content_type() {
    let (transport, log) = MockTransport::answering("<Envelope><Body/></Envelope>");
    let mut connection = SoapConnection::new(transport);

    connection.call(&request(), ENDPOINT).unwrap();

    assert_eq!(
        headers(&log),
        vec![(
            "Content-Type".to_string(),
            "application/soap+xml; charset=UTF-8;".to_string()
        )]
    );
}

#[test]
fn test_soap_action_selects_text_xml() {
    let (transport, log) = MockTransport::answering("<Envelope><Body/></Envelope>");
    let mut connection = SoapConnection::new(transport);

    let mut message = request();
    message
        .mime_headers_mut()
        .add_header("SOAPAction", "\"urn:example#Ping\"");
    connection.call(&message, ENDPOINT).unwrap();

    assert_eq!(
        headers(&log),
        vec![
            ("Content-Type".to_string(), "text/xml; charset=UTF-8;".to_string()),
            ("SOAPAction".to_string(), "\"urn:example#Ping\"".to_string()),
        ]
    );
}

#[test]
fn test_duplicate_content_type_never_connects() {
    let (transport, log) = MockTransport::answering("<Envelope><Body/></Envelope>");
    let mut connection = SoapConnection::new(transport);

    let mut message = request();
    message.mime_headers_mut().add_header("Content-Type", "text/xml");
    message
        .mime_headers_mut()
        .add_header("Content-Type", "application/soap+xml");

    let err = connection.call(&message, ENDPOINT).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(connects(&log), 0);
    assert_eq!(disconnects(&log), 1);
}

#[test]
fn test_root_must_be_envelope() {
    let (transport, log) = MockTransport::answering("<Reply><Body/></Reply>");
    let mut connection = SoapConnection::new(transport);

    let err = connection.call(&request(), ENDPOINT).unwrap_err();
    assert!(matches!(
        err,
        SoapError::MalformedResponse(MalformedResponseError::MissingEnvelope(ref name)) if name == "Reply"
    ));
    assert_eq!(disconnects(&log), 1);
}

#[test]
fn test_missing_body() {
    let (transport, log) = MockTransport::answering("<Envelope></Envelope>");
    let mut connection = SoapConnection::new(transport);

    let err = connection.call(&request(), ENDPOINT).unwrap_err();
    assert!(matches!(
        err,
        SoapError::MalformedResponse(MalformedResponseError::MissingBody)
    ));
    assert_eq!(disconnects(&log), 1);
}

#[test]
fn test_empty_body() {
    let (transport, log) = MockTransport::answering("<Envelope><Body/></Envelope>");
    let mut connection = SoapConnection::new(transport);

    let response = connection.call(&request(), ENDPOINT).unwrap();
    assert!(response.body().is_empty());
    assert_eq!(disconnects(&log), 1);
}

#[test]
fn test_unparsable_response() {
    let (transport, log) = MockTransport::answering("<Envelope><Body>");
    let mut connection = SoapConnection::new(transport);

    let err = connection.call(&request(), ENDPOINT).unwrap_err();
    assert!(matches!(
        err,
        SoapError::MalformedResponse(MalformedResponseError::Xml(_))
    ));
    assert_eq!(disconnects(&log), 1);
}

#[test]
fn test_connect_failure() {
    let (transport, log) = MockTransport::with_reply(Reply::ConnectFails);
    let mut connection = SoapConnection::new(transport);

    let err = connection.call(&request(), ENDPOINT).unwrap_err();
    assert!(err.is_transport());
    assert!(!log.borrow().contains(&Call::ResponseStream));
    assert_eq!(disconnects(&log), 1);
}

#[test]
fn test_stream_failure_is_a_transport_error() {
    let (transport, log) = MockTransport::with_reply(Reply::StreamFails);
    let mut connection = SoapConnection::new(transport);

    let err = connection.call(&request(), ENDPOINT).unwrap_err();
    assert!(matches!(err, SoapError::Transport(TransportError::Io(_))));
    assert_eq!(disconnects(&log), 1);
}

#[test]
fn test_response_version_follows_envelope() {
    let xml = format!(
        r#"<env:Envelope xmlns:env="{}"><env:Body><r:Done xmlns:r="urn:r"/></env:Body></env:Envelope>"#,
        SOAP_12_NS
    );
    let (transport, _log) = MockTransport::answering(&xml);
    let mut connection = SoapConnection::new(transport);

    let response = connection.call(&request(), ENDPOINT).unwrap();
    assert_eq!(response.version(), SoapVersion::Soap12);
    let done = response.body().get_child_element("Done").unwrap();
    assert_eq!(done.namespace.as_deref(), Some("urn:r"));
}

#[test]
fn test_encoded_response_keeps_xsi_attributes() {
    let (transport, _log) = MockTransport::answering(
        r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <s:Body>
    <m:R xmlns:m="urn:m"><v xsi:type="xsd:string">x</v><w xsi:nil="true" nil="local"/></m:R>
  </s:Body>
</s:Envelope>"#,
    );
    let mut connection = SoapConnection::new(transport);

    let response = connection.call(&request(), ENDPOINT).unwrap();
    let entry = response.body().get_child_element("R").unwrap();

    let v = entry.get_child("v").unwrap();
    assert_eq!(
        v.attributes.get("xsi:type").map(String::as_str),
        Some("xsd:string")
    );
    let w = entry.get_child("w").unwrap();
    assert_eq!(w.attributes.get("xsi:nil").map(String::as_str), Some("true"));
    assert_eq!(w.attributes.get("nil").map(String::as_str), Some("local"));

    let written = String::from_utf8(response.to_bytes().unwrap()).unwrap();
    assert!(written.contains(r#"xsi:nil="true""#));
    assert!(written.contains(r#"nil="local""#));
}

#[test]
fn test_unknown_namespace_uses_configured_version() {
    let (transport, _log) =
        MockTransport::answering(r#"<x:Envelope xmlns:x="urn:custom"><x:Body><a/></x:Body></x:Envelope>"#);
    let mut connection = SoapConnection::new(transport).with_message_version(SoapVersion::Soap12);

    let response = connection.call(&request(), ENDPOINT).unwrap();
    assert_eq!(response.version(), SoapVersion::Soap12);
}

#[test]
fn test_fault_is_returned_as_body_content() {
    let (transport, _log) = MockTransport::answering(
        r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <s:Fault><faultcode>s:Server</faultcode><faultstring>boom</faultstring></s:Fault>
  </s:Body>
</s:Envelope>"#,
    );
    let mut connection = SoapConnection::new(transport);

    let response = connection.call(&request(), ENDPOINT).unwrap();
    let fault = response.body().get_child_element("Fault").unwrap();
    assert_eq!(
        fault.get_child("faultstring").unwrap().get_text().unwrap(),
        "boom"
    );
}

#[test]
fn test_disconnect_once_per_call_and_close_is_idempotent() {
    let (transport, log) = MockTransport::answering("<Envelope><Body><a/></Body></Envelope>");
    let mut connection = SoapConnection::new(transport);

    connection.call(&request(), ENDPOINT).unwrap();
    connection.call(&request(), ENDPOINT).unwrap();
    assert_eq!(disconnects(&log), 2);

    connection.close();
    connection.close();
    assert_eq!(disconnects(&log), 4);
}
