//! SOAP 1.1 envelope framing.
//!
//! Requests are written with quick-xml's event writer around a body serialized
//! through serde. Responses are framed with the event reader: the first child
//! of `<Body>` is either a `<Fault>` or the operation response, which is then
//! handed to serde.
//!
//! quick-xml's deserializer trims text nodes. Before the response is handed
//! over, leading and trailing whitespace of text content is rewritten as
//! character references, which survive the trim and are restored on unescape.

use super::fault::Fault;
use super::Error;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::ops::Range;

/// SOAP 1.1 envelope namespace URI.
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// XML Schema instance namespace URI, used for `xsi:type` and `xsi:nil`.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Prefix bound to [`SOAP_ENV_NS`] in outgoing envelopes.
const ENV_PREFIX: &str = "soapenv";

/// A request body that can be placed inside a SOAP `<Body>`.
///
/// `ELEMENT` is the local name of the body element, e.g. `login`. Children are
/// produced by the type's [`Serialize`] implementation.
pub trait Message: Serialize {
    /// Local name of the request element.
    const ELEMENT: &'static str;
}

/// A header element serialized ahead of time so that the client can hold
/// heterogeneous headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    name: String,
    xml: String,
}

impl HeaderBlock {
    /// Serializes `value` as an element named `name`.
    pub fn new<T: Serialize>(name: impl Into<String>, value: &T) -> Result<Self, Error> {
        let name = name.into();
        let xml = quick_xml::se::to_string_with_root(&name, value)
            .map_err(|source| Error::Encode { source })?;
        Ok(Self { name, xml })
    }

    /// Element name of the header.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialized element.
    pub fn as_xml(&self) -> &str {
        &self.xml
    }
}

/// Namespace layout of an outgoing envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    /// Default namespace applied to the content of `<Header>` and `<Body>`.
    pub default: Option<String>,
    /// Additional `xmlns:{prefix}` declarations on `<Envelope>`.
    pub declarations: Vec<(String, String)>,
}

/// Decoded response body.
#[derive(Debug)]
pub enum Body<T> {
    /// The operation response.
    Content(T),
    /// A SOAP fault returned in place of the response.
    Fault(Fault),
}

/// Serializes `request` inside a complete SOAP envelope document.
///
/// The `<Header>` element is only written when `headers` is non-empty.
pub fn encode_request<M: Message>(
    namespaces: &Namespaces,
    headers: &[HeaderBlock],
    request: &M,
) -> Result<Vec<u8>, Error> {
    let body = quick_xml::se::to_string_with_root(M::ELEMENT, request)
        .map_err(|source| Error::Encode { source })?;

    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let envelope_tag = format!("{ENV_PREFIX}:Envelope");
    let mut envelope = BytesStart::new(envelope_tag.as_str());
    envelope.push_attribute((format!("xmlns:{ENV_PREFIX}").as_str(), SOAP_ENV_NS));
    for (prefix, uri) in &namespaces.declarations {
        envelope.push_attribute((format!("xmlns:{prefix}").as_str(), uri.as_str()));
    }
    writer.write_event(Event::Start(envelope)).map_err(xml_error)?;

    if !headers.is_empty() {
        let fragments: Vec<&str> = headers.iter().map(HeaderBlock::as_xml).collect();
        write_section(&mut writer, "Header", namespaces.default.as_deref(), &fragments)?;
    }
    write_section(&mut writer, "Body", namespaces.default.as_deref(), &[&body])?;

    writer
        .write_event(Event::End(BytesEnd::new(envelope_tag.as_str())))
        .map_err(xml_error)?;

    Ok(writer.into_inner())
}

fn write_section(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    default_namespace: Option<&str>,
    fragments: &[&str],
) -> Result<(), Error> {
    let tag = format!("{ENV_PREFIX}:{name}");
    let mut start = BytesStart::new(tag.as_str());
    if let Some(uri) = default_namespace {
        start.push_attribute(("xmlns", uri));
    }
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for fragment in fragments {
        writer.get_mut().extend_from_slice(fragment.as_bytes());
    }
    writer
        .write_event(Event::End(BytesEnd::new(tag.as_str())))
        .map_err(xml_error)?;
    Ok(())
}

fn xml_error(source: impl Into<quick_xml::Error>) -> Error {
    Error::Xml {
        source: source.into(),
    }
}

/// Decodes a response envelope, distinguishing a fault from content.
pub fn decode_response<T: DeserializeOwned>(xml: &str) -> Result<Body<T>, Error> {
    let (name, element) = body_child(xml)?;
    if name == "Fault" {
        let fault = Fault::parse(element).map_err(|source| Error::Xml { source })?;
        return Ok(Body::Fault(fault));
    }
    let element = protect_edge_whitespace(element)?;
    let content = quick_xml::de::from_str(&element).map_err(|source| Error::Decode { source })?;
    Ok(Body::Content(content))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Span {
    Start,
    End,
    Text,
    Other,
}

/// Escapes leading and trailing whitespace of text nodes as character
/// references.
///
/// Whitespace-only text is left alone unless it is the sole content of an
/// element, so indentation between tags is still dropped.
fn protect_edge_whitespace(xml: &str) -> Result<Cow<'_, str>, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut spans: Vec<(Span, Range<usize>)> = Vec::new();
    loop {
        let start = position(&reader)?;
        let span = match reader.read_event().map_err(|source| Error::Xml { source })? {
            Event::Eof => break,
            Event::Start(_) => Span::Start,
            Event::End(_) => Span::End,
            Event::Text(_) => Span::Text,
            _ => Span::Other,
        };
        spans.push((span, start..position(&reader)?));
    }

    let mut out = String::new();
    let mut copied = 0;
    for (i, (span, range)) in spans.iter().enumerate() {
        if *span != Span::Text {
            continue;
        }
        let text = &xml[range.clone()];
        let rest = text.trim_start_matches(is_xml_space);
        let core = rest.trim_end_matches(is_xml_space);
        if core.len() == text.len() {
            continue;
        }
        let leaf = i > 0
            && spans[i - 1].0 == Span::Start
            && spans.get(i + 1).is_some_and(|(next, _)| *next == Span::End);
        if core.is_empty() && !leaf {
            continue;
        }
        out.push_str(&xml[copied..range.start]);
        push_char_refs(&mut out, &text[..text.len() - rest.len()]);
        out.push_str(core);
        push_char_refs(&mut out, &rest[core.len()..]);
        copied = range.end;
    }

    if copied == 0 {
        return Ok(Cow::Borrowed(xml));
    }
    out.push_str(&xml[copied..]);
    Ok(Cow::Owned(out))
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

fn push_char_refs(out: &mut String, whitespace: &str) {
    for c in whitespace.chars() {
        out.push_str(&format!("&#{};", u32::from(c)));
    }
}

/// Locates the first element inside `<Envelope><Body>` and returns its local
/// name together with its full text, tags included.
fn body_child(xml: &str) -> Result<(String, &str), Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_envelope = false;
    let mut in_body = false;

    loop {
        let start = position(&reader)?;
        match reader.read_event().map_err(|source| Error::Xml { source })? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if in_body {
                    reader
                        .read_to_end(e.name())
                        .map_err(|source| Error::Xml { source })?;
                    let end = position(&reader)?;
                    return Ok((name, xml[start..end].trim()));
                }
                match (in_envelope, name.as_str()) {
                    (false, "Envelope") => in_envelope = true,
                    (false, other) => {
                        return Err(Error::Envelope {
                            message: format!("expected Envelope, found {other}"),
                        })
                    }
                    (true, "Body") => in_body = true,
                    // Header content is not surfaced to callers.
                    (true, _) => {
                        reader
                            .read_to_end(e.name())
                            .map_err(|source| Error::Xml { source })?;
                    }
                }
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if in_body {
                    let end = position(&reader)?;
                    return Ok((name, xml[start..end].trim()));
                }
                if !in_envelope {
                    return Err(Error::Envelope {
                        message: format!("expected Envelope, found {name}"),
                    });
                }
                if name == "Body" {
                    return Err(Error::Envelope {
                        message: "Body is empty".to_string(),
                    });
                }
            }
            Event::End(_) if in_body => {
                return Err(Error::Envelope {
                    message: "Body is empty".to_string(),
                });
            }
            Event::Eof => {
                return Err(Error::Envelope {
                    message: if in_envelope {
                        "missing Body".to_string()
                    } else {
                        "missing Envelope".to_string()
                    },
                });
            }
            _ => {}
        }
    }
}

fn position(reader: &Reader<&[u8]>) -> Result<usize, Error> {
    usize::try_from(reader.buffer_position()).map_err(|_| Error::Envelope {
        message: "document too large".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Echo {
        message: String,
        repeat: Vec<String>,
    }

    impl Message for Echo {
        const ELEMENT: &'static str = "echo";
    }

    #[derive(Debug, Deserialize)]
    struct EchoResponse {
        result: String,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct SessionHeader {
        session_id: String,
    }

    fn namespaces() -> Namespaces {
        Namespaces {
            default: Some("urn:example".to_string()),
            declarations: vec![("xsi".to_string(), XSI_NS.to_string())],
        }
    }

    fn echo() -> Echo {
        Echo {
            message: "a < b".to_string(),
            repeat: vec!["one".to_string(), "two".to_string()],
        }
    }

    #[test]
    fn test_encode_without_headers() {
        let bytes = encode_request(&namespaces(), &[], &echo()).unwrap();
        let xml = String::from_utf8(bytes).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/""#));
        assert!(xml.contains(r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#));
        assert!(xml.contains(r#"<soapenv:Body xmlns="urn:example"><echo>"#));
        assert!(xml.contains("<message>a &lt; b</message>"));
        assert!(xml.contains("<repeat>one</repeat><repeat>two</repeat>"));
        assert!(!xml.contains("Header"));
        assert!(xml.ends_with("</soapenv:Envelope>"));
    }

    #[test]
    fn test_encode_with_header() {
        let header = HeaderBlock::new(
            "SessionHeader",
            &SessionHeader {
                session_id: "00Dxx!token".to_string(),
            },
        )
        .unwrap();
        assert_eq!(header.name(), "SessionHeader");

        let bytes = encode_request(&namespaces(), &[header], &echo()).unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.contains(
            r#"<soapenv:Header xmlns="urn:example"><SessionHeader><sessionId>00Dxx!token</sessionId></SessionHeader></soapenv:Header>"#
        ));
        let header_at = xml.find("<soapenv:Header").unwrap();
        let body_at = xml.find("<soapenv:Body").unwrap();
        assert!(header_at < body_at);
    }

    #[test]
    fn test_decode_content() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="urn:example">
  <soapenv:Header><LimitInfoHeader><limitInfo><current>1</current></limitInfo></LimitInfoHeader></soapenv:Header>
  <soapenv:Body>
    <echoResponse><result>hello</result></echoResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;
        match decode_response::<EchoResponse>(xml).unwrap() {
            Body::Content(response) => assert_eq!(response.result, "hello"),
            Body::Fault(fault) => panic!("unexpected fault: {fault}"),
        }
    }

    #[test]
    fn test_decode_fault() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><soapenv:Fault><faultcode>soapenv:Client</faultcode><faultstring>Bad request</faultstring></soapenv:Fault></soapenv:Body></soapenv:Envelope>"#;
        match decode_response::<EchoResponse>(xml).unwrap() {
            Body::Fault(fault) => {
                assert_eq!(fault.code, "soapenv:Client");
                assert_eq!(fault.string, "Bad request");
            }
            Body::Content(_) => panic!("expected a fault"),
        }
    }

    #[test]
    fn test_decode_keeps_edge_whitespace() {
        #[derive(Debug, Deserialize)]
        struct Names {
            name: String,
            blank: String,
            plain: String,
        }

        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body>
    <names>
      <name>  Acme  Corp </name>
      <blank>   </blank>
      <plain>a &amp; b</plain>
    </names>
  </soapenv:Body></soapenv:Envelope>"#;
        match decode_response::<Names>(xml).unwrap() {
            Body::Content(names) => {
                assert_eq!(names.name, "  Acme  Corp ");
                assert_eq!(names.blank, "   ");
                assert_eq!(names.plain, "a & b");
            }
            Body::Fault(fault) => panic!("unexpected fault: {fault}"),
        }
    }

    #[test]
    fn test_protect_edge_whitespace_leaves_indentation() {
        let xml = "<a>\n  <b>x</b>\n</a>";
        assert!(matches!(protect_edge_whitespace(xml).unwrap(), Cow::Borrowed(_)));
        assert_eq!(
            protect_edge_whitespace("<a><b> x\t</b></a>").unwrap(),
            "<a><b>&#32;x&#9;</b></a>"
        );
    }

    #[test]
    fn test_decode_unprefixed_fault() {
        let xml = r#"<Envelope xmlns="http://schemas.xmlsoap.org/soap/envelope/"><Body><Fault><faultcode>Server</faultcode><faultstring>Internal error</faultstring></Fault></Body></Envelope>"#;
        match decode_response::<EchoResponse>(xml).unwrap() {
            Body::Fault(fault) => {
                assert_eq!(fault.code, "Server");
                assert_eq!(fault.string, "Internal error");
            }
            Body::Content(_) => panic!("expected a fault"),
        }
    }

    #[test]
    fn test_decode_fault_with_other_prefix() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><soap:Fault><faultcode>soap:Client</faultcode><faultstring>No such operation</faultstring></soap:Fault></soap:Body></soap:Envelope>"#;
        match decode_response::<EchoResponse>(xml).unwrap() {
            Body::Fault(fault) => {
                assert_eq!(fault.code, "soap:Client");
                assert_eq!(fault.string, "No such operation");
            }
            Body::Content(_) => panic!("expected a fault"),
        }
    }

    #[test]
    fn test_decode_empty_element_response() {
        #[derive(Debug, Deserialize)]
        struct Nothing {}

        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><logoutResponse/></soapenv:Body></soapenv:Envelope>"#;
        assert!(matches!(
            decode_response::<Nothing>(xml).unwrap(),
            Body::Content(Nothing {})
        ));
    }

    #[test]
    fn test_decode_rejects_non_envelope() {
        let result = decode_response::<EchoResponse>("<html><body>Service unavailable</body></html>");
        assert!(matches!(result, Err(Error::Envelope { .. })));
    }

    #[test]
    fn test_decode_rejects_empty_body() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body></soapenv:Body></soapenv:Envelope>"#;
        let result = decode_response::<EchoResponse>(xml);
        assert!(matches!(result, Err(Error::Envelope { .. })));

        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body/></soapenv:Envelope>"#;
        let result = decode_response::<EchoResponse>(xml);
        assert!(matches!(result, Err(Error::Envelope { .. })));
    }

    #[test]
    fn test_decode_missing_body() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"></soapenv:Envelope>"#;
        let result = decode_response::<EchoResponse>(xml);
        assert!(matches!(result, Err(Error::Envelope { message }) if message == "missing Body"));
    }
}
