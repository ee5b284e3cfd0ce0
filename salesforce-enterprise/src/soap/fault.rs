//! SOAP 1.1 faults and the Salesforce exception taxonomy carried in their detail.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt;

/// Salesforce fault type, taken from the element name inside `<detail>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    ApiFault,
    ApiQueryFault,
    InvalidFieldFault,
    InvalidIdFault,
    InvalidNewPasswordFault,
    InvalidOldPasswordFault,
    InvalidQueryLocatorFault,
    InvalidSObjectFault,
    LoginFault,
    MalformedQueryFault,
    MalformedSearchFault,
    UnexpectedErrorFault,
    /// A fault element this crate does not know by name.
    Other(String),
}

impl FaultKind {
    /// Maps a detail element local name to its fault kind.
    pub fn from_element(name: &str) -> Self {
        match name {
            "ApiFault" => Self::ApiFault,
            "ApiQueryFault" => Self::ApiQueryFault,
            "InvalidFieldFault" => Self::InvalidFieldFault,
            "InvalidIdFault" => Self::InvalidIdFault,
            "InvalidNewPasswordFault" => Self::InvalidNewPasswordFault,
            "InvalidOldPasswordFault" => Self::InvalidOldPasswordFault,
            "InvalidQueryLocatorFault" => Self::InvalidQueryLocatorFault,
            "InvalidSObjectFault" => Self::InvalidSObjectFault,
            "LoginFault" => Self::LoginFault,
            "MalformedQueryFault" => Self::MalformedQueryFault,
            "MalformedSearchFault" => Self::MalformedSearchFault,
            "UnexpectedErrorFault" => Self::UnexpectedErrorFault,
            other => Self::Other(other.to_string()),
        }
    }

    /// Element name of this fault kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ApiFault => "ApiFault",
            Self::ApiQueryFault => "ApiQueryFault",
            Self::InvalidFieldFault => "InvalidFieldFault",
            Self::InvalidIdFault => "InvalidIdFault",
            Self::InvalidNewPasswordFault => "InvalidNewPasswordFault",
            Self::InvalidOldPasswordFault => "InvalidOldPasswordFault",
            Self::InvalidQueryLocatorFault => "InvalidQueryLocatorFault",
            Self::InvalidSObjectFault => "InvalidSObjectFault",
            Self::LoginFault => "LoginFault",
            Self::MalformedQueryFault => "MalformedQueryFault",
            Self::MalformedSearchFault => "MalformedSearchFault",
            Self::UnexpectedErrorFault => "UnexpectedErrorFault",
            Self::Other(name) => name,
        }
    }
}

/// Structured fault detail as documented for the Salesforce SOAP API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFault {
    /// Which fault element was returned.
    pub kind: FaultKind,
    /// Exception code, e.g. `INVALID_SESSION_ID` or `INVALID_LOGIN`.
    pub exception_code: Option<String>,
    /// Human-readable exception message.
    pub exception_message: Option<String>,
    /// Row of the offending token (query and search faults only).
    pub row: Option<i32>,
    /// Column of the offending token (query and search faults only).
    pub column: Option<i32>,
}

/// A SOAP 1.1 `<Fault>` returned in place of the response content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fault {
    /// `faultcode`, e.g. `sf:INVALID_LOGIN` or `soapenv:Client`.
    pub code: String,
    /// `faultstring`.
    pub string: String,
    /// `faultactor`, rarely present.
    pub actor: Option<String>,
    /// Parsed `<detail>` content, if the server sent one.
    pub detail: Option<ApiFault>,
}

impl Fault {
    /// Exception code from the detail, falling back to the unprefixed fault code.
    pub fn exception_code(&self) -> &str {
        if let Some(code) = self
            .detail
            .as_ref()
            .and_then(|detail| detail.exception_code.as_deref())
        {
            return code;
        }
        self.code
            .split_once(':')
            .map(|(_, code)| code)
            .unwrap_or(&self.code)
    }

    /// The fault kind from the detail, if any.
    pub fn kind(&self) -> Option<&FaultKind> {
        self.detail.as_ref().map(|detail| &detail.kind)
    }

    /// Returns true if the session id was rejected and a new login is required.
    pub fn is_invalid_session(&self) -> bool {
        self.exception_code() == "INVALID_SESSION_ID"
    }

    /// Parses a `<Fault>` element. `xml` must start at the fault element itself.
    pub(crate) fn parse(xml: &str) -> Result<Self, quick_xml::Error> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut fault = Fault::default();
        let mut path: Vec<String> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    open_element(&mut fault, &path, &name);
                    path.push(name);
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    open_element(&mut fault, &path, &name);
                }
                Event::End(_) => {
                    path.pop();
                }
                Event::Text(e) => {
                    let text = e.unescape()?;
                    assign_text(&mut fault, &path, text.into_owned());
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    assign_text(&mut fault, &path, text);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(fault)
    }
}

fn open_element(fault: &mut Fault, path: &[String], name: &str) {
    // Fault > detail > {kind}
    if path.len() == 2 && path[1] == "detail" && fault.detail.is_none() {
        fault.detail = Some(ApiFault {
            kind: FaultKind::from_element(name),
            exception_code: None,
            exception_message: None,
            row: None,
            column: None,
        });
    }
}

fn assign_text(fault: &mut Fault, path: &[String], text: String) {
    match path {
        [_, field] => match field.as_str() {
            "faultcode" => fault.code = text,
            "faultstring" => fault.string = text,
            "faultactor" => fault.actor = Some(text),
            _ => {}
        },
        [_, detail, _, field] if detail == "detail" => {
            let Some(api_fault) = fault.detail.as_mut() else {
                return;
            };
            match field.as_str() {
                "exceptionCode" => api_fault.exception_code = Some(text),
                "exceptionMessage" => api_fault.exception_message = Some(text),
                "row" => api_fault.row = text.trim().parse().ok(),
                "column" => api_fault.column = text.trim().parse().ok(),
                _ => {}
            }
        }
        _ => {}
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.string.is_empty() {
            write!(f, "SOAP fault {}", self.code)
        } else {
            f.write_str(&self.string)
        }
    }
}

impl std::error::Error for Fault {}
