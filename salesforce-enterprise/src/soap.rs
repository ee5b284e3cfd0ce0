//! Generic SOAP 1.1 transport.
//!
//! This module knows nothing about Salesforce beyond its fault taxonomy: it
//! wraps a request in an envelope, POSTs it, and decodes the response envelope
//! into either content or a [`Fault`].
//!
//! # Example
//!
//! ```no_run
//! use salesforce_enterprise::soap::{self, Message};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct GetServerTimestamp {}
//!
//! impl Message for GetServerTimestamp {
//!     const ELEMENT: &'static str = "getServerTimestamp";
//! }
//!
//! #[derive(Deserialize)]
//! struct GetServerTimestampResponse {
//!     result: Timestamp,
//! }
//!
//! #[derive(Deserialize)]
//! struct Timestamp {
//!     timestamp: String,
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = soap::Builder::new()
//!     .endpoint("https://your-instance.my.salesforce.com/services/Soap/c/65.0")
//!     .namespace("urn:enterprise.soap.sforce.com")
//!     .build()?;
//!
//! let response: GetServerTimestampResponse =
//!     client.call("", &GetServerTimestamp {}).await?;
//! println!("{}", response.result.timestamp);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod envelope;
mod fault;

pub use client::{BasicAuth, Builder, Config, SoapClient};
pub use envelope::{Body, HeaderBlock, Message, Namespaces};
pub use fault::{ApiFault, Fault, FaultKind};

/// Errors that can occur while exchanging SOAP messages.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read the transport configuration file.
    #[error("Failed to read SOAP config file at {path}: {source}")]
    ReadConfig {
        /// Path to the configuration file that failed to read.
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to parse the transport configuration JSON.
    #[error("Failed to parse SOAP config JSON: {source}")]
    ParseConfig {
        #[source]
        source: serde_json::Error,
    },
    /// Required builder parameter was not provided.
    #[error("Missing required attribute: {}", _0)]
    MissingRequiredAttribute(String),
    /// The endpoint is not a valid absolute URL.
    #[error("Invalid endpoint URL: {source}")]
    ParseUrl {
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {source}")]
    HttpClient {
        #[source]
        source: reqwest::Error,
    },
    /// A request body or header could not be serialized.
    #[error("Failed to encode SOAP message: {source}")]
    Encode {
        #[source]
        source: quick_xml::se::SeError,
    },
    /// The HTTP exchange failed before a response body was read.
    #[error("HTTP request failed: {source}")]
    Request {
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with an empty body.
    #[error("Empty SOAP response (HTTP {status})")]
    EmptyResponse {
        /// HTTP status of the empty response.
        status: reqwest::StatusCode,
    },
    /// The server answered with a non-success status and no SOAP envelope.
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status of the response.
        status: reqwest::StatusCode,
        /// Raw response body.
        body: String,
    },
    /// Malformed XML in the response.
    #[error("XML error: {source}")]
    Xml {
        #[source]
        source: quick_xml::Error,
    },
    /// The response is well-formed XML but not a usable SOAP envelope.
    #[error("Invalid SOAP envelope: {message}")]
    Envelope {
        /// What was wrong with the envelope.
        message: String,
    },
    /// The response content did not match the expected response type.
    #[error("Failed to decode SOAP response: {source}")]
    Decode {
        #[source]
        source: quick_xml::de::DeError,
    },
    /// The server returned a SOAP fault.
    #[error("SOAP fault: {0}")]
    Fault(Box<Fault>),
    /// Failed to acquire lock on the client state.
    #[error("Failed to acquire lock on SOAP client state")]
    LockError,
}

impl Error {
    /// Returns the SOAP fault if this error carries one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Fault(fault) => Some(fault.as_ref()),
            _ => None,
        }
    }
}
