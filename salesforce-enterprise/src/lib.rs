//! Unofficial Rust SDK for the Salesforce Enterprise SOAP API.
//!
//! The crate is split in three layers:
//!
//! - [`soap`]: a generic SOAP 1.1 transport (envelopes, faults, HTTP).
//! - [`enterprise`]: the Enterprise WSDL operations, messages and headers.
//! - [`auth`]: session acquisition through OAuth2 or the SOAP `login` call.
//!
//! # Examples
//!
//! ```no_run
//! use salesforce_enterprise::auth::{self, AuthFlow, Credentials};
//! use salesforce_enterprise::enterprise::types::GetServerTimestamp;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = auth::Builder::new()
//!     .credentials(Credentials {
//!         username: Some("user@example.com".to_string()),
//!         password: Some("secret".to_string()),
//!         security_token: Some("TOKEN".to_string()),
//!         instance_url: salesforce_enterprise::DEFAULT_LOGIN_URL.to_string(),
//!         ..Default::default()
//!     })
//!     .auth_flow(AuthFlow::SoapLogin)
//!     .build()?
//!     .connect()
//!     .await?;
//!
//! let soap = session.soap()?;
//! let now = soap.get_server_timestamp(&GetServerTimestamp {}).await?;
//! println!("server time: {}", now.result.timestamp);
//! # Ok(())
//! # }
//! ```

/// Default Salesforce API version (Winter '26 - API version 65.0).
pub const DEFAULT_API_VERSION: &str = "65.0";

/// Production login host.
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";

/// Default connection timeout for SOAP requests (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default request timeout for SOAP requests (120 seconds).
///
/// Large queries and describe calls can take a while to produce a response.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Default connection timeout for OAuth2 authentication requests (15 seconds).
pub const DEFAULT_AUTH_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Default request timeout for OAuth2 authentication requests (30 seconds).
pub const DEFAULT_AUTH_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Session acquisition via OAuth2 or SOAP login.
pub mod auth;

/// Salesforce Enterprise SOAP API operations.
pub mod enterprise;

/// Generic SOAP 1.1 transport.
pub mod soap;
