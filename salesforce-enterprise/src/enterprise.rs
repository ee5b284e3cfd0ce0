//! Salesforce Enterprise SOAP API.
//!
//! [`Soap`] exposes one async method per supported WSDL operation. Requests
//! and responses live in [`types`], header blocks in [`headers`], and records
//! are carried as generic [`SObject`]s.
//!
//! # Examples
//!
//! ```no_run
//! use salesforce_enterprise::enterprise::{self, types::Query, Soap};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let login_endpoint = enterprise::endpoint("https://login.salesforce.com", "65.0");
//! let soap = Soap::new(&login_endpoint, false, None)?;
//! soap.authenticate("user@example.com", "passwordTOKEN").await?;
//!
//! let response = soap
//!     .query(&Query {
//!         query_string: "SELECT Id, Name FROM Account LIMIT 10".to_string(),
//!     })
//!     .await?;
//! for account in &response.result.records {
//!     println!("{:?} {:?}", account.id(), account.get_str("Name"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod headers;
mod service;
mod sobject;
pub mod types;

pub use headers::SoapHeader;
pub use service::Soap;
pub use sobject::{FieldValue, SObject};
pub use types::{Operation, QueryResult, RecordError};

/// Target namespace of the Enterprise WSDL.
pub const ENTERPRISE_NS: &str = "urn:enterprise.soap.sforce.com";

/// Namespace of the concrete sObject types.
pub const SOBJECT_NS: &str = "urn:sobject.enterprise.soap.sforce.com";

/// Prefix bound to [`SOBJECT_NS`] on every envelope sent by [`Soap`].
pub const SOBJECT_PREFIX: &str = "ens";

/// Builds the Enterprise SOAP endpoint of an instance.
///
/// ```
/// use salesforce_enterprise::enterprise;
///
/// assert_eq!(
///     enterprise::endpoint("https://acme.my.salesforce.com/", "65.0"),
///     "https://acme.my.salesforce.com/services/Soap/c/65.0"
/// );
/// ```
pub fn endpoint(instance_url: &str, api_version: &str) -> String {
    format!(
        "{}/services/Soap/c/{}",
        instance_url.trim_end_matches('/'),
        api_version
    )
}
