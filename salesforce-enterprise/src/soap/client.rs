use super::envelope::{self, Body, HeaderBlock, Message, Namespaces};
use super::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Content type of SOAP 1.1 requests.
const SOAP_CONTENT_TYPE: &str = "text/xml; charset=\"utf-8\"";

/// Header carrying the SOAP action of a SOAP 1.1 request.
const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// Default `User-Agent` sent with every request.
const DEFAULT_USER_AGENT: &str = concat!("salesforce-enterprise/", env!("CARGO_PKG_VERSION"));

/// HTTP basic authentication credentials.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// User name sent in the `Authorization` header.
    pub login: String,
    /// Password sent in the `Authorization` header.
    pub password: String,
}

/// Transport configuration, loadable from JSON.
///
/// # Example
///
/// ```
/// use salesforce_enterprise::soap::Config;
///
/// let config: Config = serde_json::from_str(r#"{
///     "endpoint": "https://login.salesforce.com/services/Soap/c/65.0",
///     "namespace": "urn:enterprise.soap.sforce.com",
///     "request_timeout_secs": 60
/// }"#).unwrap();
/// assert!(!config.insecure_skip_verify);
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// SOAP endpoint URL.
    pub endpoint: String,
    /// Accept invalid TLS certificates. Only meant for test servers.
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// Optional HTTP basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    /// Target namespace, declared as the default namespace of Header and Body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Extra prefix/URI declarations placed on the Envelope.
    #[serde(default)]
    pub namespace_declarations: Vec<(String, String)>,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// `User-Agent` header override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_connect_timeout_secs() -> u64 {
    crate::DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_request_timeout_secs() -> u64 {
    crate::DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Config {
    /// Creates a configuration for `endpoint` with default settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            insecure_skip_verify: false,
            basic_auth: None,
            namespace: None,
            namespace_declarations: Vec::new(),
            connect_timeout_secs: crate::DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: crate::DEFAULT_REQUEST_TIMEOUT_SECS,
            user_agent: None,
        }
    }
}

/// Source for loading the transport configuration.
#[derive(Debug, Clone)]
enum ConfigFrom {
    Path(PathBuf),
    Value(Config),
}

/// SOAP 1.1 client bound to a single endpoint.
///
/// The client is cheap to clone; clones share the endpoint and header state,
/// so a session header installed after login is seen by every clone.
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: reqwest::Client,
    endpoint: Arc<RwLock<Url>>,
    basic_auth: Option<BasicAuth>,
    namespaces: Namespaces,
    headers: Arc<RwLock<Vec<HeaderBlock>>>,
}

impl SoapClient {
    /// Creates a client with default timeouts and no namespace layout.
    ///
    /// # Errors
    ///
    /// Returns an error if `endpoint` is not a valid URL or the HTTP client
    /// cannot be constructed.
    pub fn new(
        endpoint: &str,
        insecure_skip_verify: bool,
        basic_auth: Option<BasicAuth>,
    ) -> Result<Self, Error> {
        let mut config = Config::new(endpoint);
        config.insecure_skip_verify = insecure_skip_verify;
        config.basic_auth = basic_auth;
        Self::from_config(config)
    }

    /// Creates a client from a complete configuration.
    pub fn from_config(config: Config) -> Result<Self, Error> {
        let endpoint = Url::parse(&config.endpoint).map_err(|source| Error::ParseUrl { source })?;

        // Every call opens a fresh connection.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .pool_max_idle_per_host(0)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|source| Error::HttpClient { source })?;

        Ok(Self {
            http,
            endpoint: Arc::new(RwLock::new(endpoint)),
            basic_auth: config.basic_auth,
            namespaces: Namespaces {
                default: config.namespace,
                declarations: config.namespace_declarations,
            },
            headers: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Returns the current endpoint.
    pub fn endpoint(&self) -> Result<Url, Error> {
        let endpoint = self.endpoint.read().map_err(|_| Error::LockError)?;
        Ok(endpoint.clone())
    }

    /// Points the client at a different endpoint, e.g. the `serverUrl`
    /// returned by a login.
    pub fn set_endpoint(&self, endpoint: &str) -> Result<(), Error> {
        let url = Url::parse(endpoint).map_err(|source| Error::ParseUrl { source })?;
        let mut current = self.endpoint.write().map_err(|_| Error::LockError)?;
        *current = url;
        Ok(())
    }

    /// Installs a header block, replacing any header with the same name.
    pub fn set_header(&self, header: HeaderBlock) -> Result<(), Error> {
        let mut headers = self.headers.write().map_err(|_| Error::LockError)?;
        match headers.iter_mut().find(|h| h.name() == header.name()) {
            Some(existing) => *existing = header,
            None => headers.push(header),
        }
        Ok(())
    }

    /// Removes the header block named `name`. Returns whether one was present.
    pub fn clear_header(&self, name: &str) -> Result<bool, Error> {
        let mut headers = self.headers.write().map_err(|_| Error::LockError)?;
        let before = headers.len();
        headers.retain(|h| h.name() != name);
        Ok(headers.len() != before)
    }

    /// Removes every header block.
    pub fn clear_headers(&self) -> Result<(), Error> {
        self.headers.write().map_err(|_| Error::LockError)?.clear();
        Ok(())
    }

    /// Returns a copy of the header blocks currently installed.
    pub fn headers(&self) -> Result<Vec<HeaderBlock>, Error> {
        let headers = self.headers.read().map_err(|_| Error::LockError)?;
        Ok(headers.clone())
    }

    /// Sends `request` and decodes the response.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request cannot be serialized ([`Error::Encode`])
    /// - The HTTP exchange fails ([`Error::Request`])
    /// - The response body is empty ([`Error::EmptyResponse`])
    /// - The server returns a SOAP fault ([`Error::Fault`])
    /// - The response is not a SOAP envelope and the status is not a
    ///   success ([`Error::UnexpectedStatus`])
    /// - The response content cannot be decoded ([`Error::Decode`])
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all, fields(element = M::ELEMENT)))]
    pub async fn call<M, R>(&self, soap_action: &str, request: &M) -> Result<R, Error>
    where
        M: Message,
        R: DeserializeOwned,
    {
        let payload = {
            let headers = self.headers.read().map_err(|_| Error::LockError)?;
            envelope::encode_request(&self.namespaces, &headers, request)?
        };
        let endpoint = self.endpoint()?;

        debug!(
            element = M::ELEMENT,
            endpoint = %endpoint,
            bytes = payload.len(),
            "sending SOAP request"
        );

        let mut builder = self
            .http
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header(SOAP_ACTION_HEADER, soap_action_value(soap_action))
            .header(reqwest::header::CONNECTION, "close")
            .body(payload);
        if let Some(auth) = &self.basic_auth {
            builder = builder.basic_auth(&auth.login, Some(&auth.password));
        }

        let response = builder
            .send()
            .await
            .map_err(|source| Error::Request { source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| Error::Request { source })?;

        debug!(status = %status, bytes = body.len(), "received SOAP response");

        if body.trim().is_empty() {
            warn!(status = %status, "empty SOAP response");
            return Err(Error::EmptyResponse { status });
        }

        match envelope::decode_response(&body) {
            Ok(Body::Content(content)) => Ok(content),
            Ok(Body::Fault(fault)) => {
                warn!(
                    code = %fault.code,
                    exception = fault.exception_code(),
                    "SOAP fault"
                );
                Err(Error::Fault(Box::new(fault)))
            }
            Err(Error::Envelope { .. } | Error::Xml { .. }) if !status.is_success() => {
                Err(Error::UnexpectedStatus { status, body })
            }
            Err(e) => Err(e),
        }
    }
}

/// SOAP 1.1 requires the header to be present; an empty action is `""`.
fn soap_action_value(soap_action: &str) -> String {
    if soap_action.is_empty() {
        "\"\"".to_string()
    } else {
        soap_action.to_string()
    }
}

/// Builder for constructing a [`SoapClient`].
///
/// # Examples
///
/// ```no_run
/// use salesforce_enterprise::soap::{self, BasicAuth};
///
/// # fn main() -> Result<(), salesforce_enterprise::soap::Error> {
/// let client = soap::Builder::new()
///     .endpoint("https://example.com/soap")
///     .basic_auth(BasicAuth {
///         login: "user".to_string(),
///         password: "secret".to_string(),
///     })
///     .request_timeout_secs(30)
///     .build()?;
/// # Ok(())
/// # }
/// ```
///
/// ## Loading configuration from a file
///
/// ```no_run
/// use salesforce_enterprise::soap;
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), salesforce_enterprise::soap::Error> {
/// let client = soap::Builder::new()
///     .config_path(PathBuf::from("soap.json"))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Builder {
    config_from: Option<ConfigFrom>,
    endpoint: Option<String>,
    insecure_skip_verify: Option<bool>,
    basic_auth: Option<BasicAuth>,
    namespace: Option<String>,
    namespace_declarations: Vec<(String, String)>,
    connect_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

impl Builder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the base configuration from a JSON file.
    pub fn config_path(mut self, path: PathBuf) -> Self {
        self.config_from = Some(ConfigFrom::Path(path));
        self
    }

    /// Uses `config` as the base configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config_from = Some(ConfigFrom::Value(config));
        self
    }

    /// Sets the SOAP endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Accepts invalid TLS certificates when `true`.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = Some(skip);
        self
    }

    /// Sends HTTP basic authentication with every request.
    pub fn basic_auth(mut self, auth: BasicAuth) -> Self {
        self.basic_auth = Some(auth);
        self
    }

    /// Sets the target namespace used as default namespace for Header and Body.
    pub fn namespace(mut self, uri: impl Into<String>) -> Self {
        self.namespace = Some(uri.into());
        self
    }

    /// Declares `xmlns:{prefix}="{uri}"` on the Envelope.
    pub fn declare_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespace_declarations.push((prefix.into(), uri.into()));
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    /// Sets the whole-request timeout.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    /// Overrides the `User-Agent` header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Resolves the final configuration. Explicit builder values override
    /// values loaded from a file.
    fn resolve(self) -> Result<Config, Error> {
        let mut config = match self.config_from {
            Some(ConfigFrom::Value(config)) => Some(config),
            Some(ConfigFrom::Path(path)) => {
                let contents = fs::read_to_string(&path)
                    .map_err(|source| Error::ReadConfig { path, source })?;
                Some(
                    serde_json::from_str::<Config>(&contents)
                        .map_err(|source| Error::ParseConfig { source })?,
                )
            }
            None => None,
        };

        if let Some(endpoint) = self.endpoint {
            match config.as_mut() {
                Some(config) => config.endpoint = endpoint,
                None => config = Some(Config::new(endpoint)),
            }
        }
        let mut config =
            config.ok_or_else(|| Error::MissingRequiredAttribute("endpoint".to_string()))?;

        if let Some(skip) = self.insecure_skip_verify {
            config.insecure_skip_verify = skip;
        }
        if self.basic_auth.is_some() {
            config.basic_auth = self.basic_auth;
        }
        if self.namespace.is_some() {
            config.namespace = self.namespace;
        }
        config.namespace_declarations.extend(self.namespace_declarations);
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if self.user_agent.is_some() {
            config.user_agent = self.user_agent;
        }

        Ok(config)
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No endpoint was configured ([`Error::MissingRequiredAttribute`])
    /// - The config file cannot be read or parsed ([`Error::ReadConfig`], [`Error::ParseConfig`])
    /// - The endpoint is not a valid URL ([`Error::ParseUrl`])
    pub fn build(self) -> Result<SoapClient, Error> {
        SoapClient::from_config(self.resolve()?)
    }
}
