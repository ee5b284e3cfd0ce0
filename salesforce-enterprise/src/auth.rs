//! Session acquisition for the Enterprise SOAP API.
//!
//! A [`Session`] is a session id together with the SOAP endpoint it is valid
//! for. It can be obtained through one of the OAuth2 flows of a connected app
//! or through the SOAP `login` operation itself.

use crate::enterprise::{self, headers::SessionHeader, types::Login, Soap};
use crate::soap;
use chrono::{DateTime, TimeDelta, Utc};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, StandardRevocableToken, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Default OAuth2 authorization endpoint path.
const DEFAULT_AUTHORIZE_PATH: &str = "/services/oauth2/authorize";

/// Default OAuth2 token endpoint path.
const DEFAULT_TOKEN_PATH: &str = "/services/oauth2/token";

/// Session lifetime assumed when the server does not report one (Salesforce
/// default of 2 hours).
const DEFAULT_SESSION_SECONDS: i64 = 7200;

/// Refresh sessions 5 minutes before they expire.
pub const SESSION_REFRESH_BUFFER_SECONDS: u64 = 300;

/// Non-standard fields of a Salesforce token response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesforceTokenFields {
    /// Instance the token was issued for, e.g. `https://acme.my.salesforce.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_url: Option<String>,
}

impl oauth2::ExtraTokenFields for SalesforceTokenFields {}

/// Salesforce OAuth2 token response.
pub type SalesforceTokenResponse =
    oauth2::StandardTokenResponse<SalesforceTokenFields, BasicTokenType>;

type OAuthClient = oauth2::Client<
    BasicErrorResponse,
    SalesforceTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Errors that can occur while obtaining a session.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read the credentials file from disk.
    #[error("Failed to read credentials file at {path}: {source}")]
    ReadCredentials {
        /// Path to the credentials file that failed to read.
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to parse credentials JSON.
    #[error("Failed to parse credentials JSON: {source}")]
    ParseCredentials {
        #[source]
        source: serde_json::Error,
    },
    /// Invalid URL format in credentials or login response.
    #[error("Invalid URL format: {source}")]
    ParseUrl {
        #[source]
        source: url::ParseError,
    },
    /// OAuth2 token exchange failed.
    #[error("OAuth2 token exchange failed: {0:?}")]
    TokenExchange(Box<dyn std::error::Error + Send + Sync>),
    /// The SOAP `login` call or session setup failed.
    #[error("SOAP login failed: {source}")]
    Soap {
        #[source]
        source: soap::Error,
    },
    /// Required builder parameter was not provided.
    #[error("Missing required attribute: {}", _0)]
    MissingRequiredAttribute(String),
    /// Credentials are incomplete for the selected flow.
    #[error("Invalid credentials for {flow}: {message}")]
    InvalidCredentials {
        /// The authentication flow that was attempted.
        flow: String,
        /// Description of what is missing.
        message: String,
    },
    /// Session expiry time calculation overflowed.
    #[error("Session expiry time calculation overflow")]
    SessionExpiryOverflow,
    /// Expiry threshold calculation overflowed.
    #[error("Time threshold calculation overflow")]
    TimeThresholdOverflow,
}

impl From<soap::Error> for Error {
    fn from(source: soap::Error) -> Self {
        Self::Soap { source }
    }
}

/// How a session is obtained.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlow {
    /// OAuth2 client credentials flow of a connected app. Requires
    /// `client_id` and `client_secret`.
    #[default]
    ClientCredentials,
    /// OAuth2 username-password flow. Requires `client_id`,
    /// `client_secret`, `username` and `password`.
    UsernamePassword,
    /// The SOAP `login` operation. Requires `username` and `password`.
    SoapLogin,
}

/// Salesforce credentials.
///
/// # Examples
///
/// ```
/// use salesforce_enterprise::auth::Credentials;
///
/// let credentials: Credentials = serde_json::from_str(r#"{
///     "username": "user@example.com",
///     "password": "secret",
///     "security_token": "TOKEN",
///     "instance_url": "https://login.salesforce.com"
/// }"#).unwrap();
/// assert!(credentials.client_id.is_none());
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Credentials {
    /// Connected app consumer key (OAuth2 flows only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Connected app consumer secret (OAuth2 flows only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Appended to the password when the org requires a security token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_token: Option<String>,
    /// Instance or login URL, e.g. `https://login.salesforce.com`.
    pub instance_url: String,
}

impl Credentials {
    /// Password with the security token appended, as Salesforce expects it.
    fn full_password(&self) -> Option<String> {
        self.password.as_ref().map(|password| {
            format!(
                "{}{}",
                password,
                self.security_token.as_deref().unwrap_or_default()
            )
        })
    }
}

/// Source for loading credentials.
#[derive(Debug, Clone)]
enum CredentialsFrom {
    Path(PathBuf),
    Value(Credentials),
}

/// An authenticated Salesforce session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Base URL of the org instance.
    pub instance_url: String,
    /// Enterprise SOAP endpoint for this session.
    pub server_url: String,
    /// Session id, sent in the `SessionHeader`.
    pub session_id: String,
    /// Id of the authenticated user, when the flow reports it.
    pub user_id: Option<String>,
    /// Point in time after which the session is no longer valid.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns true if the session expires within `buffer_seconds`.
    pub fn is_expired(&self, buffer_seconds: u64) -> Result<bool, Error> {
        let buffer = i64::try_from(buffer_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or(Error::TimeThresholdOverflow)?;
        let threshold = Utc::now()
            .checked_add_signed(buffer)
            .ok_or(Error::TimeThresholdOverflow)?;
        Ok(threshold >= self.expires_at)
    }

    /// Creates an Enterprise client bound to this session.
    ///
    /// # Errors
    ///
    /// Returns an error if `server_url` is invalid.
    pub fn soap(&self) -> Result<Soap, soap::Error> {
        let soap = Soap::new(&self.server_url, false, None)?;
        soap.set_session_header(SessionHeader {
            session_id: self.session_id.clone(),
        })?;
        Ok(soap)
    }
}

fn expires_after(seconds: i64) -> Result<DateTime<Utc>, Error> {
    TimeDelta::try_seconds(seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or(Error::SessionExpiryOverflow)
}

/// Obtains sessions for one set of credentials.
///
/// Created through [`Builder`]. [`connect`](Self::connect) can be called
/// again whenever a session has expired or was invalidated.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credentials_from: CredentialsFrom,
    auth_flow: AuthFlow,
    api_version: String,
}

impl Authenticator {
    /// Loads credentials from the configured source.
    fn load_credentials(&self) -> Result<Credentials, Error> {
        match &self.credentials_from {
            CredentialsFrom::Value(creds) => Ok(creds.clone()),
            CredentialsFrom::Path(path) => {
                let credentials_string =
                    fs::read_to_string(path).map_err(|e| Error::ReadCredentials {
                        path: path.clone(),
                        source: e,
                    })?;
                serde_json::from_str(&credentials_string)
                    .map_err(|e| Error::ParseCredentials { source: e })
            }
        }
    }

    /// Validates that credentials contain the fields the selected flow needs.
    fn validate_credentials(&self, credentials: &Credentials) -> Result<(), Error> {
        let required: &[(&str, bool)] = match self.auth_flow {
            AuthFlow::ClientCredentials => &[
                ("client_id", credentials.client_id.is_some()),
                ("client_secret", credentials.client_secret.is_some()),
            ],
            AuthFlow::UsernamePassword => &[
                ("client_id", credentials.client_id.is_some()),
                ("client_secret", credentials.client_secret.is_some()),
                ("username", credentials.username.is_some()),
                ("password", credentials.password.is_some()),
            ],
            AuthFlow::SoapLogin => &[
                ("username", credentials.username.is_some()),
                ("password", credentials.password.is_some()),
            ],
        };

        match required.iter().find(|(_, present)| !present) {
            Some((field, _)) => Err(Error::InvalidCredentials {
                flow: format!("{:?}", self.auth_flow),
                message: format!("{field} is required"),
            }),
            None => Ok(()),
        }
    }

    /// Performs the configured flow and returns a fresh session.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Credentials cannot be loaded ([`Error::ReadCredentials`], [`Error::ParseCredentials`])
    /// - Credentials are incomplete for the flow ([`Error::InvalidCredentials`])
    /// - The instance URL is invalid ([`Error::ParseUrl`])
    /// - The OAuth2 exchange fails ([`Error::TokenExchange`])
    /// - The SOAP login fails ([`Error::Soap`])
    ///
    /// # Example
    ///
    /// ```no_run
    /// use salesforce_enterprise::auth::{self, AuthFlow, Credentials};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = auth::Builder::new()
    ///     .credentials(Credentials {
    ///         username: Some("user@example.com".to_string()),
    ///         password: Some("secret".to_string()),
    ///         security_token: Some("TOKEN".to_string()),
    ///         instance_url: "https://login.salesforce.com".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .auth_flow(AuthFlow::SoapLogin)
    ///     .build()?
    ///     .connect()
    ///     .await?;
    ///
    /// let soap = session.soap()?;
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn connect(&self) -> Result<Session, Error> {
        let credentials = self.load_credentials()?;
        self.validate_credentials(&credentials)?;

        debug!(flow = ?self.auth_flow, instance_url = %credentials.instance_url, "connecting");

        let session = match self.auth_flow {
            AuthFlow::ClientCredentials | AuthFlow::UsernamePassword => {
                self.exchange_oauth2(&credentials).await?
            }
            AuthFlow::SoapLogin => self.soap_login(&credentials).await?,
        };

        info!(
            flow = ?self.auth_flow,
            server_url = %session.server_url,
            expires_at = %session.expires_at,
            "Salesforce session established"
        );
        Ok(session)
    }

    async fn exchange_oauth2(&self, credentials: &Credentials) -> Result<Session, Error> {
        let flow = format!("{:?}", self.auth_flow);
        let missing = |field: &str| Error::InvalidCredentials {
            flow: flow.clone(),
            message: format!("{field} is required"),
        };
        let client_id = credentials
            .client_id
            .as_ref()
            .ok_or_else(|| missing("client_id"))?;
        let client_secret = credentials
            .client_secret
            .as_ref()
            .ok_or_else(|| missing("client_secret"))?;
        let instance_url = credentials.instance_url.trim_end_matches('/');

        let oauth2_client = OAuthClient::new(ClientId::new(client_id.clone()))
            .set_client_secret(ClientSecret::new(client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(format!("{}{}", instance_url, DEFAULT_AUTHORIZE_PATH))
                    .map_err(|e| Error::ParseUrl { source: e })?,
            )
            .set_token_uri(
                TokenUrl::new(format!("{}{}", instance_url, DEFAULT_TOKEN_PATH))
                    .map_err(|e| Error::ParseUrl { source: e })?,
            );

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(crate::DEFAULT_AUTH_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(crate::DEFAULT_AUTH_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::TokenExchange(Box::new(e)))?;

        let token_response: SalesforceTokenResponse = match self.auth_flow {
            AuthFlow::UsernamePassword => {
                let username = credentials
                    .username
                    .as_ref()
                    .ok_or_else(|| missing("username"))?;
                let password = credentials
                    .full_password()
                    .ok_or_else(|| missing("password"))?;
                oauth2_client
                    .exchange_password(
                        &oauth2::ResourceOwnerUsername::new(username.clone()),
                        &oauth2::ResourceOwnerPassword::new(password),
                    )
                    .request_async(&http_client)
                    .await
                    .map_err(|e| Error::TokenExchange(Box::new(e)))?
            }
            _ => oauth2_client
                .exchange_client_credentials()
                .request_async(&http_client)
                .await
                .map_err(|e| Error::TokenExchange(Box::new(e)))?,
        };

        let lifetime = token_response
            .expires_in()
            .and_then(|expires_in| i64::try_from(expires_in.as_secs()).ok())
            .unwrap_or(DEFAULT_SESSION_SECONDS);

        // The token endpoint may be the generic login host; the token names
        // the instance the session belongs to.
        let instance_url = match token_response.extra_fields().instance_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                Url::parse(url).map_err(|e| Error::ParseUrl { source: e })?;
                url.trim_end_matches('/')
            }
            _ => instance_url,
        };

        Ok(Session {
            instance_url: instance_url.to_string(),
            server_url: enterprise::endpoint(instance_url, &self.api_version),
            session_id: token_response.access_token().secret().clone(),
            user_id: None,
            expires_at: expires_after(lifetime)?,
        })
    }

    async fn soap_login(&self, credentials: &Credentials) -> Result<Session, Error> {
        let missing = |field: &str| Error::InvalidCredentials {
            flow: format!("{:?}", AuthFlow::SoapLogin),
            message: format!("{field} is required"),
        };
        let username = credentials
            .username
            .as_ref()
            .ok_or_else(|| missing("username"))?;
        let password = credentials
            .full_password()
            .ok_or_else(|| missing("password"))?;

        let login_endpoint = enterprise::endpoint(&credentials.instance_url, &self.api_version);
        Url::parse(&login_endpoint).map_err(|e| Error::ParseUrl { source: e })?;

        let soap = Soap::new(&login_endpoint, false, None)?;
        let result = soap
            .login(&Login {
                username: username.clone(),
                password,
            })
            .await?
            .result;

        let server_url = Url::parse(&result.server_url).map_err(|e| Error::ParseUrl { source: e })?;
        let instance_url = server_url.origin().ascii_serialization();
        let lifetime = result
            .user_info
            .as_ref()
            .map(|info| info.session_seconds_valid)
            .filter(|seconds| *seconds > 0)
            .unwrap_or(DEFAULT_SESSION_SECONDS);

        Ok(Session {
            instance_url,
            server_url: result.server_url,
            session_id: result.session_id,
            user_id: Some(result.user_id),
            expires_at: expires_after(lifetime)?,
        })
    }
}

/// Builder for constructing an [`Authenticator`].
///
/// # Examples
///
/// ## Using Client Credentials Flow
///
/// ```no_run
/// use salesforce_enterprise::auth::{self, AuthFlow, Credentials};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = auth::Builder::new()
///     .credentials(Credentials {
///         client_id: Some("your_client_id".to_string()),
///         client_secret: Some("your_client_secret".to_string()),
///         instance_url: "https://your-instance.my.salesforce.com".to_string(),
///         ..Default::default()
///     })
///     .auth_flow(AuthFlow::ClientCredentials)
///     .build()?
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
///
/// ## Loading from File
///
/// ```no_run
/// use salesforce_enterprise::auth;
/// use std::path::PathBuf;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = auth::Builder::new()
///     .credentials_path(PathBuf::from("credentials.json"))
///     .build()?
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct Builder {
    credentials_from: Option<CredentialsFrom>,
    auth_flow: Option<AuthFlow>,
    api_version: Option<String>,
}

impl Builder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets credentials to load from a JSON file.
    ///
    /// ```json
    /// {
    ///   "client_id": "your_client_id",
    ///   "client_secret": "your_client_secret",
    ///   "instance_url": "https://your-instance.my.salesforce.com"
    /// }
    /// ```
    pub fn credentials_path(mut self, path: PathBuf) -> Self {
        self.credentials_from = Some(CredentialsFrom::Path(path));
        self
    }

    /// Sets credentials directly.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials_from = Some(CredentialsFrom::Value(credentials));
        self
    }

    /// Sets the authentication flow. Defaults to [`AuthFlow::ClientCredentials`].
    pub fn auth_flow(mut self, auth_flow: AuthFlow) -> Self {
        self.auth_flow = Some(auth_flow);
        self
    }

    /// Sets the API version of the SOAP endpoint. Defaults to
    /// [`DEFAULT_API_VERSION`](crate::DEFAULT_API_VERSION).
    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    /// Builds the authenticator.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials were not provided via either
    /// [`credentials_path`](Self::credentials_path) or [`credentials`](Self::credentials).
    pub fn build(self) -> Result<Authenticator, Error> {
        Ok(Authenticator {
            credentials_from: self.credentials_from.ok_or_else(|| {
                Error::MissingRequiredAttribute("credentials or credentials_path".to_string())
            })?,
            auth_flow: self.auth_flow.unwrap_or_default(),
            api_version: self
                .api_version
                .unwrap_or_else(|| crate::DEFAULT_API_VERSION.to_string()),
        })
    }
}
