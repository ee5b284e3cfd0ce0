use super::headers::{
    AllOrNoneHeader, AllowFieldTruncationHeader, AssignmentRuleHeader, CallOptions,
    DebuggingHeader, DisableFeedTrackingHeader, EmailHeader, LocaleOptions, MruHeader,
    QueryOptions, SessionHeader, SoapHeader,
};
use super::types::*;
use super::{ENTERPRISE_NS, SOBJECT_NS, SOBJECT_PREFIX};
use crate::soap::envelope::XSI_NS;
use crate::soap::{BasicAuth, Config, Error, SoapClient};
use tracing::{debug, info};

/// Client for the Salesforce Enterprise SOAP API.
///
/// Cloning is cheap and clones share endpoint and header state.
///
/// # Examples
///
/// ```no_run
/// use salesforce_enterprise::enterprise::{headers::QueryOptions, types::QueryAll, Soap};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let soap = Soap::new("https://login.salesforce.com/services/Soap/c/65.0", false, None)?;
/// soap.authenticate("user@example.com", "passwordTOKEN").await?;
/// soap.set_query_options(QueryOptions { batch_size: 500 })?;
///
/// let mut result = soap
///     .query_all(&QueryAll {
///         query_string: "SELECT Id FROM Contact".to_string(),
///     })
///     .await?
///     .result;
/// while let Some(locator) = result.query_locator.take().filter(|_| !result.done) {
///     result = soap
///         .query_more(&salesforce_enterprise::enterprise::types::QueryMore {
///             query_locator: locator,
///         })
///         .await?
///         .result;
/// }
/// # Ok(())
/// # }
/// ```
///
/// Operations without a typed method here (`sendEmail`, `process`,
/// `describeLayout` and the rest of the WSDL) are sent through
/// [`Soap::invoke`] with a request type implementing [`Operation`]:
///
/// ```no_run
/// use salesforce_enterprise::enterprise::{Operation, Soap};
/// use salesforce_enterprise::soap::Message;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// #[serde(rename_all = "camelCase")]
/// struct DescribeLayout {
///     s_object_type: String,
/// }
///
/// #[derive(Deserialize)]
/// struct DescribeLayoutResponse {}
///
/// impl Message for DescribeLayout {
///     const ELEMENT: &'static str = "describeLayout";
/// }
///
/// impl Operation for DescribeLayout {
///     type Response = DescribeLayoutResponse;
/// }
///
/// # async fn run(soap: Soap) -> Result<(), salesforce_enterprise::soap::Error> {
/// soap.invoke(&DescribeLayout {
///     s_object_type: "Account".to_string(),
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Soap {
    client: SoapClient,
}

impl Soap {
    /// Creates a client for `endpoint` with the Enterprise namespace layout.
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

    /// Creates a client from a transport configuration.
    ///
    /// The Enterprise namespace and the `xsi`/`ens` declarations are filled in
    /// when the configuration does not set them.
    pub fn from_config(mut config: Config) -> Result<Self, Error> {
        config.namespace.get_or_insert_with(|| ENTERPRISE_NS.to_string());
        for (prefix, uri) in [("xsi", XSI_NS), (SOBJECT_PREFIX, SOBJECT_NS)] {
            if !config.namespace_declarations.iter().any(|(p, _)| p == prefix) {
                config
                    .namespace_declarations
                    .push((prefix.to_string(), uri.to_string()));
            }
        }
        Ok(Self::from_client(SoapClient::from_config(config)?))
    }

    /// Wraps an already configured transport.
    pub fn from_client(client: SoapClient) -> Self {
        Self { client }
    }

    /// Underlying SOAP transport.
    pub fn client(&self) -> &SoapClient {
        &self.client
    }

    /// Sends any Enterprise operation.
    ///
    /// The element name doubles as the `SOAPAction`.
    pub async fn invoke<O: Operation>(&self, request: &O) -> Result<O::Response, Error> {
        self.client.call(O::ELEMENT, request).await
    }

    /// Logs in with username and password, then points this client at the
    /// returned server URL and installs the session header.
    ///
    /// `password` must include the security token when the org requires it.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<LoginResult, Error> {
        let response = self
            .login(&Login {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;
        let result = response.result;

        self.client.set_endpoint(&result.server_url)?;
        self.set_session_header(SessionHeader {
            session_id: result.session_id.clone(),
        })?;

        info!(
            user_id = %result.user_id,
            server_url = %result.server_url,
            "authenticated with Salesforce"
        );
        Ok(result)
    }

    /// Installs a header block, replacing any previous one with the same name.
    pub fn set_header<H: SoapHeader>(&self, header: &H) -> Result<(), Error> {
        debug!(header = H::NAME, "setting SOAP header");
        self.client.set_header(header.to_block()?)
    }

    /// Removes a header block. Returns true if it was set.
    pub fn clear_header<H: SoapHeader>(&self) -> Result<bool, Error> {
        self.client.clear_header(H::NAME)
    }

    pub fn set_session_header(&self, header: SessionHeader) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_call_options(&self, header: CallOptions) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_query_options(&self, header: QueryOptions) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_all_or_none_header(&self, header: AllOrNoneHeader) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_allow_field_truncation_header(
        &self,
        header: AllowFieldTruncationHeader,
    ) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_assignment_rule_header(&self, header: AssignmentRuleHeader) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_mru_header(&self, header: MruHeader) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_disable_feed_tracking_header(
        &self,
        header: DisableFeedTrackingHeader,
    ) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_email_header(&self, header: EmailHeader) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_locale_options(&self, header: LocaleOptions) -> Result<(), Error> {
        self.set_header(&header)
    }

    pub fn set_debugging_header(&self, header: DebuggingHeader) -> Result<(), Error> {
        self.set_header(&header)
    }

    /// Authenticates with username and password.
    ///
    /// Only returns the login result; see [`Soap::authenticate`] for a call
    /// that also configures this client for the new session.
    pub async fn login(&self, request: &Login) -> Result<LoginResponse, Error> {
        self.invoke(request).await
    }

    /// Ends the current session.
    pub async fn logout(&self, request: &Logout) -> Result<LogoutResponse, Error> {
        self.invoke(request).await
    }

    /// Runs a SOQL query.
    pub async fn query(&self, request: &Query) -> Result<QueryResponse, Error> {
        self.invoke(request).await
    }

    /// Runs a SOQL query including deleted and archived records.
    pub async fn query_all(&self, request: &QueryAll) -> Result<QueryAllResponse, Error> {
        self.invoke(request).await
    }

    /// Fetches the next batch of a query.
    pub async fn query_more(&self, request: &QueryMore) -> Result<QueryMoreResponse, Error> {
        self.invoke(request).await
    }

    /// Runs a SOSL search.
    pub async fn search(&self, request: &Search) -> Result<SearchResponse, Error> {
        self.invoke(request).await
    }

    /// Retrieves records by id.
    pub async fn retrieve(&self, request: &Retrieve) -> Result<RetrieveResponse, Error> {
        self.invoke(request).await
    }

    pub async fn create(&self, request: &Create) -> Result<CreateResponse, Error> {
        self.invoke(request).await
    }

    pub async fn update(&self, request: &Update) -> Result<UpdateResponse, Error> {
        self.invoke(request).await
    }

    /// Creates or updates records matched on an external id field.
    pub async fn upsert(&self, request: &Upsert) -> Result<UpsertResponse, Error> {
        self.invoke(request).await
    }

    pub async fn delete(&self, request: &Delete) -> Result<DeleteResponse, Error> {
        self.invoke(request).await
    }

    pub async fn undelete(&self, request: &Undelete) -> Result<UndeleteResponse, Error> {
        self.invoke(request).await
    }

    pub async fn empty_recycle_bin(
        &self,
        request: &EmptyRecycleBin,
    ) -> Result<EmptyRecycleBinResponse, Error> {
        self.invoke(request).await
    }

    pub async fn merge(&self, request: &Merge) -> Result<MergeResponse, Error> {
        self.invoke(request).await
    }

    pub async fn convert_lead(&self, request: &ConvertLead) -> Result<ConvertLeadResponse, Error> {
        self.invoke(request).await
    }

    /// Lists records deleted within a time window.
    pub async fn get_deleted(&self, request: &GetDeleted) -> Result<GetDeletedResponse, Error> {
        self.invoke(request).await
    }

    /// Lists records updated within a time window.
    pub async fn get_updated(&self, request: &GetUpdated) -> Result<GetUpdatedResponse, Error> {
        self.invoke(request).await
    }

    pub async fn get_server_timestamp(
        &self,
        request: &GetServerTimestamp,
    ) -> Result<GetServerTimestampResponse, Error> {
        self.invoke(request).await
    }

    pub async fn get_user_info(&self, request: &GetUserInfo) -> Result<GetUserInfoResponse, Error> {
        self.invoke(request).await
    }

    pub async fn set_password(&self, request: &SetPassword) -> Result<SetPasswordResponse, Error> {
        self.invoke(request).await
    }

    pub async fn reset_password(
        &self,
        request: &ResetPassword,
    ) -> Result<ResetPasswordResponse, Error> {
        self.invoke(request).await
    }

    pub async fn invalidate_sessions(
        &self,
        request: &InvalidateSessions,
    ) -> Result<InvalidateSessionsResponse, Error> {
        self.invoke(request).await
    }

    pub async fn describe_global(
        &self,
        request: &DescribeGlobal,
    ) -> Result<DescribeGlobalResponse, Error> {
        self.invoke(request).await
    }

    pub async fn describe_s_object(
        &self,
        request: &DescribeSObject,
    ) -> Result<DescribeSObjectResponse, Error> {
        self.invoke(request).await
    }

    pub async fn describe_s_objects(
        &self,
        request: &DescribeSObjects,
    ) -> Result<DescribeSObjectsResponse, Error> {
        self.invoke(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soap() -> Soap {
        Soap::new("https://login.salesforce.com/services/Soap/c/65.0", false, None).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_endpoint() {
        let result = Soap::new("not a url", false, None);
        assert!(matches!(result, Err(Error::ParseUrl { .. })));
    }

    #[test]
    fn test_from_config_keeps_explicit_namespace() {
        let mut config = Config::new("https://example.com/soap");
        config.namespace = Some("urn:partner.soap.sforce.com".to_string());
        config
            .namespace_declarations
            .push(("xsi".to_string(), XSI_NS.to_string()));
        let soap = Soap::from_config(config).unwrap();
        assert_eq!(
            soap.client().endpoint().unwrap().as_str(),
            "https://example.com/soap"
        );
    }

    #[test]
    fn test_typed_header_setters() {
        let soap = soap();
        soap.set_session_header(SessionHeader {
            session_id: "00D!abc".to_string(),
        })
        .unwrap();
        soap.set_query_options(QueryOptions { batch_size: 200 })
            .unwrap();
        soap.set_query_options(QueryOptions { batch_size: 2000 })
            .unwrap();

        let headers = soap.client().headers().unwrap();
        assert_eq!(headers.len(), 2);
        assert!(headers[1].as_xml().contains("<batchSize>2000</batchSize>"));

        assert!(soap.clear_header::<QueryOptions>().unwrap());
        assert!(!soap.clear_header::<QueryOptions>().unwrap());
        assert_eq!(soap.client().headers().unwrap().len(), 1);
    }
}
