//! End-to-end tests of the SOAP transport and Enterprise service against a
//! mock endpoint.

use salesforce_enterprise::auth::{self, AuthFlow, Credentials};
use salesforce_enterprise::enterprise::headers::QueryOptions;
use salesforce_enterprise::enterprise::types::{
    Create, GetServerTimestamp, GetServerTimestampResponse, Login, Query,
};
use salesforce_enterprise::enterprise::{SObject, Soap};
use salesforce_enterprise::soap::{BasicAuth, Error, FaultKind};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SOAP_PATH: &str = "/services/Soap/c/65.0";
const SESSION_PATH: &str = "/services/Soap/c/65.0/00Dxx0000001gPL";

fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="urn:enterprise.soap.sforce.com" xmlns:sf="urn:sobject.enterprise.soap.sforce.com" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><soapenv:Body>{body}</soapenv:Body></soapenv:Envelope>"#
    )
}

fn login_response(server_uri: &str) -> String {
    envelope(&format!(
        r#"<loginResponse><result><metadataServerUrl>{server_uri}/services/Soap/m/65.0/00Dxx0000001gPL</metadataServerUrl><passwordExpired>false</passwordExpired><sandbox>false</sandbox><serverUrl>{server_uri}{SESSION_PATH}</serverUrl><sessionId>00Dxx!AQ0AQ</sessionId><userId>005xx000001Sv6e</userId><userInfo><organizationId>00Dxx0000001gPL</organizationId><sessionSecondsValid>3600</sessionSecondsValid><userId>005xx000001Sv6e</userId></userInfo></result></loginResponse>"#
    ))
}

fn soap_for(server: &MockServer) -> Soap {
    Soap::new(&format!("{}{}", server.uri(), SOAP_PATH), false, None).unwrap()
}

#[tokio::test]
async fn test_login_sends_soap_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .and(header("SOAPAction", "login"))
        .and(header("Content-Type", "text/xml; charset=\"utf-8\""))
        .and(body_string_contains(
            "<soapenv:Body xmlns=\"urn:enterprise.soap.sforce.com\"><login><username>user@example.com</username><password>secretTOKEN</password></login></soapenv:Body>",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_response(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;

    let response = soap_for(&server)
        .login(&Login {
            username: "user@example.com".to_string(),
            password: "secretTOKEN".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(response.result.session_id, "00Dxx!AQ0AQ");
    assert_eq!(response.result.user_id, "005xx000001Sv6e");
    assert_eq!(
        response.result.user_info.map(|info| info.session_seconds_valid),
        Some(3600)
    );
}

#[tokio::test]
async fn test_login_fault_is_surfaced() {
    let server = MockServer::start().await;
    let fault = envelope(
        r#"<soapenv:Fault><faultcode>sf:INVALID_LOGIN</faultcode><faultstring>INVALID_LOGIN: Invalid username, password, security token; or user locked out.</faultstring><detail><sf:LoginFault xsi:type="sf:LoginFault"><sf:exceptionCode>INVALID_LOGIN</sf:exceptionCode><sf:exceptionMessage>Invalid username, password, security token; or user locked out.</sf:exceptionMessage></sf:LoginFault></detail></soapenv:Fault>"#,
    );
    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string(fault))
        .mount(&server)
        .await;

    let result = soap_for(&server)
        .login(&Login {
            username: "user@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await;

    let error = result.unwrap_err();
    let fault = error.fault().expect("expected a SOAP fault");
    assert_eq!(fault.exception_code(), "INVALID_LOGIN");
    assert_eq!(fault.kind(), Some(&FaultKind::LoginFault));
    assert!(error.to_string().contains("Invalid username"));
}

#[tokio::test]
async fn test_empty_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let result = soap_for(&server)
        .get_server_timestamp(&GetServerTimestamp {})
        .await;

    assert!(matches!(
        result,
        Err(Error::EmptyResponse { status }) if status.as_u16() == 200
    ));
}

#[tokio::test]
async fn test_non_soap_error_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string("<html><body>Service Unavailable</body></html>"),
        )
        .mount(&server)
        .await;

    let result = soap_for(&server)
        .get_server_timestamp(&GetServerTimestamp {})
        .await;

    match result {
        Err(Error::UnexpectedStatus { status, body }) => {
            assert_eq!(status.as_u16(), 503);
            assert!(body.contains("Service Unavailable"));
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_basic_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
            "<getServerTimestampResponse><result><timestamp>2024-05-06T07:08:09.000Z</timestamp></result></getServerTimestampResponse>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let soap = Soap::new(
        &format!("{}{}", server.uri(), SOAP_PATH),
        false,
        Some(BasicAuth {
            login: "user".to_string(),
            password: "pass".to_string(),
        }),
    )
    .unwrap();

    let response = soap
        .get_server_timestamp(&GetServerTimestamp {})
        .await
        .unwrap();
    assert_eq!(
        response.result.timestamp.to_rfc3339(),
        "2024-05-06T07:08:09+00:00"
    );
}

#[tokio::test]
async fn test_authenticate_switches_endpoint_and_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .and(header("SOAPAction", "login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_response(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SESSION_PATH))
        .and(header("SOAPAction", "getServerTimestamp"))
        .and(body_string_contains(
            "<SessionHeader><sessionId>00Dxx!AQ0AQ</sessionId></SessionHeader>",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
            "<getServerTimestampResponse><result><timestamp>2024-05-06T07:08:09.000Z</timestamp></result></getServerTimestampResponse>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let soap = soap_for(&server);
    let login = soap
        .authenticate("user@example.com", "secretTOKEN")
        .await
        .unwrap();
    assert_eq!(
        soap.client().endpoint().unwrap().as_str(),
        format!("{}{}", server.uri(), SESSION_PATH)
    );
    assert_eq!(login.session_id, "00Dxx!AQ0AQ");

    soap.get_server_timestamp(&GetServerTimestamp {})
        .await
        .unwrap();
}

#[tokio::test]
async fn test_query_with_headers() {
    let server = MockServer::start().await;
    let records = envelope(
        r#"<queryResponse><result xsi:type="QueryResult"><done>true</done><queryLocator xsi:nil="true"/><records xsi:type="sf:Contact"><sf:Id>003xx000004TmiQ</sf:Id><sf:LastName>Smith</sf:LastName><sf:Account xsi:type="sf:Account"><sf:Id xsi:nil="true"/><sf:Name>Acme</sf:Name></sf:Account></records><records xsi:type="sf:Contact"><sf:Id>003xx000004TmiR</sf:Id><sf:LastName>Jones</sf:LastName><sf:Account xsi:nil="true"/></records><size>2</size></result></queryResponse>"#,
    );
    Mock::given(method("POST"))
        .and(header("SOAPAction", "query"))
        .and(body_string_contains(
            "<soapenv:Header xmlns=\"urn:enterprise.soap.sforce.com\"><QueryOptions><batchSize>500</batchSize></QueryOptions></soapenv:Header>",
        ))
        .and(body_string_contains(
            "<queryString>SELECT Id, LastName, Account.Name FROM Contact</queryString>",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(records))
        .expect(1)
        .mount(&server)
        .await;

    let soap = soap_for(&server);
    soap.set_query_options(QueryOptions { batch_size: 500 })
        .unwrap();

    let result = soap
        .query(&Query {
            query_string: "SELECT Id, LastName, Account.Name FROM Contact".to_string(),
        })
        .await
        .unwrap()
        .result;

    assert!(result.done);
    assert!(result.query_locator.is_none());
    assert_eq!(result.size, 2);
    assert_eq!(result.records.len(), 2);

    let smith = &result.records[0];
    assert_eq!(smith.type_name(), "Contact");
    assert_eq!(smith.id(), Some("003xx000004TmiQ"));
    let account = smith.get("Account").and_then(|v| v.as_sobject()).unwrap();
    assert_eq!(account.get_str("Name"), Some("Acme"));

    let jones = &result.records[1];
    assert!(jones.get("Account").map(|v| v.is_null()).unwrap_or(false));
}

#[tokio::test]
async fn test_create_reports_record_errors() {
    let server = MockServer::start().await;
    let response = envelope(
        r#"<createResponse><result><id>001xx000003DGb2AAG</id><success>true</success></result><result><errors><fields>Name</fields><message>Required fields are missing: [Name]</message><statusCode>REQUIRED_FIELD_MISSING</statusCode></errors><id xsi:nil="true"/><success>false</success></result></createResponse>"#,
    );
    Mock::given(method("POST"))
        .and(header("SOAPAction", "create"))
        .and(body_string_contains(
            "xmlns:ens=\"urn:sobject.enterprise.soap.sforce.com\"",
        ))
        .and(body_string_contains(
            "<sObjects xsi:type=\"ens:Account\"><Name>Acme</Name></sObjects>",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(response))
        .expect(1)
        .mount(&server)
        .await;

    let result = soap_for(&server)
        .create(&Create {
            s_objects: vec![
                SObject::new("Account").with("Name", "Acme"),
                SObject::new("Account"),
            ],
        })
        .await
        .unwrap()
        .result;

    assert_eq!(result.len(), 2);
    assert!(result[0].success);
    assert_eq!(result[0].id.as_deref(), Some("001xx000003DGb2AAG"));
    assert!(!result[1].success);
    assert!(result[1].id.is_none());
    assert_eq!(result[1].errors[0].status_code, "REQUIRED_FIELD_MISSING");
}

#[tokio::test]
async fn test_soap_login_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .and(body_string_contains("<password>secretTOKEN</password>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_response(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;

    let session = auth::Builder::new()
        .credentials(Credentials {
            username: Some("user@example.com".to_string()),
            password: Some("secret".to_string()),
            security_token: Some("TOKEN".to_string()),
            instance_url: server.uri(),
            ..Default::default()
        })
        .auth_flow(AuthFlow::SoapLogin)
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    assert_eq!(session.instance_url, server.uri());
    assert_eq!(session.server_url, format!("{}{}", server.uri(), SESSION_PATH));
    assert_eq!(session.session_id, "00Dxx!AQ0AQ");
    assert_eq!(session.user_id.as_deref(), Some("005xx000001Sv6e"));
    assert!(!session.is_expired(0).unwrap());
}

#[tokio::test]
async fn test_client_credentials_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "00Dxx!oauth",
            "token_type": "Bearer",
            "instance_url": "https://acme.my.salesforce.com",
            "issued_at": "1715000000000"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = auth::Builder::new()
        .credentials(Credentials {
            client_id: Some("client_id".to_string()),
            client_secret: Some("client_secret".to_string()),
            instance_url: server.uri(),
            ..Default::default()
        })
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    assert_eq!(session.session_id, "00Dxx!oauth");
    assert_eq!(session.instance_url, "https://acme.my.salesforce.com");
    assert_eq!(
        session.server_url,
        format!("https://acme.my.salesforce.com{}", SOAP_PATH)
    );
    assert!(session.user_id.is_none());

    let soap = session.soap().unwrap();
    let headers = soap.client().headers().unwrap();
    assert!(headers[0].as_xml().contains("00Dxx!oauth"));
}

#[tokio::test]
async fn test_client_credentials_flow_without_instance_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "00Dxx!oauth",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = auth::Builder::new()
        .credentials(Credentials {
            client_id: Some("client_id".to_string()),
            client_secret: Some("client_secret".to_string()),
            instance_url: format!("{}/", server.uri()),
            ..Default::default()
        })
        .build()
        .unwrap()
        .connect()
        .await
        .unwrap();

    assert_eq!(session.instance_url, server.uri());
    assert_eq!(session.server_url, format!("{}{}", server.uri(), SOAP_PATH));
}

#[tokio::test]
async fn test_empty_action_is_sent_quoted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SOAP_PATH))
        .and(header("SOAPAction", "\"\""))
        .and(header("Connection", "close"))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(
            "<getServerTimestampResponse><result><timestamp>2024-05-06T07:08:09.000Z</timestamp></result></getServerTimestampResponse>",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let response: GetServerTimestampResponse = soap_for(&server)
        .client()
        .call("", &GetServerTimestamp {})
        .await
        .unwrap();
    assert_eq!(
        response.result.timestamp.to_rfc3339(),
        "2024-05-06T07:08:09+00:00"
    );
}
