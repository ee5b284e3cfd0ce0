//! Example of using the Enterprise SOAP API.
//!
//! This example demonstrates:
//!
//! - Logging in through the SOAP `login` operation
//! - Describing an sObject
//! - Querying records with a batch size header, following `queryMore`
//! - Creating, updating and deleting a record
//! - Handling a SOAP fault
//!
//! Set `SALESFORCE_USERNAME`, `SALESFORCE_PASSWORD` and optionally
//! `SALESFORCE_SECURITY_TOKEN` and `SALESFORCE_INSTANCE_URL`. Log output is
//! controlled through `RUST_LOG`.

use salesforce_enterprise::auth::{self, AuthFlow, Credentials};
use salesforce_enterprise::enterprise::headers::{AllOrNoneHeader, QueryOptions};
use salesforce_enterprise::enterprise::types::{
    Create, Delete, DescribeSObject, Query, QueryMore, Update,
};
use salesforce_enterprise::enterprise::SObject;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let session = auth::Builder::new()
        .credentials(Credentials {
            username: Some(std::env::var("SALESFORCE_USERNAME")?),
            password: Some(std::env::var("SALESFORCE_PASSWORD")?),
            security_token: std::env::var("SALESFORCE_SECURITY_TOKEN").ok(),
            instance_url: std::env::var("SALESFORCE_INSTANCE_URL")
                .unwrap_or_else(|_| salesforce_enterprise::DEFAULT_LOGIN_URL.to_string()),
            ..Default::default()
        })
        .auth_flow(AuthFlow::SoapLogin)
        .build()?
        .connect()
        .await?;
    info!("Logged in, session valid until {}", session.expires_at);

    let soap = session.soap()?;

    info!("Describing Account");
    let describe = soap
        .describe_s_object(&DescribeSObject {
            s_object_type: "Account".to_string(),
        })
        .await?
        .result;
    info!(
        "Account has {} fields, key prefix {:?}",
        describe.fields.len(),
        describe.key_prefix
    );

    info!("Querying accounts");
    soap.set_query_options(QueryOptions { batch_size: 200 })?;
    let mut result = soap
        .query(&Query {
            query_string: "SELECT Id, Name, Industry FROM Account".to_string(),
        })
        .await?
        .result;
    let mut fetched = result.records.len();
    while !result.done {
        let Some(locator) = result.query_locator.take() else {
            break;
        };
        result = soap
            .query_more(&QueryMore {
                query_locator: locator,
            })
            .await?
            .result;
        fetched += result.records.len();
    }
    info!("Fetched {} of {} accounts", fetched, result.size);

    info!("Creating an account");
    soap.set_all_or_none_header(AllOrNoneHeader { all_or_none: true })?;
    let created = soap
        .create(&Create {
            s_objects: vec![SObject::new("Account")
                .with("Name", "SOAP Example Account")
                .with("Industry", "Technology")],
        })
        .await?
        .result;
    let Some(id) = created.first().and_then(|r| r.id.clone()) else {
        error!("Create failed: {:?}", created.first().map(|r| &r.errors));
        return Ok(());
    };
    info!("Created account {}", id);

    info!("Updating the account, clearing Industry");
    let updated = soap
        .update(&Update {
            s_objects: vec![SObject::new("Account")
                .with_id(id.clone())
                .with("Name", "SOAP Example Account (updated)")
                .with("Industry", None::<String>)],
        })
        .await?
        .result;
    info!("Update succeeded: {}", updated.iter().all(|r| r.success));

    info!("Deleting the account");
    let deleted = soap.delete(&Delete { ids: vec![id] }).await?.result;
    info!("Delete succeeded: {}", deleted.iter().all(|r| r.success));

    info!("Running a malformed query");
    match soap
        .query(&Query {
            query_string: "SELECT FROM Account".to_string(),
        })
        .await
    {
        Ok(_) => error!("Malformed query unexpectedly succeeded"),
        Err(e) => match e.fault() {
            Some(fault) => info!("Got fault {}: {}", fault.exception_code(), fault),
            None => error!("Unexpected error: {}", e),
        },
    }

    Ok(())
}
