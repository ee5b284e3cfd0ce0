//! Request and response messages of the Enterprise WSDL.
//!
//! Element names follow the WSDL (camelCase); only the fields callers are
//! likely to need are mapped, unknown response elements are ignored.

use super::sobject::SObject;
use crate::soap::Message;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// A WSDL operation: a request message paired with its response message.
pub trait Operation: Message {
    /// Response message returned by the operation.
    type Response: DeserializeOwned;
}

macro_rules! operation {
    ($request:ty => $response:ty, $element:literal) => {
        impl Message for $request {
            const ELEMENT: &'static str = $element;
        }

        impl Operation for $request {
            type Response = $response;
        }
    };
}

/// Deserializes an `xsi:nil`-able element, treating nil and empty content as absent.
fn nillable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let text: Option<String> = Option::deserialize(deserializer)?;
    match text.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Shared result types
// ---------------------------------------------------------------------------

/// Per-record error returned by DML operations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    /// Fields that caused the error, if any.
    #[serde(default)]
    pub fields: Vec<String>,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Status code, e.g. `REQUIRED_FIELD_MISSING`.
    #[serde(default)]
    pub status_code: String,
}

/// Result of a `create` or `update` for one record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    #[serde(default)]
    pub errors: Vec<RecordError>,
    #[serde(default, deserialize_with = "nillable")]
    pub id: Option<String>,
    pub success: bool,
}

/// Result of an `upsert` for one record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResult {
    /// True if the record was inserted rather than updated.
    #[serde(default)]
    pub created: bool,
    #[serde(default)]
    pub errors: Vec<RecordError>,
    #[serde(default, deserialize_with = "nillable")]
    pub id: Option<String>,
    pub success: bool,
}

/// Result of a `delete` for one record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    #[serde(default)]
    pub errors: Vec<RecordError>,
    #[serde(default, deserialize_with = "nillable")]
    pub id: Option<String>,
    pub success: bool,
}

/// Result of an `undelete` for one record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndeleteResult {
    #[serde(default)]
    pub errors: Vec<RecordError>,
    #[serde(default, deserialize_with = "nillable")]
    pub id: Option<String>,
    pub success: bool,
}

/// Result of an `emptyRecycleBin` for one record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyRecycleBinResult {
    #[serde(default)]
    pub errors: Vec<RecordError>,
    #[serde(default, deserialize_with = "nillable")]
    pub id: Option<String>,
    pub success: bool,
}

/// Records returned by `query`, `queryAll` and `queryMore`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// False if more records can be fetched with `queryMore`.
    pub done: bool,
    /// Locator to pass to `queryMore` when `done` is false.
    #[serde(default, deserialize_with = "nillable")]
    pub query_locator: Option<String>,
    #[serde(default)]
    pub records: Vec<SObject>,
    /// Total number of rows matched by the query.
    pub size: i32,
}

// ---------------------------------------------------------------------------
// login / logout / session management
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Login {
    pub username: String,
    /// Password, with the security token appended if the org requires one.
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub result: LoginResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    #[serde(default, deserialize_with = "nillable")]
    pub metadata_server_url: Option<String>,
    #[serde(default)]
    pub password_expired: bool,
    #[serde(default)]
    pub sandbox: bool,
    /// Endpoint to use for every subsequent call of this session.
    pub server_url: String,
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_info: Option<GetUserInfoResult>,
}

operation!(Login => LoginResponse, "login");

#[derive(Debug, Clone, Default, Serialize)]
pub struct Logout {}

#[derive(Debug, Clone, Deserialize)]
pub struct LogoutResponse {}

operation!(Logout => LogoutResponse, "logout");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateSessions {
    pub session_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateSessionsResponse {
    #[serde(default)]
    pub result: Vec<InvalidateSessionsResult>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvalidateSessionsResult {
    #[serde(default)]
    pub errors: Vec<RecordError>,
    pub success: bool,
}

operation!(InvalidateSessions => InvalidateSessionsResponse, "invalidateSessions");

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetUserInfo {}

#[derive(Debug, Clone, Deserialize)]
pub struct GetUserInfoResponse {
    pub result: GetUserInfoResult,
}

/// Information about the user of the current session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserInfoResult {
    #[serde(default)]
    pub accessibility_mode: bool,
    #[serde(default, deserialize_with = "nillable")]
    pub currency_symbol: Option<String>,
    #[serde(default, deserialize_with = "nillable")]
    pub org_default_currency_iso_code: Option<String>,
    #[serde(default)]
    pub org_has_person_accounts: bool,
    pub organization_id: String,
    #[serde(default)]
    pub organization_multi_currency: bool,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub profile_id: String,
    #[serde(default, deserialize_with = "nillable")]
    pub role_id: Option<String>,
    /// Lifetime of the session in seconds.
    #[serde(default)]
    pub session_seconds_valid: i64,
    #[serde(default, deserialize_with = "nillable")]
    pub user_default_currency_iso_code: Option<String>,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub user_full_name: String,
    pub user_id: String,
    #[serde(default)]
    pub user_language: String,
    #[serde(default)]
    pub user_locale: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_time_zone: String,
    #[serde(default)]
    pub user_type: String,
}

operation!(GetUserInfo => GetUserInfoResponse, "getUserInfo");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPassword {
    pub user_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetPasswordResponse {}

operation!(SetPassword => SetPasswordResponse, "setPassword");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPassword {
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordResponse {
    pub result: ResetPasswordResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResetPasswordResult {
    /// The generated password.
    pub password: String,
}

operation!(ResetPassword => ResetPasswordResponse, "resetPassword");

#[derive(Debug, Clone, Default, Serialize)]
pub struct GetServerTimestamp {}

#[derive(Debug, Clone, Deserialize)]
pub struct GetServerTimestampResponse {
    pub result: GetServerTimestampResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetServerTimestampResult {
    pub timestamp: DateTime<Utc>,
}

operation!(GetServerTimestamp => GetServerTimestampResponse, "getServerTimestamp");

// ---------------------------------------------------------------------------
// query / search / retrieve
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// SOQL statement.
    pub query_string: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub result: QueryResult,
}

operation!(Query => QueryResponse, "query");

/// Like [`Query`] but also returns deleted and archived records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAll {
    pub query_string: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryAllResponse {
    pub result: QueryResult,
}

operation!(QueryAll => QueryAllResponse, "queryAll");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMore {
    pub query_locator: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryMoreResponse {
    pub result: QueryResult,
}

operation!(QueryMore => QueryMoreResponse, "queryMore");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Search {
    /// SOSL statement.
    pub search_string: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub result: SearchResult,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(default)]
    pub search_records: Vec<SearchRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchRecord {
    pub record: SObject,
}

operation!(Search => SearchResponse, "search");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Retrieve {
    /// Comma-separated field names.
    pub field_list: String,
    pub s_object_type: String,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveResponse {
    /// One entry per requested id; ids that were not found come back empty.
    #[serde(default)]
    pub result: Vec<SObject>,
}

operation!(Retrieve => RetrieveResponse, "retrieve");

// ---------------------------------------------------------------------------
// DML
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Create {
    pub s_objects: Vec<SObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateResponse {
    #[serde(default)]
    pub result: Vec<SaveResult>,
}

operation!(Create => CreateResponse, "create");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub s_objects: Vec<SObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateResponse {
    #[serde(default)]
    pub result: Vec<SaveResult>,
}

operation!(Update => UpdateResponse, "update");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Upsert {
    #[serde(rename = "externalIDFieldName")]
    pub external_id_field_name: String,
    pub s_objects: Vec<SObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertResponse {
    #[serde(default)]
    pub result: Vec<UpsertResult>,
}

operation!(Upsert => UpsertResponse, "upsert");

#[derive(Debug, Clone, Serialize)]
pub struct Delete {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub result: Vec<DeleteResult>,
}

operation!(Delete => DeleteResponse, "delete");

#[derive(Debug, Clone, Serialize)]
pub struct Undelete {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UndeleteResponse {
    #[serde(default)]
    pub result: Vec<UndeleteResult>,
}

operation!(Undelete => UndeleteResponse, "undelete");

#[derive(Debug, Clone, Serialize)]
pub struct EmptyRecycleBin {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmptyRecycleBinResponse {
    #[serde(default)]
    pub result: Vec<EmptyRecycleBinResult>,
}

operation!(EmptyRecycleBin => EmptyRecycleBinResponse, "emptyRecycleBin");

#[derive(Debug, Clone, Serialize)]
pub struct Merge {
    pub request: Vec<MergeRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// Surviving record; fields set on it are written during the merge.
    pub master_record: SObject,
    /// Up to two records merged into the master.
    pub record_to_merge_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeResponse {
    #[serde(default)]
    pub result: Vec<MergeResult>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    #[serde(default)]
    pub errors: Vec<RecordError>,
    #[serde(default, deserialize_with = "nillable")]
    pub id: Option<String>,
    #[serde(default)]
    pub merged_record_ids: Vec<String>,
    pub success: bool,
    #[serde(default)]
    pub updated_related_ids: Vec<String>,
}

operation!(Merge => MergeResponse, "merge");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertLead {
    pub lead_converts: Vec<LeadConvert>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadConvert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    /// A lead status marked as converted in the org.
    pub converted_status: String,
    pub do_not_create_opportunity: bool,
    pub lead_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opportunity_name: Option<String>,
    pub overwrite_lead_source: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub send_notification_email: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConvertLeadResponse {
    #[serde(default)]
    pub result: Vec<LeadConvertResult>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadConvertResult {
    #[serde(default, deserialize_with = "nillable")]
    pub account_id: Option<String>,
    #[serde(default, deserialize_with = "nillable")]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub errors: Vec<RecordError>,
    #[serde(default, deserialize_with = "nillable")]
    pub lead_id: Option<String>,
    #[serde(default, deserialize_with = "nillable")]
    pub opportunity_id: Option<String>,
    pub success: bool,
}

operation!(ConvertLead => ConvertLeadResponse, "convertLead");

// ---------------------------------------------------------------------------
// replication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDeleted {
    pub s_object_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetDeletedResponse {
    pub result: GetDeletedResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDeletedResult {
    #[serde(default)]
    pub deleted_records: Vec<DeletedRecord>,
    pub earliest_date_available: DateTime<Utc>,
    pub latest_date_covered: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRecord {
    pub deleted_date: DateTime<Utc>,
    pub id: String,
}

operation!(GetDeleted => GetDeletedResponse, "getDeleted");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUpdated {
    pub s_object_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetUpdatedResponse {
    pub result: GetUpdatedResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUpdatedResult {
    #[serde(default)]
    pub ids: Vec<String>,
    pub latest_date_covered: DateTime<Utc>,
}

operation!(GetUpdated => GetUpdatedResponse, "getUpdated");

// ---------------------------------------------------------------------------
// describe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct DescribeGlobal {}

#[derive(Debug, Clone, Deserialize)]
pub struct DescribeGlobalResponse {
    pub result: DescribeGlobalResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeGlobalResult {
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub max_batch_size: i32,
    #[serde(default)]
    pub sobjects: Vec<DescribeGlobalSObjectResult>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeGlobalSObjectResult {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub label_plural: String,
    #[serde(default, deserialize_with = "nillable")]
    pub key_prefix: Option<String>,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub createable: bool,
    #[serde(default)]
    pub deletable: bool,
    #[serde(default)]
    pub queryable: bool,
    #[serde(default)]
    pub retrieveable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub updateable: bool,
}

operation!(DescribeGlobal => DescribeGlobalResponse, "describeGlobal");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeSObject {
    pub s_object_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescribeSObjectResponse {
    pub result: DescribeSObjectResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeSObjectResult {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub label_plural: String,
    #[serde(default, deserialize_with = "nillable")]
    pub key_prefix: Option<String>,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub createable: bool,
    #[serde(default)]
    pub deletable: bool,
    #[serde(default)]
    pub queryable: bool,
    #[serde(default)]
    pub retrieveable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub undeletable: bool,
    #[serde(default)]
    pub updateable: bool,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl DescribeSObjectResult {
    /// Finds a field by API name, ignoring ASCII case.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name.eq_ignore_ascii_case(name))
    }
}

/// Field metadata from a describe call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// Field type, e.g. `string`, `reference`, `picklist`.
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub length: i32,
    #[serde(default)]
    pub nillable: bool,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub createable: bool,
    #[serde(default)]
    pub updateable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub external_id: bool,
    #[serde(default)]
    pub reference_to: Vec<String>,
    #[serde(default, deserialize_with = "nillable")]
    pub relationship_name: Option<String>,
    #[serde(default)]
    pub picklist_values: Vec<PicklistEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PicklistEntry {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub default_value: bool,
    #[serde(default, deserialize_with = "nillable")]
    pub label: Option<String>,
    pub value: String,
}

operation!(DescribeSObject => DescribeSObjectResponse, "describeSObject");

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeSObjects {
    #[serde(rename = "sObjectType")]
    pub s_object_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescribeSObjectsResponse {
    #[serde(default)]
    pub result: Vec<DescribeSObjectResult>,
}

operation!(DescribeSObjects => DescribeSObjectsResponse, "describeSObjects");
