//! SOAP header blocks understood by the Enterprise API.

use crate::soap::{Error, HeaderBlock};
use serde::Serialize;

/// A typed SOAP header block.
pub trait SoapHeader: Serialize + Sized {
    /// Element name of the header.
    const NAME: &'static str;

    /// Serializes the header into a [`HeaderBlock`].
    fn to_block(&self) -> Result<HeaderBlock, Error> {
        HeaderBlock::new(Self::NAME, self)
    }
}

macro_rules! soap_header {
    ($header:ty, $name:literal) => {
        impl SoapHeader for $header {
            const NAME: &'static str = $name;
        }
    };
}

/// Session id obtained from `login` or OAuth. Required on every call but
/// `login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHeader {
    pub session_id: String,
}

soap_header!(SessionHeader, "SessionHeader");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOptions {
    /// Client identifier, e.g. a partner API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Managed package namespace prefix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_namespace: Option<String>,
}

soap_header!(CallOptions, "CallOptions");

/// Batch size for `query`, `queryAll` and `queryMore` (200 to 2000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    pub batch_size: i32,
}

soap_header!(QueryOptions, "QueryOptions");

/// Roll back every record of a DML call if any of them fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllOrNoneHeader {
    pub all_or_none: bool,
}

soap_header!(AllOrNoneHeader, "AllOrNoneHeader");

/// Truncate oversized string values instead of failing the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowFieldTruncationHeader {
    pub allow_field_truncation: bool,
}

soap_header!(AllowFieldTruncationHeader, "AllowFieldTruncationHeader");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRuleHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_rule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_default_rule: Option<bool>,
}

soap_header!(AssignmentRuleHeader, "AssignmentRuleHeader");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MruHeader {
    pub update_mru: bool,
}

soap_header!(MruHeader, "MruHeader");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisableFeedTrackingHeader {
    pub disable_feed_tracking: bool,
}

soap_header!(DisableFeedTrackingHeader, "DisableFeedTrackingHeader");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailHeader {
    pub trigger_auto_response_email: bool,
    pub trigger_other_email: bool,
    pub trigger_user_email: bool,
}

soap_header!(EmailHeader, "EmailHeader");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleOptions {
    /// Language for labels returned by describe calls, e.g. `de`.
    pub language: String,
}

soap_header!(LocaleOptions, "LocaleOptions");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggingHeader {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<LogInfo>,
    /// Legacy debug level, e.g. `Detail`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_level: Option<String>,
}

soap_header!(DebuggingHeader, "DebuggingHeader");

/// Log category and level for Apex debug logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogInfo {
    /// Category, e.g. `Apex_code`.
    pub category: String,
    /// Level, e.g. `Finest`.
    pub level: String,
}
