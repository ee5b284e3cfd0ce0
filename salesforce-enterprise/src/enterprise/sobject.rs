//! Generic Salesforce record.
//!
//! Instead of one struct per standard object, records are carried as an
//! [`SObject`]: an `xsi:type` name, an optional `Id` and an ordered list of
//! fields. Values read from the wire are untyped text; the accessor methods on
//! [`FieldValue`] parse them on demand.

use super::types::QueryResult;
use super::SOBJECT_PREFIX;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::{self, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Value of a single sObject field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit null. Sent as a `fieldsToNull` entry.
    Null,
    Text(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    /// A related record, e.g. `Account` on a `Contact`, or an external id
    /// reference in an upsert.
    Reference(Box<SObject>),
    /// A child relationship subquery result.
    Query(Box<QueryResult>),
}

impl FieldValue {
    /// Returns true for [`FieldValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as text, if it is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Returns the value as a boolean, parsing `"true"`/`"false"` text.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as an integer, parsing text if necessary.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as a float, parsing text if necessary.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as a UTC timestamp, parsing RFC 3339 text if necessary.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(value) => Some(*value),
            Self::Text(text) => DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Returns the value as a calendar date, parsing `YYYY-MM-DD` text if necessary.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(value) => Some(*value),
            Self::Text(text) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Returns the related record.
    pub fn as_sobject(&self) -> Option<&SObject> {
        match self {
            Self::Reference(record) => Some(record.as_ref()),
            _ => None,
        }
    }

    /// Returns the child relationship query result.
    pub fn as_query_result(&self) -> Option<&QueryResult> {
        match self {
            Self::Query(result) => Some(result.as_ref()),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<SObject> for FieldValue {
    fn from(value: SObject) -> Self {
        Self::Reference(Box::new(value))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A Salesforce record of any type.
///
/// # Example
///
/// ```
/// use salesforce_enterprise::enterprise::SObject;
///
/// let account = SObject::new("Account")
///     .with("Name", "Acme")
///     .with("NumberOfEmployees", 250)
///     .with("Website", None::<String>);
///
/// assert_eq!(account.get_str("name"), Some("Acme"));
/// assert!(account.get("Website").unwrap().is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SObject {
    type_name: String,
    id: Option<String>,
    fields: Vec<(String, FieldValue)>,
}

impl SObject {
    /// Creates an empty record of type `type_name`, e.g. `Account`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            fields: Vec::new(),
        }
    }

    /// Sets the record id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets a field and returns the record.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Object type name without namespace prefix.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Record id, if known.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Sets the record id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Sets a field, replacing an existing field with the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.fields[index].1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    /// Marks a field to be cleared on update.
    pub fn set_null(&mut self, name: impl Into<String>) -> &mut Self {
        self.set(name, FieldValue::Null)
    }

    /// Looks a field up by API name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.position(name).map(|index| &self.fields[index].1)
    }

    /// Looks up a textual field.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    /// Removes a field and returns its value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.position(name).map(|index| self.fields.remove(index).1)
    }

    /// Iterates over fields in insertion order. `Id` is not included.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of fields, not counting `Id`.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(field, _)| field.eq_ignore_ascii_case(name))
    }
}

impl Serialize for SObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        // Attributes must precede child elements.
        if !self.type_name.is_empty() {
            map.serialize_entry(
                "@xsi:type",
                &format!("{SOBJECT_PREFIX}:{}", self.type_name),
            )?;
        }
        for (name, value) in &self.fields {
            if value.is_null() {
                map.serialize_entry("fieldsToNull", name)?;
            }
        }
        if let Some(id) = &self.id {
            map.serialize_entry("Id", id)?;
        }
        for (name, value) in &self.fields {
            if !value.is_null() {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::DateTime(value) => {
                serializer.serialize_str(&value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
            }
            Self::Date(value) => serializer.serialize_str(&value.format("%Y-%m-%d").to_string()),
            Self::Reference(record) => record.serialize(serializer),
            Self::Query(_) => Err(ser::Error::custom(
                "child relationship query results cannot be sent",
            )),
        }
    }
}

/// Element content collected before deciding what it represents.
#[derive(Default)]
struct RawElement {
    xsi_type: Option<String>,
    nil: bool,
    text: Option<String>,
    children: Vec<(String, FieldValue)>,
}

impl RawElement {
    fn read<'de, A: MapAccess<'de>>(mut map: A) -> Result<Self, A::Error> {
        let mut raw = RawElement::default();
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "$text" | "$value" => raw.text = Some(map.next_value()?),
                key if key.starts_with('@') => match local_name(&key[1..]) {
                    "type" => raw.xsi_type = Some(map.next_value()?),
                    "nil" => raw.nil = map.next_value::<String>()?.trim() == "true",
                    _ => {
                        map.next_value::<IgnoredAny>()?;
                    }
                },
                _ => {
                    let value = map.next_value::<FieldValue>()?;
                    raw.children.push((local_name(&key).to_string(), value));
                }
            }
        }
        Ok(raw)
    }

    /// `xsi:type` without its namespace prefix.
    fn type_name(&self) -> Option<&str> {
        self.xsi_type.as_deref().map(local_name)
    }

    fn is_primitive_type(&self) -> bool {
        self.xsi_type
            .as_deref()
            .is_some_and(|t| t.starts_with("xsd:") || t.starts_with("xs:"))
    }

    fn into_field_value(self) -> FieldValue {
        if self.nil {
            return FieldValue::Null;
        }
        if self.children.is_empty() && (self.xsi_type.is_none() || self.is_primitive_type()) {
            return FieldValue::Text(self.text.unwrap_or_default());
        }
        if self.type_name() == Some("QueryResult") {
            return FieldValue::Query(Box::new(self.into_query_result()));
        }
        FieldValue::Reference(Box::new(self.into_sobject()))
    }

    fn into_sobject(self) -> SObject {
        let mut record = SObject::new(self.type_name().unwrap_or_default());
        for (name, value) in self.children {
            match name.as_str() {
                "fieldsToNull" => {}
                // Partner-style responses may repeat Id; the first one wins.
                "Id" if record.id.is_none() => {
                    if let FieldValue::Text(id) = value {
                        record.id = Some(id);
                    }
                }
                "Id" => {}
                _ => {
                    record.fields.push((name, value));
                }
            }
        }
        record
    }

    fn into_query_result(self) -> QueryResult {
        let mut result = QueryResult::default();
        for (name, value) in self.children {
            match (name.as_str(), value) {
                ("done", value) => result.done = value.as_bool().unwrap_or(true),
                ("queryLocator", FieldValue::Text(locator)) if !locator.is_empty() => {
                    result.query_locator = Some(locator)
                }
                ("size", value) => {
                    result.size = value
                        .as_i64()
                        .and_then(|size| i32::try_from(size).ok())
                        .unwrap_or_default()
                }
                ("records", FieldValue::Reference(record)) => result.records.push(*record),
                _ => {}
            }
        }
        result
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an sObject field value")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<FieldValue, E> {
        Ok(FieldValue::Text(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<FieldValue, E> {
        Ok(FieldValue::Text(value))
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<FieldValue, E> {
        Ok(FieldValue::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<FieldValue, E> {
        Ok(FieldValue::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<FieldValue, E> {
        i64::try_from(value)
            .map(FieldValue::Int)
            .or_else(|_| Ok(FieldValue::Text(value.to_string())))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<FieldValue, E> {
        Ok(FieldValue::Float(value))
    }

    fn visit_unit<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<FieldValue, E> {
        Ok(FieldValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<FieldValue, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<FieldValue, A::Error> {
        Ok(RawElement::read(map)?.into_field_value())
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

struct SObjectVisitor;

impl<'de> Visitor<'de> for SObjectVisitor {
    type Value = SObject;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an sObject element")
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<SObject, A::Error> {
        Ok(RawElement::read(map)?.into_sobject())
    }
}

impl<'de> Deserialize<'de> for SObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SObjectVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Create {
        s_objects: Vec<SObject>,
    }

    #[derive(Deserialize)]
    struct Records {
        #[serde(default)]
        records: Vec<SObject>,
    }

    #[test]
    fn test_set_replaces_case_insensitively() {
        let mut record = SObject::new("Contact");
        record.set("LastName", "Smith");
        record.set("lastname", "Jones");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get_str("LASTNAME"), Some("Jones"));
        assert_eq!(record.fields().next().map(|(name, _)| name), Some("LastName"));
    }

    #[test]
    fn test_remove_field() {
        let mut record = SObject::new("Lead").with("Company", "Acme");
        assert_eq!(record.remove("company"), Some(FieldValue::from("Acme")));
        assert!(record.is_empty());
    }

    #[test]
    fn test_serialize_create() {
        let account = SObject::new("Account")
            .with("Name", "Acme & Sons")
            .with("NumberOfEmployees", 12)
            .with("IsActive__c", true);
        let xml = quick_xml::se::to_string_with_root(
            "create",
            &Create {
                s_objects: vec![account],
            },
        )
        .unwrap();
        assert_eq!(
            xml,
            r#"<create><sObjects xsi:type="ens:Account"><Name>Acme &amp; Sons</Name><NumberOfEmployees>12</NumberOfEmployees><IsActive__c>true</IsActive__c></sObjects></create>"#
        );
    }

    #[test]
    fn test_serialize_update_with_nulls() {
        let mut contact = SObject::new("Contact").with_id("003xx000004TmiQ");
        contact.set("Title", "CTO");
        contact.set_null("Phone");
        let xml = quick_xml::se::to_string_with_root(
            "update",
            &Create {
                s_objects: vec![contact],
            },
        )
        .unwrap();
        assert_eq!(
            xml,
            r#"<update><sObjects xsi:type="ens:Contact"><fieldsToNull>Phone</fieldsToNull><Id>003xx000004TmiQ</Id><Title>CTO</Title></sObjects></update>"#
        );
    }

    #[test]
    fn test_serialize_reference_and_dates() {
        let contact = SObject::new("Contact")
            .with(
                "Account",
                SObject::new("Account").with("External_Id__c", "ACME-1"),
            )
            .with("Birthdate", NaiveDate::from_ymd_opt(1990, 4, 1).unwrap())
            .with(
                "Last_Seen__c",
                Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap(),
            );
        let xml = quick_xml::se::to_string_with_root(
            "upsert",
            &Create {
                s_objects: vec![contact],
            },
        )
        .unwrap();
        assert!(xml.contains(
            r#"<Account xsi:type="ens:Account"><External_Id__c>ACME-1</External_Id__c></Account>"#
        ));
        assert!(xml.contains("<Birthdate>1990-04-01</Birthdate>"));
        assert!(xml.contains("<Last_Seen__c>2024-05-06T07:08:09.000Z</Last_Seen__c>"));
    }

    #[test]
    fn test_deserialize_records() {
        let xml = r#"<result>
            <records xsi:type="sf:Contact">
                <sf:Id>003xx000004TmiQ</sf:Id>
                <sf:Account xsi:type="sf:Account">
                    <sf:Id>001xx000003DGb2</sf:Id>
                    <sf:Name>Acme</sf:Name>
                </sf:Account>
                <sf:Email xsi:nil="true"/>
                <sf:LastName>Smith</sf:LastName>
            </records>
            <records xsi:type="sf:Contact">
                <sf:Id>003xx000004TmiR</sf:Id>
                <sf:LastName>Jones</sf:LastName>
            </records>
        </result>"#;
        let parsed: Records = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(parsed.records.len(), 2);

        let first = &parsed.records[0];
        assert_eq!(first.type_name(), "Contact");
        assert_eq!(first.id(), Some("003xx000004TmiQ"));
        assert_eq!(first.get_str("LastName"), Some("Smith"));
        assert!(first.get("Email").unwrap().is_null());

        let account = first.get("Account").and_then(FieldValue::as_sobject).unwrap();
        assert_eq!(account.type_name(), "Account");
        assert_eq!(account.id(), Some("001xx000003DGb2"));
        assert_eq!(account.get_str("Name"), Some("Acme"));

        assert_eq!(parsed.records[1].get_str("lastname"), Some("Jones"));
    }

    #[test]
    fn test_deserialize_child_relationship() {
        let xml = r#"<result>
            <records xsi:type="sf:Account">
                <sf:Id>001xx000003DGb2</sf:Id>
                <sf:Contacts xsi:type="QueryResult">
                    <done>true</done>
                    <queryLocator xsi:nil="true"/>
                    <records xsi:type="sf:Contact">
                        <sf:Id>003xx000004TmiQ</sf:Id>
                        <sf:LastName>Smith</sf:LastName>
                    </records>
                    <size>1</size>
                </sf:Contacts>
            </records>
        </result>"#;
        let parsed: Records = quick_xml::de::from_str(xml).unwrap();
        let contacts = parsed.records[0]
            .get("Contacts")
            .and_then(FieldValue::as_query_result)
            .unwrap();
        assert!(contacts.done);
        assert!(contacts.query_locator.is_none());
        assert_eq!(contacts.size, 1);
        assert_eq!(contacts.records[0].get_str("LastName"), Some("Smith"));
    }

    #[test]
    fn test_query_response_keeps_field_whitespace() {
        use crate::enterprise::types::QueryResponse;
        use crate::soap::envelope::{decode_response, Body};

        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="urn:enterprise.soap.sforce.com" xmlns:sf="urn:sobject.enterprise.soap.sforce.com" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <soapenv:Body>
    <queryResponse>
      <result>
        <done>true</done>
        <queryLocator xsi:nil="true"/>
        <records xsi:type="sf:Account">
          <sf:Id>001xx000003DGb2</sf:Id>
          <sf:Name>  Acme  Corp </sf:Name>
          <sf:Site> </sf:Site>
        </records>
        <size>1</size>
      </result>
    </queryResponse>
  </soapenv:Body>
</soapenv:Envelope>"#;
        let Body::Content(response) = decode_response::<QueryResponse>(xml).unwrap() else {
            panic!("expected content");
        };
        let record = &response.result.records[0];
        assert_eq!(record.id(), Some("001xx000003DGb2"));
        assert_eq!(
            record.get("Name"),
            Some(&FieldValue::Text("  Acme  Corp ".to_string()))
        );
        assert_eq!(record.get_str("Site"), Some(" "));
    }

    #[test]
    fn test_oversized_query_size_is_not_truncated() {
        let xml = r#"<result>
            <records xsi:type="sf:Account">
                <sf:Contacts xsi:type="QueryResult">
                    <done>false</done>
                    <size>4294967297</size>
                </sf:Contacts>
            </records>
        </result>"#;
        let parsed: Records = quick_xml::de::from_str(xml).unwrap();
        let contacts = parsed.records[0]
            .get("Contacts")
            .and_then(FieldValue::as_query_result)
            .unwrap();
        assert!(!contacts.done);
        assert_eq!(contacts.size, 0);
    }

    #[test]
    fn test_field_value_accessors() {
        assert_eq!(FieldValue::from("42").as_i64(), Some(42));
        assert_eq!(FieldValue::from("true").as_bool(), Some(true));
        assert_eq!(FieldValue::from("2.5").as_f64(), Some(2.5));
        assert_eq!(
            FieldValue::from("2024-01-02").as_date(),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(
            FieldValue::from("2024-01-02T03:04:05.000Z").as_datetime(),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
        assert!(FieldValue::from(None::<i64>).is_null());
        assert_eq!(FieldValue::Int(3).as_str(), None);
    }

    #[test]
    fn test_query_value_is_not_serializable() {
        let record = SObject::new("Account").with(
            "Contacts",
            FieldValue::Query(Box::new(QueryResult::default())),
        );
        let result = quick_xml::se::to_string_with_root(
            "create",
            &Create {
                s_objects: vec![record],
            },
        );
        assert!(result.is_err());
    }
}
