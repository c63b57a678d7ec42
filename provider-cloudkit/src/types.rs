//! CloudKit Web Services request and response types
//!
//! Data structures for the `records/query` and `records/lookup` endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `records/query` request body
///
/// See: CloudKit Web Services Reference, "Fetching Records Using a Query"
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: Query,

    pub results_limit: u32,

    pub desired_keys: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_marker: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub record_type: String,

    pub filter_by: Vec<Filter>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub field_name: String,

    pub comparator: Comparator,

    pub field_value: FieldValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparator {
    Equals,
    In,
}

/// Typed field value as CloudKit expects it in filters
#[derive(Debug, Serialize)]
pub struct FieldValue {
    pub value: Value,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

impl Filter {
    pub fn equals(field_name: &str, value: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            comparator: Comparator::Equals,
            field_value: FieldValue {
                value: Value::String(value.to_string()),
                value_type: Some("STRING".to_string()),
            },
        }
    }

    pub fn one_of(field_name: &str, values: &[String]) -> Self {
        Self {
            field_name: field_name.to_string(),
            comparator: Comparator::In,
            field_value: FieldValue {
                value: Value::Array(values.iter().cloned().map(Value::String).collect()),
                value_type: Some("STRING_LIST".to_string()),
            },
        }
    }
}

/// `records/query` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub records: Vec<Record>,

    /// Present when the result set was truncated
    #[serde(default)]
    pub continuation_marker: Option<String>,
}

/// `records/lookup` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub records: Vec<RecordRef>,

    pub desired_keys: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRef {
    pub record_name: String,
}

/// `records/lookup` response
#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub records: Vec<Record>,
}

/// A record as returned by query and lookup. Per-record failures come back
/// in the same list with `serverErrorCode` set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub record_name: Option<String>,

    #[serde(default)]
    pub fields: HashMap<String, Field>,

    #[serde(default)]
    pub server_error_code: Option<String>,

    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub value: Value,

    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
}

/// Value of an `ASSETID` field
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetValue {
    #[serde(rename = "downloadURL")]
    pub download_url: Option<String>,

    #[serde(default)]
    pub size: Option<u64>,

    #[serde(default)]
    pub file_checksum: Option<String>,
}

impl Record {
    pub fn is_error(&self) -> bool {
        self.server_error_code.is_some()
    }

    /// String value of a field, if present and a string
    pub fn string_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|field| field.value.as_str())
    }

    /// Signed download URL of an asset field, if present and well formed
    pub fn download_url(&self, asset_field: &str) -> Option<String> {
        let field = self.fields.get(asset_field)?;
        let asset: AssetValue = serde_json::from_value(field.value.clone()).ok()?;
        asset.download_url.filter(|url| !url.is_empty())
    }
}
