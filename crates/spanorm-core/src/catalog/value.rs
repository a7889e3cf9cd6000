//! Column values checked against field definitions.

use super::types::ScalarType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A column value as handed to or returned by the query layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Point in time, UTC.
    Timestamp(DateTime<Utc>),
    /// Calendar date.
    Date(NaiveDate),
    /// JSON document.
    Json(serde_json::Value),
    /// Array of values; elements may be null but not arrays.
    Array(Vec<Value>),
    /// Placeholder the database replaces with the commit timestamp.
    CommitTimestamp,
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Scalar type this value belongs to, if it is a non-null scalar.
    ///
    /// The commit timestamp placeholder reports `Timestamp`.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Value::Bool(_) => Some(ScalarType::Boolean),
            Value::Int(_) => Some(ScalarType::Integer),
            Value::Float(_) => Some(ScalarType::Float),
            Value::String(_) => Some(ScalarType::String),
            Value::Bytes(_) => Some(ScalarType::Bytes),
            Value::Timestamp(_) | Value::CommitTimestamp => Some(ScalarType::Timestamp),
            Value::Date(_) => Some(ScalarType::Date),
            Value::Json(_) => Some(ScalarType::Json),
            Value::Null | Value::Array(_) => None,
        }
    }

    /// Length used for size checks: characters for strings, bytes for bytes.
    pub fn sized_len(&self) -> Option<u64> {
        match self {
            Value::String(s) => Some(s.chars().count() as u64),
            Value::Bytes(b) => Some(b.len() as u64),
            _ => None,
        }
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::CommitTimestamp => "COMMIT_TIMESTAMP",
            other => other
                .scalar_type()
                .map(|s| s.storage_name())
                .unwrap_or("UNKNOWN"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
