//! Column type definitions.

use crate::config::{MAX_BYTES_LENGTH, MAX_STRING_LENGTH};
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar column types supported by Spanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// BOOL.
    Boolean,
    /// INT64.
    Integer,
    /// FLOAT64.
    Float,
    /// STRING, sized in characters.
    String,
    /// BYTES, sized in bytes.
    Bytes,
    /// TIMESTAMP, optionally assigned at commit time.
    Timestamp,
    /// DATE.
    Date,
    /// JSON.
    Json,
}

/// Column types - flat representation without recursion.
///
/// An array always wraps exactly one scalar type, so arrays of arrays
/// cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An array of scalar values.
    Array(ScalarType),
}

impl ScalarType {
    /// Storage name of this type.
    pub fn storage_name(&self) -> &'static str {
        match self {
            ScalarType::Boolean => "BOOL",
            ScalarType::Integer => "INT64",
            ScalarType::Float => "FLOAT64",
            ScalarType::String => "STRING",
            ScalarType::Bytes => "BYTES",
            ScalarType::Timestamp => "TIMESTAMP",
            ScalarType::Date => "DATE",
            ScalarType::Json => "JSON",
        }
    }

    /// Check if this type takes a size (`STRING(n)`, `BYTES(n)`).
    pub fn is_sized(&self) -> bool {
        matches!(self, ScalarType::String | ScalarType::Bytes)
    }

    /// Largest size the storage accepts for this type, if it is sized.
    pub fn max_size(&self) -> Option<u64> {
        match self {
            ScalarType::String => Some(MAX_STRING_LENGTH),
            ScalarType::Bytes => Some(MAX_BYTES_LENGTH),
            _ => None,
        }
    }
}

impl FieldType {
    pub const BOOL: FieldType = FieldType::Scalar(ScalarType::Boolean);
    pub const INTEGER: FieldType = FieldType::Scalar(ScalarType::Integer);
    pub const FLOAT: FieldType = FieldType::Scalar(ScalarType::Float);
    pub const STRING: FieldType = FieldType::Scalar(ScalarType::String);
    pub const BYTES: FieldType = FieldType::Scalar(ScalarType::Bytes);
    pub const TIMESTAMP: FieldType = FieldType::Scalar(ScalarType::Timestamp);
    pub const DATE: FieldType = FieldType::Scalar(ScalarType::Date);
    pub const JSON: FieldType = FieldType::Scalar(ScalarType::Json);

    pub const BOOL_ARRAY: FieldType = FieldType::Array(ScalarType::Boolean);
    pub const INTEGER_ARRAY: FieldType = FieldType::Array(ScalarType::Integer);
    pub const FLOAT_ARRAY: FieldType = FieldType::Array(ScalarType::Float);
    pub const STRING_ARRAY: FieldType = FieldType::Array(ScalarType::String);
    pub const BYTES_ARRAY: FieldType = FieldType::Array(ScalarType::Bytes);
    pub const TIMESTAMP_ARRAY: FieldType = FieldType::Array(ScalarType::Timestamp);
    pub const DATE_ARRAY: FieldType = FieldType::Array(ScalarType::Date);

    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an array of scalars field type.
    pub fn array(scalar: ScalarType) -> Self {
        FieldType::Array(scalar)
    }

    /// Wrap an existing field type in an array, rejecting nested arrays.
    pub fn array_of(element: FieldType) -> Result<Self, Error> {
        match element {
            FieldType::Scalar(scalar) => Ok(FieldType::Array(scalar)),
            FieldType::Array(_) => Err(Error::definition(format!(
                "arrays of arrays are not supported: {}",
                element.storage_type(None)
            ))),
        }
    }

    /// Check if this type is an array.
    pub fn is_array(&self) -> bool {
        matches!(self, FieldType::Array(_))
    }

    /// Get the scalar (element) type.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            FieldType::Scalar(s) | FieldType::Array(s) => *s,
        }
    }

    /// Check if a `size` option is meaningful for this type.
    pub fn supports_size(&self) -> bool {
        self.scalar_type().is_sized()
    }

    /// Check if this type may hold server-assigned commit timestamps.
    pub fn supports_commit_timestamp(&self) -> bool {
        *self == FieldType::TIMESTAMP
    }

    /// Canonical storage representation, e.g. `STRING(MAX)` or `ARRAY<BYTES(64)>`.
    ///
    /// Sized types without an explicit size render as `MAX`.
    pub fn storage_type(&self, size: Option<u64>) -> String {
        let scalar = self.scalar_type();
        let base = if scalar.is_sized() {
            match size {
                Some(n) => format!("{}({})", scalar.storage_name(), n),
                None => format!("{}(MAX)", scalar.storage_name()),
            }
        } else {
            scalar.storage_name().to_string()
        };

        match self {
            FieldType::Scalar(_) => base,
            FieldType::Array(_) => format!("ARRAY<{base}>"),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_type(None))
    }
}
