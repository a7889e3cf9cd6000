//! Field definitions for models.

use super::naming::validate_identifier;
use super::types::{FieldType, ScalarType};
use super::value::Value;
use crate::config::SchemaConfig;
use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Options accepted when declaring a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// Part of the primary key.
    pub primary_key: bool,
    /// Column accepts NULL.
    pub nullable: bool,
    /// Column name overriding the declared attribute name.
    pub name: Option<String>,
    /// Maximum size for STRING (characters) and BYTES (bytes) columns.
    pub size: Option<u64>,
    /// TIMESTAMP column may be set to the commit timestamp.
    pub allow_commit_timestamp: bool,
}

impl FieldOptions {
    /// Options for a plain non-nullable column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Allow NULL values.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Override the column name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the maximum size.
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Allow the commit timestamp placeholder.
    pub fn allow_commit_timestamp(mut self) -> Self {
        self.allow_commit_timestamp = true;
        self
    }
}

/// A column of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Attribute the field was declared under.
    pub attribute: String,
    /// Column name.
    pub name: String,
    /// Column type.
    pub field_type: FieldType,
    /// Maximum size; `None` means MAX.
    pub size: Option<u64>,
    /// Commit timestamps may be written to this column.
    pub allow_commit_timestamp: bool,
    /// Column accepts NULL.
    pub nullable: bool,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Declaration position within the owning model.
    pub position: usize,
}

/// Build a field definition declared under `attribute` with the default
/// configuration.
pub fn make_field(
    attribute: impl Into<String>,
    field_type: FieldType,
    options: FieldOptions,
) -> Result<FieldDef, Error> {
    make_field_with_config(attribute, field_type, options, &SchemaConfig::default())
}

/// Build a field definition, checking the column name against `config`.
pub fn make_field_with_config(
    attribute: impl Into<String>,
    field_type: FieldType,
    options: FieldOptions,
    config: &SchemaConfig,
) -> Result<FieldDef, Error> {
    let attribute = attribute.into();
    let name = options.name.unwrap_or_else(|| attribute.clone());
    validate_identifier("column", &name, config.max_identifier_len)?;

    if options.primary_key && options.nullable {
        return Err(Error::definition(format!(
            "field '{attribute}': a primary key field cannot be nullable"
        )));
    }

    if let Some(size) = options.size {
        let scalar = field_type.scalar_type();
        let Some(limit) = scalar.max_size() else {
            return Err(Error::definition(format!(
                "field '{attribute}': size is not supported for {field_type}"
            )));
        };
        if size == 0 || size > limit {
            return Err(Error::definition(format!(
                "field '{attribute}': size {size} out of range 1..={limit} for {}",
                scalar.storage_name()
            )));
        }
    }

    if options.allow_commit_timestamp && !field_type.supports_commit_timestamp() {
        return Err(Error::definition(format!(
            "field '{attribute}': allow_commit_timestamp requires TIMESTAMP, found {field_type}"
        )));
    }

    Ok(FieldDef {
        attribute,
        name,
        field_type,
        size: options.size,
        allow_commit_timestamp: options.allow_commit_timestamp,
        nullable: options.nullable,
        primary_key: options.primary_key,
        position: 0,
    })
}

impl FieldDef {
    /// Canonical storage type, e.g. `STRING(10)`.
    pub fn storage_type(&self) -> String {
        self.field_type.storage_type(self.size)
    }

    /// Storage type with nullability, e.g. `STRING(MAX) NOT NULL`.
    pub fn describe(&self) -> String {
        let mut out = self.storage_type();
        if !self.nullable {
            out.push_str(" NOT NULL");
        }
        if self.allow_commit_timestamp {
            out.push_str(" OPTIONS (allow_commit_timestamp=true)");
        }
        out
    }

    /// Check if the column was renamed from its attribute.
    pub fn has_custom_name(&self) -> bool {
        self.name != self.attribute
    }

    /// Check a value against this column's type, size and nullability.
    pub fn validate(&self, value: &Value) -> Result<(), Error> {
        match (value, self.field_type) {
            (Value::Null, _) => {
                if self.nullable {
                    Ok(())
                } else {
                    Err(Error::invalid_value(&self.name, "NULL in non-nullable column"))
                }
            }
            (Value::CommitTimestamp, _) => {
                if self.allow_commit_timestamp {
                    Ok(())
                } else {
                    Err(Error::invalid_value(
                        &self.name,
                        "commit timestamp not allowed in this column",
                    ))
                }
            }
            (Value::Array(items), FieldType::Array(scalar)) => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    self.validate_element(scalar, item)?;
                }
                Ok(())
            }
            (other, FieldType::Scalar(scalar)) => self.validate_element(scalar, other),
            (other, FieldType::Array(_)) => Err(self.type_mismatch(other)),
        }
    }

    fn validate_element(&self, scalar: ScalarType, value: &Value) -> Result<(), Error> {
        if value.is_array() || matches!(value, Value::CommitTimestamp) {
            return Err(self.type_mismatch(value));
        }
        if value.scalar_type() != Some(scalar) {
            return Err(self.type_mismatch(value));
        }

        if let (Some(limit), Some(len)) = (self.size, value.sized_len()) {
            if len > limit {
                return Err(Error::invalid_value(
                    &self.name,
                    format!("length {len} exceeds size {limit}"),
                ));
            }
        }

        Ok(())
    }

    fn type_mismatch(&self, value: &Value) -> Error {
        Error::invalid_value(
            &self.name,
            format!("expected {}, found {}", self.storage_type(), value.kind_name()),
        )
    }
}
