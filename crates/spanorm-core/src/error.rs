//! Core error types.

use thiserror::Error;

/// Schema catalog errors.
///
/// Every variant is raised at definition or resolution time; nothing in this
/// crate talks to the database.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed field, index or model declaration.
    #[error("definition error: {0}")]
    Definition(String),

    /// A model reference that was never satisfied.
    #[error("unresolved model '{reference}' referenced by {model}.{via}")]
    UnresolvedModel {
        /// Path or table name of the model holding the reference.
        model: String,
        /// The reference that could not be resolved.
        reference: String,
        /// Relationship name, or `interleaved_in` for a parent reference.
        via: String,
    },

    /// Lookup of a table that is not registered.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// Joined columns of a relationship disagree in type.
    #[error(
        "relationship {model}.{relation}: column '{local_column}' ({local_type}) does not match \
         {target}.{target_column} ({target_type})"
    )]
    RelationshipTypeMismatch {
        /// Model declaring the relationship.
        model: String,
        /// Relationship name.
        relation: String,
        /// Local column of the offending pair.
        local_column: String,
        /// Storage type of the local column.
        local_type: String,
        /// Target model path.
        target: String,
        /// Target column of the offending pair.
        target_column: String,
        /// Storage type of the target column.
        target_type: String,
    },

    /// Interleaved child violates the parent key-prefix rule.
    #[error("table {child} interleaved in {parent}, column '{column}': expected {expected}, found {actual}")]
    Interleaving {
        /// Child table.
        child: String,
        /// Parent table.
        parent: String,
        /// Offending column.
        column: String,
        /// What the parent requires at this position.
        expected: String,
        /// What the child declares instead.
        actual: String,
    },

    /// A value does not satisfy its column definition.
    #[error("invalid value for column '{column}': {message}")]
    InvalidValue {
        /// Column name.
        column: String,
        /// Description of the violation.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn definition(message: impl Into<String>) -> Self {
        Error::Definition(message.into())
    }

    pub(crate) fn invalid_value(column: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidValue {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is a definition error.
    pub fn is_definition(&self) -> bool {
        matches!(self, Error::Definition(_))
    }

    /// Check if this is an unresolved model reference.
    pub fn is_unresolved_model(&self) -> bool {
        matches!(self, Error::UnresolvedModel { .. })
    }

    /// Check if this is a relationship type mismatch.
    pub fn is_relationship_type_mismatch(&self) -> bool {
        matches!(self, Error::RelationshipTypeMismatch { .. })
    }

    /// Check if this is an interleaving violation.
    pub fn is_interleaving(&self) -> bool {
        matches!(self, Error::Interleaving { .. })
    }
}
