//! spanorm core - declarative schema catalog for Cloud Spanner models.
//!
//! Models are declared with [`ModelSchema::builder`], registered in a
//! [`Registry`], and finalized once every model is known:
//!
//! ```ignore
//! use spanorm_core::{Cardinality, FieldOptions, FieldType, ModelSchema, Registry};
//!
//! let parent = ModelSchema::builder("models::Parent")
//!     .table("Parent")
//!     .field("key", FieldType::STRING, FieldOptions::new().primary_key())
//!     .relation("children", "models::Child", [("key", "key")], Cardinality::Many)
//!     .build()?;
//! let child = ModelSchema::builder("models::Child")
//!     .table("Child")
//!     .interleaved_in("Parent")
//!     .field("key", FieldType::STRING, FieldOptions::new().primary_key())
//!     .field("child_key", FieldType::STRING, FieldOptions::new().primary_key())
//!     .build()?;
//!
//! let mut registry = Registry::new();
//! registry.register(parent)?;
//! registry.register(child)?;
//! registry.finalize()?;
//! ```

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{
    compile_index, make_field, make_field_with_config, new_shared_registry,
    validate_interleaving, Cardinality, FieldDef, FieldOptions, FieldType, IndexColumn,
    IndexDef, IndexOptions, JoinCondition, ModelBuilder, ModelSchema, OrderDirection,
    Registry, RelationDef, ResolvedRelation, ScalarType, SchemaSnapshot, SharedRegistry,
    SnapshotDiff, Value,
};
pub use config::SchemaConfig;
pub use error::Error;
