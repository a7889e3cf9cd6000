//! Schema catalog for spanorm.
//!
//! The catalog holds field types, model schemas, indexes, relationships and
//! the registry that resolves references between models.

mod field;
mod index;
mod interleave;
mod model;
mod naming;
mod registry;
mod relation;
mod snapshot;
mod types;
mod value;

pub use field::{make_field, make_field_with_config, FieldDef, FieldOptions};
pub use index::{
    compile_index, default_index_name, IndexColumn, IndexDef, IndexOptions, OrderDirection,
};
pub use interleave::validate_interleaving;
pub use model::{ModelBuilder, ModelSchema};
pub use registry::{new_shared_registry, Registry, SharedRegistry};
pub use relation::{Cardinality, ColumnPair, JoinCondition, RelationDef, ResolvedRelation};
pub use snapshot::{SchemaSnapshot, SnapshotDiff};
pub use types::{FieldType, ScalarType};
pub use value::Value;
