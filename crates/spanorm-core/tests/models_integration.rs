//! Integration tests for model declaration, registration and resolution.

use spanorm_core::catalog::default_index_name;
use spanorm_core::{
    Cardinality, Error, FieldOptions, FieldType, IndexOptions, ModelSchema, OrderDirection,
    Registry, SchemaConfig, Value,
};
use std::collections::HashMap;

fn small_test_model() -> ModelSchema {
    ModelSchema::builder("models::SmallTestModel")
        .table("SmallTestModel")
        .field("key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("value_1", FieldType::STRING, FieldOptions::new())
        .field("value_2", FieldType::STRING, FieldOptions::new().nullable())
        .field("key2", FieldType::STRING, FieldOptions::new().nullable())
        .index("index_1", ["value_1"], IndexOptions::new())
        .build()
        .unwrap()
}

fn small_test_parent_model() -> ModelSchema {
    ModelSchema::builder("models::SmallTestParentModel")
        .table("SmallTestParentModel")
        .field("key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("value_1", FieldType::STRING, FieldOptions::new())
        .field("value_2", FieldType::STRING, FieldOptions::new().nullable())
        .index("index_1", ["value_1"], IndexOptions::new())
        .relation(
            "children",
            "models::ChildTestModel",
            [("key", "key")],
            Cardinality::Many,
        )
        .build()
        .unwrap()
}

fn child_test_model() -> ModelSchema {
    ModelSchema::builder("models::ChildTestModel")
        .table("ChildTestModel")
        .interleaved_in("SmallTestParentModel")
        .field("key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("child_key", FieldType::STRING, FieldOptions::new().primary_key())
        .build()
        .unwrap()
}

fn index_test_model() -> ModelSchema {
    ModelSchema::builder("models::IndexTestModel")
        .table("IndexTestModel")
        .field("key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("value", FieldType::STRING, FieldOptions::new())
        .index("value_idx", ["value"], IndexOptions::new().name("value"))
        .index(
            "value_idx2",
            ["value"],
            IndexOptions::new().name("value_desc").order("value", false),
        )
        .build()
        .unwrap()
}

fn field_custom_name_test_model() -> ModelSchema {
    ModelSchema::builder("models::FieldCustomNameTestModel")
        .table("FieldCustomNameTestModel")
        .field(
            "key",
            FieldType::STRING,
            FieldOptions::new().primary_key().name("key2"),
        )
        .build()
        .unwrap()
}

fn relationship_test_model() -> ModelSchema {
    ModelSchema::builder("models::RelationshipTestModel")
        .table("RelationshipTestModel")
        .field("parent_key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("child_key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("parent_key2", FieldType::STRING, FieldOptions::new().nullable())
        .relation(
            "parent",
            "models::SmallTestModel",
            [("parent_key", "key")],
            Cardinality::Single,
        )
        .relation(
            "parents",
            "models::SmallTestModel",
            [("parent_key", "key")],
            Cardinality::Many,
        )
        .relation(
            "fk_multicolumn",
            "models::SmallTestModel",
            [("parent_key", "key"), ("parent_key2", "key2")],
            Cardinality::Many,
        )
        .build()
        .unwrap()
}

fn nullable() -> FieldOptions {
    FieldOptions::new().nullable()
}

fn unittest_model() -> ModelSchema {
    ModelSchema::builder("models::UnittestModel")
        .table("table")
        .field("int_", FieldType::INTEGER, FieldOptions::new().primary_key())
        .field("int_2", FieldType::INTEGER, nullable())
        .field("float_", FieldType::FLOAT, FieldOptions::new().primary_key())
        .field("float_2", FieldType::FLOAT, nullable())
        .field("string", FieldType::STRING, FieldOptions::new().primary_key())
        .field("string_2", FieldType::STRING, nullable())
        .field(
            "string_3",
            FieldType::STRING,
            FieldOptions::new().nullable().size(10),
        )
        .field("timestamp", FieldType::TIMESTAMP, FieldOptions::new())
        .field(
            "timestamp_2",
            FieldType::TIMESTAMP,
            FieldOptions::new().nullable().allow_commit_timestamp(),
        )
        .field("date", FieldType::DATE, nullable())
        .field("bytes_", FieldType::BYTES, nullable())
        .field(
            "bytes_2",
            FieldType::BYTES,
            FieldOptions::new().nullable().size(2048),
        )
        .field("json", FieldType::JSON, nullable())
        .field("bool_array", FieldType::BOOL_ARRAY, nullable())
        .field("int_array", FieldType::INTEGER_ARRAY, nullable())
        .field("float_array", FieldType::FLOAT_ARRAY, nullable())
        .field("date_array", FieldType::DATE_ARRAY, nullable())
        .field("string_array", FieldType::STRING_ARRAY, nullable())
        .field(
            "string_array_2",
            FieldType::STRING_ARRAY,
            FieldOptions::new().nullable().size(50),
        )
        .index("test_index", ["string_2"], IndexOptions::new())
        .build()
        .unwrap()
}

fn full_registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register_all([
            small_test_model(),
            small_test_parent_model(),
            child_test_model(),
            index_test_model(),
            field_custom_name_test_model(),
            relationship_test_model(),
            unittest_model(),
        ])
        .unwrap();
    registry
}

#[test]
fn test_primary_key_columns_listed_first() {
    let model = unittest_model();

    let columns = model.columns();
    assert_eq!(&columns[..3], &["int_", "float_", "string"]);
    assert_eq!(columns[3], "int_2");
    assert_eq!(model.primary_keys(), vec!["int_", "float_", "string"]);
    assert_eq!(columns.len(), 19);
}

#[test]
fn test_column_storage_types() {
    let model = unittest_model();

    assert_eq!(model.column("string_3").unwrap().storage_type(), "STRING(10)");
    assert_eq!(model.column("string_2").unwrap().storage_type(), "STRING(MAX)");
    assert_eq!(model.column("bytes_2").unwrap().storage_type(), "BYTES(2048)");
    assert_eq!(
        model.column("string_array_2").unwrap().storage_type(),
        "ARRAY<STRING(50)>"
    );
    assert_eq!(
        model.column("timestamp_2").unwrap().describe(),
        "TIMESTAMP OPTIONS (allow_commit_timestamp=true)"
    );
    assert_eq!(
        model.column("int_").unwrap().describe(),
        "INT64 NOT NULL"
    );
}

#[test]
fn test_inheritance_appends_after_parent_fields() {
    let child = ModelSchema::builder("models::InheritanceTestModel")
        .extends(&small_test_model())
        .field("value_3", FieldType::STRING, FieldOptions::new().nullable())
        .build()
        .unwrap();

    assert_eq!(child.table(), Some("SmallTestModel"));
    assert_eq!(
        child.columns(),
        vec!["key", "value_1", "value_2", "key2", "value_3"]
    );
    assert_eq!(child.index("index_1").unwrap().name(), Some("idx_SmallTestModel_value_1"));
}

#[test]
fn test_inherited_model_registers_under_own_table() {
    let child = ModelSchema::builder("models::InheritanceTestModel")
        .extends(&small_test_model())
        .table("InheritanceTestModel")
        .field("value_3", FieldType::STRING, FieldOptions::new().nullable())
        .build()
        .unwrap();

    let mut registry = full_registry();
    registry.register(child).unwrap();
    registry.finalize().unwrap();

    let schema = registry.get_schema("InheritanceTestModel").unwrap();
    assert_eq!(
        schema.index("index_1").unwrap().name(),
        Some("idx_InheritanceTestModel_value_1")
    );
}

#[test]
fn test_nullable_primary_key_rejected() {
    let err = ModelSchema::builder("models::Bad")
        .table("Bad")
        .field(
            "key",
            FieldType::STRING,
            FieldOptions::new().primary_key().nullable(),
        )
        .build()
        .unwrap_err();
    assert!(err.is_definition());
}

#[test]
fn test_size_on_unsized_type_rejected() {
    let err = ModelSchema::builder("models::Bad")
        .table("Bad")
        .field("key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("created", FieldType::TIMESTAMP, FieldOptions::new().size(10))
        .build()
        .unwrap_err();
    assert!(err.is_definition());
}

#[test]
fn test_commit_timestamp_on_non_timestamp_rejected() {
    let err = ModelSchema::builder("models::Bad")
        .table("Bad")
        .field("key", FieldType::STRING, FieldOptions::new().primary_key())
        .field(
            "value",
            FieldType::STRING,
            FieldOptions::new().allow_commit_timestamp(),
        )
        .build()
        .unwrap_err();
    assert!(err.is_definition());
}

#[test]
fn test_default_index_name_is_deterministic() {
    let first = unittest_model();
    let second = unittest_model();

    assert_eq!(first.index("test_index").unwrap().name(), Some("idx_table_string_2"));
    assert_eq!(
        first.index("test_index").unwrap().name(),
        second.index("test_index").unwrap().name()
    );

    let long_table = "T".repeat(120);
    let a = default_index_name(&long_table, &["first_column", "second_column"], 128);
    let b = default_index_name(&long_table, &["first_column", "second_column"], 128);
    let c = default_index_name(&long_table, &["first_column", "other_column"], 128);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.len() <= 128);
}

#[test]
fn test_index_ordering() {
    let model = index_test_model();

    let ascending = model.index("value").unwrap();
    assert_eq!(ascending.columns[0].direction, OrderDirection::Asc);

    let descending = model.index("value_desc").unwrap();
    assert_eq!(descending.columns[0].direction, OrderDirection::Desc);
    assert_eq!(descending.attribute, "value_idx2");
}

#[test]
fn test_custom_column_name() {
    let model = field_custom_name_test_model();

    assert_eq!(model.columns(), vec!["key2"]);
    assert_eq!(model.primary_keys(), vec!["key2"]);
    assert!(model.field("key").unwrap().has_custom_name());
}

#[test]
fn test_forward_reference_resolves_at_finalize() {
    let mut registry = Registry::new();
    registry.register(small_test_parent_model()).unwrap();

    match registry.finalize() {
        Err(Error::UnresolvedModel { reference, via, .. }) => {
            assert_eq!(reference, "models::ChildTestModel");
            assert_eq!(via, "children");
        }
        other => panic!("Expected unresolved model, got {other:?}"),
    }

    registry.register(child_test_model()).unwrap();
    registry.finalize().unwrap();

    let parent = registry.get_schema("SmallTestParentModel").unwrap();
    let resolved = registry.resolve_relationship(&parent, "children").unwrap();
    assert_eq!(resolved.target.table(), Some("ChildTestModel"));
    assert!(!resolved.relation.is_single());
}

#[test]
fn test_relationship_cardinality() {
    let mut registry = full_registry();
    registry.finalize().unwrap();
    let model = registry.get_schema("RelationshipTestModel").unwrap();

    let single = registry.resolve_relationship(&model, "parent").unwrap();
    assert!(single.relation.is_single());
    assert_eq!(single.target.table(), Some("SmallTestModel"));

    let many = registry.resolve_relationship(&model, "parents").unwrap();
    assert!(!many.relation.is_single());
}

#[test]
fn test_composite_relationship_join() {
    let mut registry = full_registry();
    registry.finalize().unwrap();
    let model = registry.get_schema("RelationshipTestModel").unwrap();

    let resolved = registry
        .resolve_relationship(&model, "fk_multicolumn")
        .unwrap();
    assert!(resolved.relation.is_composite());
    assert_eq!(
        resolved.join_columns(),
        vec![("parent_key", "key"), ("parent_key2", "key2")]
    );
    assert_eq!(
        resolved
            .relation
            .join_condition()
            .render("RelationshipTestModel", "SmallTestModel"),
        "RelationshipTestModel.parent_key = SmallTestModel.key AND \
         RelationshipTestModel.parent_key2 = SmallTestModel.key2"
    );
}

#[test]
fn test_relationship_type_mismatch() {
    let mismatched = ModelSchema::builder("models::Mismatched")
        .table("Mismatched")
        .field("id", FieldType::INTEGER, FieldOptions::new().primary_key())
        .relation(
            "small",
            "models::SmallTestModel",
            [("id", "key")],
            Cardinality::Single,
        )
        .build()
        .unwrap();

    let mut registry = full_registry();
    registry.register(mismatched).unwrap();

    let err = registry.finalize().unwrap_err();
    assert!(err.is_relationship_type_mismatch());
    assert!(!registry.is_finalized());
    assert!(registry.get_schema("Mismatched").is_err());
}

#[test]
fn test_composite_relationship_type_mismatch() {
    let mismatched = ModelSchema::builder("models::CompositeMismatch")
        .table("CompositeMismatch")
        .field("parent_key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("value_int", FieldType::INTEGER, FieldOptions::new().nullable())
        .relation(
            "fk_multicolumn",
            "models::SmallTestModel",
            [("parent_key", "key"), ("value_int", "key2")],
            Cardinality::Many,
        )
        .build()
        .unwrap();

    let mut registry = full_registry();
    registry.register(mismatched).unwrap();

    match registry.finalize().unwrap_err() {
        Error::RelationshipTypeMismatch {
            local_column,
            target_column,
            ..
        } => {
            assert_eq!(local_column, "value_int");
            assert_eq!(target_column, "key2");
        }
        other => panic!("Expected relationship type mismatch, got {other:?}"),
    }
}

#[test]
fn test_relationship_to_missing_target_column() {
    let broken = ModelSchema::builder("models::Broken")
        .table("Broken")
        .field("id", FieldType::STRING, FieldOptions::new().primary_key())
        .relation(
            "small",
            "models::SmallTestModel",
            [("id", "no_such_column")],
            Cardinality::Single,
        )
        .build()
        .unwrap();

    let mut registry = full_registry();
    registry.register(broken).unwrap();
    assert!(registry.finalize().unwrap_err().is_definition());
}

#[test]
fn test_interleaved_parent_end_to_end() {
    let mut registry = full_registry();
    registry.finalize().unwrap();

    let child = registry.get_schema("ChildTestModel").unwrap();
    let parent = registry.parent_of(&child).unwrap().unwrap();
    assert_eq!(parent.table(), Some("SmallTestParentModel"));

    let small = registry.get_schema("SmallTestModel").unwrap();
    assert!(registry.parent_of(&small).unwrap().is_none());

    let children = registry.children_of("SmallTestParentModel");
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].path(), "models::ChildTestModel");
}

#[test]
fn test_interleaved_wrong_key_order_then_corrected() {
    let wrong = ModelSchema::builder("models::ChildTestModel")
        .table("ChildTestModel")
        .interleaved_in("SmallTestParentModel")
        .field("child_key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("key", FieldType::STRING, FieldOptions::new().primary_key())
        .build()
        .unwrap();

    let mut registry = Registry::new();
    registry
        .register_all([small_test_parent_model(), wrong])
        .unwrap();

    let err = registry.finalize().unwrap_err();
    assert!(err.is_interleaving());
    assert!(registry.get_schema("ChildTestModel").is_err());
    assert!(registry.get_schema("SmallTestParentModel").is_err());

    registry.register(child_test_model()).unwrap();
    registry.finalize().unwrap();

    let child = registry.get_schema("ChildTestModel").unwrap();
    assert_eq!(child.primary_keys(), vec!["key", "child_key"]);
    let parent = registry.parent_of(&child).unwrap().unwrap();
    assert_eq!(parent.table(), Some("SmallTestParentModel"));
    assert!(registry
        .get_schema("SmallTestParentModel")
        .unwrap()
        .relation("children")
        .unwrap()
        .is_resolved());
}

#[test]
fn test_interleave_depth_configurable() {
    let grandchild = ModelSchema::builder("models::GrandChild")
        .table("GrandChild")
        .interleaved_in("ChildTestModel")
        .field("key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("child_key", FieldType::STRING, FieldOptions::new().primary_key())
        .field("leaf", FieldType::INTEGER, FieldOptions::new().primary_key())
        .build()
        .unwrap();
    let models = || {
        [
            small_test_parent_model(),
            child_test_model(),
            grandchild.clone(),
        ]
    };

    let mut registry = Registry::new();
    registry.register_all(models()).unwrap();
    registry.finalize().unwrap();

    let mut shallow = Registry::with_config(SchemaConfig::new().with_max_interleave_depth(2));
    shallow.register_all(models()).unwrap();
    assert!(shallow.finalize().unwrap_err().is_definition());
}

#[test]
fn test_row_validation() {
    let model = unittest_model();
    let mut row: HashMap<String, Value> = HashMap::new();
    row.insert("int_".into(), Value::Int(1));
    row.insert("float_".into(), Value::Float(2.5));
    row.insert("string".into(), Value::from("key"));
    row.insert("timestamp".into(), Value::CommitTimestamp);
    // timestamp does not allow commit timestamps
    assert!(model.validate_row(&row).is_err());

    row.insert("timestamp".into(), Value::Timestamp(chrono::Utc::now()));
    row.insert("timestamp_2".into(), Value::CommitTimestamp);
    assert!(model.validate_row(&row).is_ok());

    row.insert("string_3".into(), Value::from("x".repeat(11)));
    assert!(model.validate_row(&row).is_err());
    row.insert("string_3".into(), Value::from("x".repeat(10)));

    row.insert(
        "string_array_2".into(),
        Value::Array(vec![Value::from("ok"), Value::from("y".repeat(51))]),
    );
    assert!(model.validate_row(&row).is_err());
    row.insert("string_array_2".into(), Value::Array(vec![Value::from("ok")]));
    assert!(model.validate_row(&row).is_ok());

    assert_eq!(
        model.key_values(&row).unwrap(),
        vec![Value::Int(1), Value::Float(2.5), Value::from("key")]
    );
}

#[test]
fn test_snapshot_stable_across_builds() {
    let mut first = full_registry();
    first.finalize().unwrap();
    let mut second = full_registry();
    second.finalize().unwrap();

    let a = first.snapshot();
    let b = second.snapshot();
    assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    assert_eq!(a.tables.len(), 7);
    assert!(a.table("table").is_some());
}
