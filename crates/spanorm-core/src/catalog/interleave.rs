//! Interleaved table validation.
//!
//! A child table interleaved in a parent must start its primary key with the
//! parent's primary key: same column names, order, types and nullability.

use super::field::FieldDef;
use super::model::ModelSchema;
use super::registry::Registry;
use crate::error::Error;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validate `child` against its interleave parent and return the parent.
///
/// Returns `Ok(None)` for tables that are not interleaved. A successful
/// check is cached on the child.
pub fn validate_interleaving(
    child: &ModelSchema,
    registry: &Registry,
) -> Result<Option<Arc<ModelSchema>>, Error> {
    let Some(parent_table) = child.interleaved_in() else {
        return Ok(None);
    };
    if let Some(parent) = child.cached_parent() {
        return Ok(Some(parent));
    }

    let parent = registry
        .lookup_table(parent_table)
        .ok_or_else(|| Error::UnresolvedModel {
            model: child.display_name().to_string(),
            reference: parent_table.to_string(),
            via: "interleaved_in".to_string(),
        })?;

    let parent_keys = parent.primary_key_fields();
    let child_keys = child.primary_key_fields();
    let violation = |column: &str, expected: String, actual: String| Error::Interleaving {
        child: child.display_name().to_string(),
        parent: parent_table.to_string(),
        column: column.to_string(),
        expected,
        actual,
    };

    for (position, expected) in parent_keys.iter().enumerate() {
        match child_keys.get(position) {
            None => {
                return Err(violation(
                    &expected.name,
                    describe_key(position, expected),
                    format!("no key column at position {position}"),
                ));
            }
            Some(actual) if !same_key_column(expected, actual) => {
                return Err(violation(
                    &actual.name,
                    describe_key(position, expected),
                    describe_key(position, actual),
                ));
            }
            Some(_) => {}
        }
    }

    if child_keys.len() == parent_keys.len() {
        let column = child_keys.last().map(|f| f.name.as_str()).unwrap_or_default();
        if !registry.config().allow_shadow_tables {
            return Err(violation(
                column,
                "at least one key column after the parent key".to_string(),
                "none (1:1 shadow table)".to_string(),
            ));
        }
        warn!(
            child = child.display_name(),
            parent = parent_table,
            "Interleaved table adds no key column (1:1 shadow table)"
        );
    }

    validate_chain(child, registry)?;

    debug!(
        child = child.display_name(),
        parent = parent_table,
        "Validated interleaving"
    );
    child.cache_parent(&parent);
    Ok(Some(parent))
}

/// Check that the ancestor chain of `child` is acyclic and within the
/// configured depth.
fn validate_chain(child: &ModelSchema, registry: &Registry) -> Result<(), Error> {
    let max_depth = registry.config().max_interleave_depth;
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(child.display_name().to_string());

    let mut depth = 1;
    let mut referrer = child.display_name().to_string();
    let mut current = child.interleaved_in().map(str::to_string);
    while let Some(table) = current {
        if !visited.insert(table.clone()) {
            return Err(Error::definition(format!(
                "table {} is part of an interleaving cycle through {table}",
                child.display_name()
            )));
        }
        depth += 1;
        if depth > max_depth {
            return Err(Error::definition(format!(
                "table {} is interleaved {depth} levels deep, max {max_depth}",
                child.display_name()
            )));
        }
        let ancestor = registry
            .lookup_table(&table)
            .ok_or_else(|| Error::UnresolvedModel {
                model: referrer.clone(),
                reference: table.clone(),
                via: "interleaved_in".to_string(),
            })?;
        current = ancestor.interleaved_in().map(str::to_string);
        referrer = table;
    }

    Ok(())
}

fn same_key_column(expected: &FieldDef, actual: &FieldDef) -> bool {
    expected.name == actual.name
        && expected.field_type == actual.field_type
        && expected.size == actual.size
        && expected.nullable == actual.nullable
}

fn describe_key(position: usize, field: &FieldDef) -> String {
    format!("key column {position} '{}' {}", field.name, field.describe())
}
