//! Relationship definitions between models.
//!
//! A relationship names its target by model path and is resolved lazily, so
//! it may point at a model that is declared later. Resolution validates the
//! column map against the target and caches a pointer to it.

use super::model::{ModelSchema, SchemaLink};
use super::registry::Registry;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// How many target rows a relationship yields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// At most one target row; read as a scalar lookup.
    Single,
    /// Zero or more target rows; read as a collection.
    #[default]
    Many,
}

/// One `local = target` equality of a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    /// Column on the declaring model.
    pub local: String,
    /// Column on the target model.
    pub target: String,
}

/// A named equality join from one model to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relationship name.
    pub name: String,
    /// Path of the target model.
    pub target: String,
    /// Column pairs, all of which must match (a single AND condition).
    pub columns: Vec<ColumnPair>,
    /// Relation cardinality.
    pub cardinality: Cardinality,
    #[serde(skip)]
    pub(crate) resolved: SchemaLink,
}

/// A relationship together with its resolved target.
#[derive(Debug, Clone)]
pub struct ResolvedRelation<'a> {
    /// The declared relationship.
    pub relation: &'a RelationDef,
    /// The target model.
    pub target: Arc<ModelSchema>,
}

/// Conjunctive join condition of a relationship.
#[derive(Debug, Clone, Copy)]
pub struct JoinCondition<'a> {
    pairs: &'a [ColumnPair],
}

impl RelationDef {
    /// Create a relationship to the model at `target`.
    pub fn new<L, T>(
        name: impl Into<String>,
        target: impl Into<String>,
        column_map: impl IntoIterator<Item = (L, T)>,
        cardinality: Cardinality,
    ) -> Self
    where
        L: Into<String>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            target: target.into(),
            columns: column_map
                .into_iter()
                .map(|(local, target)| ColumnPair {
                    local: local.into(),
                    target: target.into(),
                })
                .collect(),
            cardinality,
            resolved: SchemaLink::default(),
        }
    }

    /// Check if this relationship yields at most one row.
    pub fn is_single(&self) -> bool {
        self.cardinality == Cardinality::Single
    }

    /// Check if the join spans more than one column pair.
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }

    /// The join condition over all column pairs.
    pub fn join_condition(&self) -> JoinCondition<'_> {
        JoinCondition {
            pairs: &self.columns,
        }
    }

    /// Check if the target has already been resolved.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Resolve the target model and validate the column map against it.
    ///
    /// Resolution is memoized; later calls return the cached target without
    /// validating again.
    pub(crate) fn resolve(
        &self,
        origin: &ModelSchema,
        registry: &Registry,
    ) -> Result<Arc<ModelSchema>, Error> {
        if let Some(target) = self.resolved.get() {
            return Ok(target);
        }

        let target = registry
            .lookup_path(&self.target)
            .ok_or_else(|| Error::UnresolvedModel {
                model: origin.path().to_string(),
                reference: self.target.clone(),
                via: self.name.clone(),
            })?;

        for pair in &self.columns {
            let local = origin.field(&pair.local).ok_or_else(|| {
                Error::definition(format!(
                    "relationship {}.{}: unknown local column '{}'",
                    origin.path(),
                    self.name,
                    pair.local
                ))
            })?;
            let remote = target.field(&pair.target).ok_or_else(|| {
                Error::definition(format!(
                    "relationship {}.{}: target {} has no column '{}'",
                    origin.path(),
                    self.name,
                    target.path(),
                    pair.target
                ))
            })?;

            if local.field_type != remote.field_type {
                return Err(Error::RelationshipTypeMismatch {
                    model: origin.path().to_string(),
                    relation: self.name.clone(),
                    local_column: local.name.clone(),
                    local_type: local.storage_type(),
                    target: target.path().to_string(),
                    target_column: remote.name.clone(),
                    target_type: remote.storage_type(),
                });
            }
        }

        debug!(
            model = origin.path(),
            relation = %self.name,
            target = target.path(),
            "Resolved relationship"
        );
        self.resolved.set(&target);
        Ok(target)
    }
}

impl<'a> ResolvedRelation<'a> {
    /// Column name pairs of the join, using the target's column names.
    pub fn join_columns(&self) -> Vec<(&'a str, &str)> {
        self.relation
            .columns
            .iter()
            .map(|pair| {
                let target = self
                    .target
                    .field(&pair.target)
                    .map(|f| f.name.as_str())
                    .unwrap_or(pair.target.as_str());
                (pair.local.as_str(), target)
            })
            .collect()
    }
}

impl<'a> JoinCondition<'a> {
    /// The column pairs, in declaration order.
    pub fn pairs(&self) -> &'a [ColumnPair] {
        self.pairs
    }

    /// Number of equalities in the condition.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if the condition has no equalities.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render the condition with table qualifiers.
    pub fn render(&self, local_table: &str, target_table: &str) -> String {
        self.pairs
            .iter()
            .map(|p| format!("{local_table}.{} = {target_table}.{}", p.local, p.target))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

impl fmt::Display for JoinCondition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .pairs
            .iter()
            .map(|p| format!("{} = {}", p.local, p.target))
            .collect();
        write!(f, "{}", parts.join(" AND "))
    }
}
