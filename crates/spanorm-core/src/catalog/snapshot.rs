//! Schema snapshot - serializable copy of every registered table.
//!
//! Snapshots are used to compare the schema graph across builds; default
//! index names are deterministic so identical declarations produce identical
//! snapshots.

use super::model::ModelSchema;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable copy of the registered schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Schemas keyed by table name.
    pub tables: BTreeMap<String, ModelSchema>,
}

/// Difference between two snapshots, by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    /// Tables only present in the newer snapshot.
    pub added: Vec<String>,
    /// Tables only present in the older snapshot.
    pub removed: Vec<String>,
    /// Tables present in both with different definitions.
    pub changed: Vec<String>,
}

impl SchemaSnapshot {
    /// Build a snapshot from table schemas; abstract schemas are skipped.
    pub fn new(schemas: impl IntoIterator<Item = ModelSchema>) -> Self {
        let tables = schemas
            .into_iter()
            .filter_map(|s| s.table().map(str::to_string).map(|t| (t, s)))
            .collect();
        Self { tables }
    }

    /// Get a table schema.
    pub fn table(&self, name: &str) -> Option<&ModelSchema> {
        self.tables.get(name)
    }

    /// Serialize the snapshot to JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Hex blake3 digest of the snapshot's compact JSON form.
    pub fn fingerprint(&self) -> Result<String, Error> {
        let bytes = serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    /// Compare against an older snapshot.
    pub fn diff_from(&self, older: &SchemaSnapshot) -> SnapshotDiff {
        let mut diff = SnapshotDiff::default();
        for (name, schema) in &self.tables {
            match older.tables.get(name) {
                None => diff.added.push(name.clone()),
                Some(previous) if previous != schema => diff.changed.push(name.clone()),
                Some(_) => {}
            }
        }
        for name in older.tables.keys() {
            if !self.tables.contains_key(name) {
                diff.removed.push(name.clone());
            }
        }
        diff
    }
}

impl SnapshotDiff {
    /// Check if there are any changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}
