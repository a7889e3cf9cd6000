//! Model registry.
//!
//! Models are registered with [`Registry::register`] into a pending set,
//! checked as a whole with [`Registry::finalize`], and only then become
//! queryable. A failed finalize commits nothing. Registration and
//! finalization take `&mut self`, so writes cannot overlap resolution.

use super::interleave::validate_interleaving;
use super::model::ModelSchema;
use super::relation::ResolvedRelation;
use super::snapshot::SchemaSnapshot;
use crate::config::SchemaConfig;
use crate::error::Error;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Registry of all queryable models, keyed by table name.
#[derive(Debug, Default)]
pub struct Registry {
    /// Limits applied during finalization.
    config: SchemaConfig,
    /// Finalized schemas keyed by table name.
    tables: BTreeMap<String, Arc<ModelSchema>>,
    /// Model path to table name, for finalized schemas.
    paths: HashMap<String, String>,
    /// Registered schemas waiting for the next finalize.
    pending: BTreeMap<String, Arc<ModelSchema>>,
    /// Model path to table name, for pending schemas.
    pending_paths: HashMap<String, String>,
    /// Set by a successful finalize, cleared by new registrations.
    finalized: bool,
}

/// Shared registry handle.
pub type SharedRegistry = Arc<RwLock<Registry>>;

/// Create a new shared registry.
pub fn new_shared_registry(config: SchemaConfig) -> SharedRegistry {
    Arc::new(RwLock::new(Registry::with_config(config)))
}

impl Registry {
    /// Create an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the given configuration.
    pub fn with_config(config: SchemaConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Register a model for the next finalize.
    ///
    /// Registering a schema identical to one already held under its table is
    /// a no-op and returns the existing entry. A pending schema with the same
    /// table or path is replaced. A different schema under the table or path
    /// of a finalized model is rejected.
    pub fn register(&mut self, schema: ModelSchema) -> Result<Arc<ModelSchema>, Error> {
        let Some(table) = schema.table().map(str::to_string) else {
            return Err(Error::definition(format!(
                "model {} has no table and cannot be registered",
                schema.path()
            )));
        };

        if let Some(existing) = self.tables.get(&table) {
            if existing.as_ref() == &schema {
                debug!(table = %table, "Model already registered");
                return Ok(Arc::clone(existing));
            }
            return Err(Error::definition(format!(
                "table {table} is already registered by {} with a different definition",
                existing.path()
            )));
        }
        if let Some(other) = self.paths.get(schema.path()) {
            return Err(Error::definition(format!(
                "model {} is already registered for table {other}",
                schema.path()
            )));
        }
        if let Some(existing) = self.pending.get(&table) {
            if existing.as_ref() == &schema {
                debug!(table = %table, "Model already pending");
                return Ok(Arc::clone(existing));
            }
        }

        let mut replaced = vec![table.clone()];
        if let Some(other) = self.pending_paths.get(schema.path()) {
            replaced.push(other.clone());
        }
        self.check_namespace(&table, &schema, &replaced)?;

        for old_table in &replaced {
            if let Some(old) = self.pending.remove(old_table) {
                self.pending_paths.remove(old.path());
                debug!(table = %old_table, path = old.path(), "Replaced pending model");
            }
        }

        let schema = Arc::new(schema);
        self.pending_paths
            .insert(schema.path().to_string(), table.clone());
        self.pending.insert(table.clone(), Arc::clone(&schema));
        self.finalized = false;

        debug!(
            table = %table,
            path = schema.path(),
            fields = schema.declared_fields().len(),
            "Registered model"
        );
        Ok(schema)
    }

    /// Register several models in order, stopping at the first error.
    pub fn register_all(
        &mut self,
        schemas: impl IntoIterator<Item = ModelSchema>,
    ) -> Result<(), Error> {
        for schema in schemas {
            self.register(schema)?;
        }
        Ok(())
    }

    // Tables and indexes share one database-wide namespace. Pending tables in
    // `replaced` are about to be dropped and do not count.
    fn check_namespace(
        &self,
        table: &str,
        schema: &ModelSchema,
        replaced: &[String],
    ) -> Result<(), Error> {
        let mut taken: HashMap<&str, &str> = HashMap::new();
        let pending = self
            .pending
            .iter()
            .filter(|(name, _)| !replaced.contains(*name));
        for (other_table, other) in self.tables.iter().chain(pending) {
            taken.insert(other_table.as_str(), other_table.as_str());
            for name in other.indexes().iter().filter_map(|i| i.name()) {
                taken.insert(name, other_table.as_str());
            }
        }

        if let Some(owner) = taken.get(table) {
            return Err(Error::definition(format!(
                "table name {table} is already used by an index on {owner}"
            )));
        }
        for name in schema.indexes().iter().filter_map(|i| i.name()) {
            if name == table {
                return Err(Error::definition(format!(
                    "index {name} has the same name as its table"
                )));
            }
            if let Some(owner) = taken.get(name) {
                return Err(Error::definition(format!(
                    "index name {name} on {table} is already used by {owner}"
                )));
            }
        }
        Ok(())
    }

    /// Validate every pending model against the full schema graph and make
    /// them queryable.
    ///
    /// Either every pending model is committed or none is: on error the
    /// pending set is kept, so a corrected declaration can be registered over
    /// the rejected one and finalize run again. Safe to run more than once.
    #[instrument(skip(self))]
    pub fn finalize(&mut self) -> Result<(), Error> {
        if self.finalized && self.pending.is_empty() {
            debug!("Registry already finalized");
            return Ok(());
        }

        if let Err(err) = self.validate_pending() {
            for schema in self.pending.values() {
                schema.clear_links();
            }
            warn!(
                pending = self.pending.len(),
                error = %err,
                "Schema registry finalize failed"
            );
            return Err(err);
        }

        let pending = std::mem::take(&mut self.pending);
        self.pending_paths.clear();
        for (table, schema) in pending {
            self.paths.insert(schema.path().to_string(), table.clone());
            self.tables.insert(table, schema);
        }

        self.finalized = true;
        info!(tables = self.tables.len(), "Schema registry finalized");
        Ok(())
    }

    fn validate_pending(&self) -> Result<(), Error> {
        for schema in self.pending.values() {
            validate_interleaving(schema, self)?;
        }
        for schema in self.pending.values() {
            for relation in schema.relations() {
                relation.resolve(schema, self)?;
            }
        }
        Ok(())
    }

    /// Check if the last finalize succeeded and nothing was registered since.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Tables registered since the last successful finalize, sorted.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.keys().map(String::as_str)
    }

    /// Get the schema of a finalized table.
    pub fn get_schema(&self, table: &str) -> Result<Arc<ModelSchema>, Error> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| Error::UnknownModel(table.to_string()))
    }

    /// Get a finalized schema by model path.
    pub fn get_by_path(&self, path: &str) -> Option<Arc<ModelSchema>> {
        self.paths
            .get(path)
            .and_then(|table| self.tables.get(table))
            .cloned()
    }

    // Lookups used while validating: finalized first, then pending.
    pub(crate) fn lookup_table(&self, table: &str) -> Option<Arc<ModelSchema>> {
        self.tables
            .get(table)
            .or_else(|| self.pending.get(table))
            .cloned()
    }

    pub(crate) fn lookup_path(&self, path: &str) -> Option<Arc<ModelSchema>> {
        self.get_by_path(path).or_else(|| {
            self.pending_paths
                .get(path)
                .and_then(|table| self.pending.get(table))
                .cloned()
        })
    }

    /// Check if a table is finalized.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Finalized table names, sorted.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Finalized schemas, sorted by table name.
    pub fn schemas(&self) -> impl Iterator<Item = &Arc<ModelSchema>> {
        self.tables.values()
    }

    /// Number of finalized tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if nothing is finalized.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Resolve a relationship of `schema` by name.
    pub fn resolve_relationship<'a>(
        &self,
        schema: &'a ModelSchema,
        name: &str,
    ) -> Result<ResolvedRelation<'a>, Error> {
        let relation = schema.relation(name).ok_or_else(|| {
            Error::definition(format!(
                "model {} has no relationship '{name}'",
                schema.path()
            ))
        })?;
        let target = relation.resolve(schema, self)?;
        Ok(ResolvedRelation { relation, target })
    }

    /// Parent of an interleaved table, validated on first use.
    pub fn parent_of(&self, schema: &ModelSchema) -> Result<Option<Arc<ModelSchema>>, Error> {
        validate_interleaving(schema, self)
    }

    /// Finalized tables interleaved directly in `table`.
    pub fn children_of(&self, table: &str) -> Vec<Arc<ModelSchema>> {
        self.tables
            .values()
            .filter(|s| s.interleaved_in() == Some(table))
            .cloned()
            .collect()
    }

    /// Snapshot of all finalized schemas.
    pub fn snapshot(&self) -> SchemaSnapshot {
        SchemaSnapshot::new(self.tables.values().map(|s| s.as_ref().clone()))
    }
}
