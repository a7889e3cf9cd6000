//! Model schemas and the builder that collects their declarations.

use super::field::{make_field_with_config, FieldDef, FieldOptions};
use super::index::{compile_index, IndexDef, IndexOptions};
use super::naming::validate_identifier;
use super::relation::{Cardinality, RelationDef};
use super::types::{FieldType, ScalarType};
use super::value::Value;
use crate::config::SchemaConfig;
use crate::error::Error;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

/// Cached pointer to another model, filled in on first resolution.
///
/// A link whose target has been dropped reads as unresolved and may be set
/// again. Clones start unresolved and the cache never takes part in
/// equality.
pub(crate) struct SchemaLink(RwLock<Weak<ModelSchema>>);

impl Default for SchemaLink {
    fn default() -> Self {
        Self(RwLock::new(Weak::new()))
    }
}

impl SchemaLink {
    pub(crate) fn get(&self) -> Option<Arc<ModelSchema>> {
        self.0.read().upgrade()
    }

    pub(crate) fn set(&self, target: &Arc<ModelSchema>) {
        let mut link = self.0.write();
        // A live target wins over later resolutions.
        if link.strong_count() == 0 {
            *link = Arc::downgrade(target);
        }
    }

    pub(crate) fn clear(&self) {
        *self.0.write() = Weak::new();
    }
}

impl Clone for SchemaLink {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl PartialEq for SchemaLink {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for SchemaLink {}

impl fmt::Debug for SchemaLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.get().is_some() {
            "resolved"
        } else {
            "unresolved"
        })
    }
}

/// The resolved schema of one model.
///
/// Fields are stored in declaration order (inherited fields first);
/// [`ModelSchema::fields`] lists them primary key first. A schema without a
/// table is an abstract base that only contributes to subclasses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    path: String,
    table: Option<String>,
    fields: Vec<FieldDef>,
    indexes: Vec<IndexDef>,
    relations: Vec<RelationDef>,
    interleaved_in: Option<String>,
    #[serde(skip)]
    parent: SchemaLink,
}

enum Declaration {
    Field {
        attribute: String,
        field_type: FieldType,
        options: FieldOptions,
    },
    Index {
        attribute: String,
        columns: Vec<String>,
        options: IndexOptions,
    },
    Relation(RelationDef),
}

/// Collects the declarations of one model.
///
/// Nothing is validated until [`ModelBuilder::build`].
pub struct ModelBuilder {
    path: String,
    table: Option<String>,
    interleaved_in: Option<String>,
    parents: Vec<ModelSchema>,
    declarations: Vec<Declaration>,
}

impl ModelBuilder {
    /// Set the table name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Interleave this table in the parent table.
    pub fn interleaved_in(mut self, parent_table: impl Into<String>) -> Self {
        self.interleaved_in = Some(parent_table.into());
        self
    }

    /// Inherit the fields, indexes and relations of `parent`.
    ///
    /// Inherited declarations come before this model's own, in the order the
    /// parents were added. Table and interleave parent are inherited unless
    /// set on this builder.
    pub fn extends(mut self, parent: &ModelSchema) -> Self {
        self.parents.push(parent.clone());
        self
    }

    /// Declare a field.
    pub fn field(
        mut self,
        attribute: impl Into<String>,
        field_type: FieldType,
        options: FieldOptions,
    ) -> Self {
        self.declarations.push(Declaration::Field {
            attribute: attribute.into(),
            field_type,
            options,
        });
        self
    }

    /// Declare an index over `columns`.
    pub fn index(
        mut self,
        attribute: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
        options: IndexOptions,
    ) -> Self {
        self.declarations.push(Declaration::Index {
            attribute: attribute.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            options,
        });
        self
    }

    /// Declare a relationship to the model at `target`.
    pub fn relation<L, T>(
        mut self,
        attribute: impl Into<String>,
        target: impl Into<String>,
        column_map: impl IntoIterator<Item = (L, T)>,
        cardinality: Cardinality,
    ) -> Self
    where
        L: Into<String>,
        T: Into<String>,
    {
        self.declarations.push(Declaration::Relation(RelationDef::new(
            attribute,
            target,
            column_map,
            cardinality,
        )));
        self
    }

    /// Build with the default configuration.
    pub fn build(self) -> Result<ModelSchema, Error> {
        self.build_with_config(&SchemaConfig::default())
    }

    /// Validate the declarations and produce the model schema.
    pub fn build_with_config(self, config: &SchemaConfig) -> Result<ModelSchema, Error> {
        let path = self.path;
        if path.is_empty() {
            return Err(Error::definition("model path is empty"));
        }

        let table = self
            .table
            .or_else(|| self.parents.iter().rev().find_map(|p| p.table.clone()));
        let interleaved_in = self
            .interleaved_in
            .or_else(|| self.parents.iter().rev().find_map(|p| p.interleaved_in.clone()));

        if let Some(table) = &table {
            validate_identifier("table", table, config.max_identifier_len)?;
        }
        if let Some(parent) = &interleaved_in {
            validate_identifier("table", parent, config.max_identifier_len)?;
            if table.as_deref() == Some(parent.as_str()) {
                return Err(Error::definition(format!(
                    "model {path}: table {parent} cannot be interleaved in itself"
                )));
            }
        }

        let mut fields = Vec::new();
        let mut indexes = Vec::new();
        let mut relations = Vec::new();
        for parent in self.parents {
            fields.extend(parent.fields);
            indexes.extend(parent.indexes);
            relations.extend(parent.relations);
        }

        for declaration in self.declarations {
            match declaration {
                Declaration::Field {
                    attribute,
                    field_type,
                    options,
                } => fields.push(make_field_with_config(attribute, field_type, options, config)?),
                Declaration::Index {
                    attribute,
                    columns,
                    options,
                } => {
                    let mut index = compile_index(columns, options)?;
                    index.attribute = attribute;
                    indexes.push(index);
                }
                Declaration::Relation(relation) => relations.push(relation),
            }
        }

        check_field_names(&path, &mut fields, config)?;
        check_attributes(&path, &fields, &indexes, &relations)?;

        if table.is_some() && !fields.iter().any(|f| f.primary_key) {
            return Err(Error::definition(format!(
                "model {path}: no primary key field declared"
            )));
        }

        for index in &mut indexes {
            attach_index(&path, index, &fields, table.as_deref(), config)?;
        }
        let mut index_names = HashSet::new();
        for name in indexes.iter().filter_map(|i| i.name()) {
            if !index_names.insert(name) {
                return Err(Error::definition(format!(
                    "model {path}: duplicate index name '{name}'"
                )));
            }
        }

        for relation in &mut relations {
            attach_relation(&path, relation, &fields)?;
        }

        Ok(ModelSchema {
            path,
            table,
            fields,
            indexes,
            relations,
            interleaved_in,
            parent: SchemaLink::default(),
        })
    }
}

// Renumber positions and reject names that collide across fields.
fn check_field_names(
    path: &str,
    fields: &mut [FieldDef],
    config: &SchemaConfig,
) -> Result<(), Error> {
    let mut owners: HashMap<String, usize> = HashMap::new();
    for (position, field) in fields.iter_mut().enumerate() {
        field.position = position;
        validate_identifier("column", &field.name, config.max_identifier_len)?;

        for key in [&field.attribute, &field.name] {
            match owners.get(key.as_str()) {
                Some(owner) if *owner != position => {
                    return Err(Error::definition(format!(
                        "model {path}: field name '{key}' is declared more than once"
                    )));
                }
                _ => {
                    owners.insert(key.clone(), position);
                }
            }
        }
    }
    Ok(())
}

// Fields, indexes and relations share one attribute namespace.
fn check_attributes(
    path: &str,
    fields: &[FieldDef],
    indexes: &[IndexDef],
    relations: &[RelationDef],
) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for field in fields {
        seen.insert(field.attribute.as_str());
    }
    let others = indexes
        .iter()
        .map(|i| i.attribute.as_str())
        .chain(relations.iter().map(|r| r.name.as_str()));
    for attribute in others {
        if !seen.insert(attribute) {
            return Err(Error::definition(format!(
                "model {path}: attribute '{attribute}' is declared more than once"
            )));
        }
    }
    Ok(())
}

fn find_field<'a>(fields: &'a [FieldDef], name: &str) -> Option<&'a FieldDef> {
    fields
        .iter()
        .find(|f| f.name == name)
        .or_else(|| fields.iter().find(|f| f.attribute == name))
}

fn attach_index(
    path: &str,
    index: &mut IndexDef,
    fields: &[FieldDef],
    table: Option<&str>,
    config: &SchemaConfig,
) -> Result<(), Error> {
    for column in &mut index.columns {
        let field = find_field(fields, &column.name).ok_or_else(|| {
            Error::definition(format!(
                "model {path}: index '{}' references unknown column '{}'",
                index.attribute, column.name
            ))
        })?;
        if field.field_type.is_array() || field.field_type.scalar_type() == ScalarType::Json {
            return Err(Error::definition(format!(
                "model {path}: index '{}' cannot use {} column '{}' as a key",
                index.attribute,
                field.storage_type(),
                field.name
            )));
        }
        column.name = field.name.clone();
    }
    for column in &mut index.storing {
        let field = find_field(fields, column).ok_or_else(|| {
            Error::definition(format!(
                "model {path}: index '{}' stores unknown column '{column}'",
                index.attribute
            ))
        })?;
        *column = field.name.clone();
    }

    index.name = None;
    if let Some(table) = table {
        index.resolve_name(table, config.max_identifier_len);
    }
    if let Some(name) = &index.name {
        validate_identifier("index", name, config.max_identifier_len)?;
    }
    Ok(())
}

fn attach_relation(
    path: &str,
    relation: &mut RelationDef,
    fields: &[FieldDef],
) -> Result<(), Error> {
    if relation.columns.is_empty() {
        return Err(Error::definition(format!(
            "model {path}: relationship '{}' has an empty column map",
            relation.name
        )));
    }

    let mut locals = HashSet::new();
    for pair in &mut relation.columns {
        let field = find_field(fields, &pair.local).ok_or_else(|| {
            Error::definition(format!(
                "model {path}: relationship '{}' references unknown column '{}'",
                relation.name, pair.local
            ))
        })?;
        if !locals.insert(field.name.clone()) {
            return Err(Error::definition(format!(
                "model {path}: relationship '{}' maps column '{}' twice",
                relation.name, field.name
            )));
        }
        pair.local = field.name.clone();
    }
    Ok(())
}

impl ModelSchema {
    /// Start declaring the model identified by `path`.
    pub fn builder(path: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            path: path.into(),
            table: None,
            interleaved_in: None,
            parents: Vec::new(),
            declarations: Vec::new(),
        }
    }

    /// Model path, used by relationship references.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Table name; `None` for abstract models.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Check if this is an abstract model.
    pub fn is_abstract(&self) -> bool {
        self.table.is_none()
    }

    /// Table name, or the path for abstract models.
    pub fn display_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.path)
    }

    /// Parent table this table is interleaved in.
    pub fn interleaved_in(&self) -> Option<&str> {
        self.interleaved_in.as_deref()
    }

    /// Fields with the primary key first, each group in declaration order.
    pub fn fields(&self) -> Vec<&FieldDef> {
        let (mut keys, rest): (Vec<_>, Vec<_>) =
            self.fields.iter().partition(|f| f.primary_key);
        keys.extend(rest);
        keys
    }

    /// Fields in declaration order.
    pub fn declared_fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a field by column name, then by attribute.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        find_field(&self.fields, name)
    }

    /// Look up a field by column name only.
    pub fn column(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Column names, primary key first.
    pub fn columns(&self) -> Vec<&str> {
        self.fields().into_iter().map(|f| f.name.as_str()).collect()
    }

    /// Primary key fields in key order.
    pub fn primary_key_fields(&self) -> Vec<&FieldDef> {
        self.fields.iter().filter(|f| f.primary_key).collect()
    }

    /// Primary key column names in key order.
    pub fn primary_keys(&self) -> Vec<&str> {
        self.primary_key_fields()
            .into_iter()
            .map(|f| f.name.as_str())
            .collect()
    }

    /// Secondary indexes.
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    /// Look up an index by resolved name, then by attribute.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes
            .iter()
            .find(|i| i.name() == Some(name))
            .or_else(|| self.indexes.iter().find(|i| i.attribute == name))
    }

    /// Declared relationships.
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Look up a relationship by name.
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Validate one column value.
    pub fn validate_value(&self, column: &str, value: &Value) -> Result<(), Error> {
        let field = self.column(column).ok_or_else(|| {
            Error::invalid_value(column, format!("unknown column on {}", self.display_name()))
        })?;
        field.validate(value)
    }

    /// Validate a complete row.
    ///
    /// Unknown columns and missing primary key columns are rejected; other
    /// absent columns are checked as NULL.
    pub fn validate_row(&self, values: &HashMap<String, Value>) -> Result<(), Error> {
        self.check_unknown_columns(values)?;
        for key in self.primary_key_fields() {
            if !values.contains_key(&key.name) {
                return Err(Error::invalid_value(&key.name, "missing primary key value"));
            }
        }
        for field in &self.fields {
            field.validate(values.get(&field.name).unwrap_or(&Value::Null))?;
        }
        Ok(())
    }

    /// Validate only the supplied columns of a row.
    pub fn validate_partial_row(&self, values: &HashMap<String, Value>) -> Result<(), Error> {
        self.check_unknown_columns(values)?;
        for (column, value) in values {
            self.validate_value(column, value)?;
        }
        Ok(())
    }

    /// Primary key values of a row, in key order.
    pub fn key_values(&self, values: &HashMap<String, Value>) -> Result<Vec<Value>, Error> {
        self.primary_key_fields()
            .into_iter()
            .map(|key| {
                values
                    .get(&key.name)
                    .cloned()
                    .ok_or_else(|| Error::invalid_value(&key.name, "missing primary key value"))
            })
            .collect()
    }

    fn check_unknown_columns(&self, values: &HashMap<String, Value>) -> Result<(), Error> {
        match values.keys().find(|column| self.column(column).is_none()) {
            Some(column) => Err(Error::invalid_value(
                column.as_str(),
                format!("unknown column on {}", self.display_name()),
            )),
            None => Ok(()),
        }
    }

    pub(crate) fn cached_parent(&self) -> Option<Arc<ModelSchema>> {
        self.parent.get()
    }

    pub(crate) fn cache_parent(&self, parent: &Arc<ModelSchema>) {
        self.parent.set(parent);
    }

    /// Forget the cached interleave parent and relationship targets.
    pub(crate) fn clear_links(&self) {
        self.parent.clear();
        for relation in &self.relations {
            relation.resolved.clear();
        }
    }
}
