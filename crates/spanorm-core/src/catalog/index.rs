//! Secondary index definitions.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Length of the hash suffix appended to shortened default index names.
const NAME_HASH_LEN: usize = 16;

/// Sort direction of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// One key column of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

/// Options accepted when declaring an index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Explicit index name.
    pub name: Option<String>,
    /// Per-column direction; `true` is ascending. Unlisted columns are ascending.
    pub column_ordering: BTreeMap<String, bool>,
    /// Index enforces uniqueness.
    pub unique: bool,
    /// Rows with a NULL key column are left out of the index.
    pub null_filtered: bool,
    /// Extra columns stored in the index.
    pub storing: Vec<String>,
}

impl IndexOptions {
    /// Default options: generated name, all columns ascending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the direction of one column.
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.column_ordering.insert(column.into(), ascending);
        self
    }

    /// Sort one column descending.
    pub fn descending(self, column: impl Into<String>) -> Self {
        self.order(column, false)
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark as null filtered.
    pub fn null_filtered(mut self) -> Self {
        self.null_filtered = true;
        self
    }

    /// Store additional columns.
    pub fn storing(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.storing.extend(columns.into_iter().map(Into::into));
        self
    }
}

/// A compiled index.
///
/// `name` is filled in when the owning model has a table; abstract models
/// keep it unset so subclasses derive their own default names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Attribute the index was declared under.
    pub attribute: String,
    /// Name given explicitly at declaration.
    pub declared_name: Option<String>,
    /// Resolved index name.
    pub name: Option<String>,
    /// Key columns in order.
    pub columns: Vec<IndexColumn>,
    /// Index enforces uniqueness.
    pub unique: bool,
    /// Rows with a NULL key column are left out.
    pub null_filtered: bool,
    /// Extra stored columns.
    pub storing: Vec<String>,
}

/// Compile an ordered column list into an index definition.
///
/// Referenced columns are checked against the model later, when the index is
/// attached and the model is built.
pub fn compile_index(
    columns: impl IntoIterator<Item = impl Into<String>>,
    options: IndexOptions,
) -> Result<IndexDef, Error> {
    let names: Vec<String> = columns.into_iter().map(Into::into).collect();
    if names.is_empty() {
        return Err(Error::definition("index must have at least one column"));
    }

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(Error::definition(format!(
                "index lists column '{name}' more than once"
            )));
        }
    }

    if let Some(stray) = options
        .column_ordering
        .keys()
        .find(|column| !seen.contains(column.as_str()))
    {
        return Err(Error::definition(format!(
            "index ordering names column '{stray}' which is not an index column"
        )));
    }

    let mut stored = HashSet::new();
    for column in &options.storing {
        if seen.contains(column.as_str()) {
            return Err(Error::definition(format!(
                "column '{column}' is an index key and cannot also be stored"
            )));
        }
        if !stored.insert(column.as_str()) {
            return Err(Error::definition(format!(
                "index stores column '{column}' more than once"
            )));
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let ascending = options.column_ordering.get(&name).copied().unwrap_or(true);
            IndexColumn {
                name,
                direction: if ascending {
                    OrderDirection::Asc
                } else {
                    OrderDirection::Desc
                },
            }
        })
        .collect();

    Ok(IndexDef {
        attribute: String::new(),
        declared_name: options.name.clone(),
        name: options.name,
        columns,
        unique: options.unique,
        null_filtered: options.null_filtered,
        storing: options.storing,
    })
}

/// Deterministic default name for an index on `table` over `columns`.
///
/// Names longer than `max_len` are cut and suffixed with a hash of the full
/// name, so the same inputs always give the same result.
pub fn default_index_name(table: &str, columns: &[&str], max_len: usize) -> String {
    let mut name = format!("idx_{table}");
    for column in columns {
        name.push('_');
        name.push_str(column);
    }

    if name.len() <= max_len {
        return name;
    }

    let digest = hex::encode(blake3::hash(name.as_bytes()).as_bytes());
    let mut keep = max_len.saturating_sub(NAME_HASH_LEN + 1);
    while !name.is_char_boundary(keep) {
        keep -= 1;
    }
    format!("{}_{}", &name[..keep], &digest[..NAME_HASH_LEN])
}

impl IndexDef {
    /// Resolved name, if the owning model has a table.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Key column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Check if a column is a key column of this index.
    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    /// Resolve the name for an index owned by `table`.
    pub(crate) fn resolve_name(&mut self, table: &str, max_len: usize) {
        let name = match &self.declared_name {
            Some(name) => name.clone(),
            None => default_index_name(table, &self.column_names(), max_len),
        };
        self.name = Some(name);
    }
}

impl fmt::Display for IndexDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| match c.direction {
                OrderDirection::Asc => c.name.clone(),
                OrderDirection::Desc => format!("{} DESC", c.name),
            })
            .collect();
        if self.unique {
            write!(f, "UNIQUE ")?;
        }
        if self.null_filtered {
            write!(f, "NULL_FILTERED ")?;
        }
        write!(f, "{} ({})", self.name().unwrap_or("<unnamed>"), columns.join(", "))?;
        if !self.storing.is_empty() {
            write!(f, " STORING ({})", self.storing.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_preserves_order() {
        let index = compile_index(["b", "a", "c"], IndexOptions::new()).unwrap();
        assert_eq!(index.column_names(), vec!["b", "a", "c"]);
        assert!(index.name().is_none());
    }

    #[test]
    fn test_unspecified_ordering_defaults_to_ascending() {
        let index =
            compile_index(["a", "b", "c"], IndexOptions::new().descending("b")).unwrap();

        let directions: Vec<_> = index.columns.iter().map(|c| c.direction).collect();
        assert_eq!(
            directions,
            vec![
                OrderDirection::Asc,
                OrderDirection::Desc,
                OrderDirection::Asc
            ]
        );
    }

    #[test]
    fn test_explicit_ordering() {
        let index = compile_index(
            ["value"],
            IndexOptions::new().name("value_desc").order("value", false),
        )
        .unwrap();
        assert_eq!(index.name(), Some("value_desc"));
        assert_eq!(index.columns[0].direction, OrderDirection::Desc);
    }

    #[test]
    fn test_rejects_malformed_indexes() {
        assert!(compile_index(Vec::<String>::new(), IndexOptions::new()).is_err());
        assert!(compile_index(["a", "a"], IndexOptions::new()).is_err());
        assert!(compile_index(["a"], IndexOptions::new().descending("b")).is_err());
        assert!(compile_index(["a"], IndexOptions::new().storing(["a"])).is_err());
        assert!(compile_index(["a"], IndexOptions::new().storing(["b", "b"])).is_err());
    }

    #[test]
    fn test_default_name_is_deterministic() {
        let first = default_index_name("SmallTestModel", &["value_1"], 128);
        let second = default_index_name("SmallTestModel", &["value_1"], 128);
        assert_eq!(first, second);
        assert_eq!(first, "idx_SmallTestModel_value_1");
        assert_ne!(first, default_index_name("SmallTestModel", &["value_2"], 128));
    }

    #[test]
    fn test_long_default_name_is_hashed() {
        let columns = ["a_really_long_column_name", "another_really_long_column_name"];
        let name = default_index_name("SomeVeryLongTableName", &columns, 40);

        assert_eq!(name.len(), 40);
        assert_eq!(name, default_index_name("SomeVeryLongTableName", &columns, 40));
        assert_ne!(
            name,
            default_index_name("SomeVeryLongTableName", &["a_really_long_column_name", "x"], 40)
        );
    }

    #[test]
    fn test_display() {
        let mut index = compile_index(
            ["value"],
            IndexOptions::new()
                .descending("value")
                .unique()
                .storing(["other"]),
        )
        .unwrap();
        index.resolve_name("T", 128);
        assert_eq!(index.to_string(), "UNIQUE idx_T_value (value DESC) STORING (other)");
    }
}
