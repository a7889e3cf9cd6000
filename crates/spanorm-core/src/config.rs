//! Schema configuration.

/// Default maximum length of table, column and index identifiers.
pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 128;

/// Default maximum number of tables in one interleaving chain (root included).
pub const DEFAULT_MAX_INTERLEAVE_DEPTH: usize = 7;

/// Largest size accepted for a STRING column, in characters.
pub const MAX_STRING_LENGTH: u64 = 2_621_440;

/// Largest size accepted for a BYTES column, in bytes.
pub const MAX_BYTES_LENGTH: u64 = 10_485_760;

/// Configuration applied when building models and finalizing a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaConfig {
    /// Maximum identifier length for tables, columns and indexes.
    pub max_identifier_len: usize,

    /// Maximum depth of an interleaving chain, counting the root table.
    pub max_interleave_depth: usize,

    /// Accept interleaved children whose primary key equals the parent's
    /// (1:1 shadow tables).
    pub allow_shadow_tables: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_identifier_len: DEFAULT_MAX_IDENTIFIER_LEN,
            max_interleave_depth: DEFAULT_MAX_INTERLEAVE_DEPTH,
            allow_shadow_tables: false,
        }
    }
}

impl SchemaConfig {
    /// Create a configuration with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum identifier length.
    pub fn with_max_identifier_len(mut self, len: usize) -> Self {
        self.max_identifier_len = len;
        self
    }

    /// Set the maximum interleaving depth.
    pub fn with_max_interleave_depth(mut self, depth: usize) -> Self {
        self.max_interleave_depth = depth;
        self
    }

    /// Accept or reject 1:1 shadow tables.
    pub fn with_shadow_tables(mut self, allow: bool) -> Self {
        self.allow_shadow_tables = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchemaConfig::default();
        assert_eq!(config.max_identifier_len, 128);
        assert_eq!(config.max_interleave_depth, 7);
        assert!(!config.allow_shadow_tables);
    }

    #[test]
    fn test_builder() {
        let config = SchemaConfig::new()
            .with_max_identifier_len(32)
            .with_max_interleave_depth(3)
            .with_shadow_tables(true);

        assert_eq!(config.max_identifier_len, 32);
        assert_eq!(config.max_interleave_depth, 3);
        assert!(config.allow_shadow_tables);
    }
}
