//! Type mapping between SQLite and PostgreSQL.
//!
//! SQLite declared types are coarse and often wrong for legacy columns that
//! hold serialized JSON, so a fixed set of column names overrides the
//! declared type. Both the override set and the type table are data, taken
//! from [`MigrationConfig`].

use crate::config::MigrationConfig;
use std::collections::{BTreeMap, HashSet};

/// Target type used for JSON columns.
pub const JSON_TYPE: &str = "JSONB";

/// Target type for anything the type table does not know.
pub const FALLBACK_TYPE: &str = "TEXT";

/// Maps SQLite declared column types to PostgreSQL type names.
#[derive(Debug, Clone)]
pub struct TypeMapper {
    json_columns: HashSet<String>,
    types: BTreeMap<String, String>,
}

impl TypeMapper {
    /// Create a mapper from explicit tables.
    pub fn new<I, S>(json_columns: I, types: BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let types = types
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        Self {
            json_columns: json_columns.into_iter().map(Into::into).collect(),
            types,
        }
    }

    /// Create a mapper from the migration config tables.
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.json_columns.iter().cloned(), config.type_map.clone())
    }

    /// Whether `column_name` is one of the known JSON columns.
    pub fn is_json_column(&self, column_name: &str) -> bool {
        self.json_columns.contains(column_name)
    }

    /// Map a SQLite declared type to a PostgreSQL type. Never fails.
    pub fn map_type(&self, source_type: &str, column_name: &str) -> String {
        if self.is_json_column(column_name) {
            return JSON_TYPE.to_string();
        }

        self.types
            .get(&source_type.trim().to_uppercase())
            .cloned()
            .unwrap_or_else(|| FALLBACK_TYPE.to_string())
    }
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::from_config(&MigrationConfig::default())
    }
}

/// Whether a PostgreSQL type name (as declared or as reported by
/// `information_schema`) is a JSON type.
pub fn is_json_type(pg_type: &str) -> bool {
    matches!(pg_type.trim().to_lowercase().as_str(), "json" | "jsonb")
}

/// Whether a PostgreSQL type name is boolean.
pub fn is_boolean_type(pg_type: &str) -> bool {
    matches!(pg_type.trim().to_lowercase().as_str(), "boolean" | "bool")
}
