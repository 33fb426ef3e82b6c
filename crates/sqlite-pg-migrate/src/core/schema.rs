//! Table and column metadata.

use crate::core::identifier::IdentifierPolicy;
use crate::typemap::{is_boolean_type, is_json_type, TypeMapper};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A column as declared in the SQLite schema (`PRAGMA table_info`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceColumn {
    /// Column name.
    pub name: String,

    /// Declared type, possibly empty.
    pub declared_type: String,
}

impl SourceColumn {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// A column of a table being migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as it appears in the source.
    pub name: String,

    /// Declared SQLite type.
    pub source_type: String,

    /// PostgreSQL type: the introspected type when the target column exists,
    /// otherwise the mapped type.
    pub target_type: String,

    /// Whether values are written as JSON literals.
    pub is_json: bool,
}

impl ColumnDescriptor {
    /// Whether the target column is boolean.
    pub fn is_boolean(&self) -> bool {
        is_boolean_type(&self.target_type)
    }
}

/// A table being migrated. Column order is source order and is the order
/// used for every INSERT of this table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name as it appears in the source.
    pub name: String,

    /// Ordered column descriptors.
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Build a descriptor from the source schema and the target's
    /// introspected column types (keyed by catalog name, may be empty).
    pub fn build(
        name: impl Into<String>,
        source_columns: &[SourceColumn],
        target_types: &HashMap<String, String>,
        mapper: &TypeMapper,
        identifiers: &IdentifierPolicy,
    ) -> Self {
        let columns = source_columns
            .iter()
            .map(|col| {
                let target_type = target_types
                    .get(&identifiers.target_catalog_name(&col.name))
                    .cloned()
                    .unwrap_or_else(|| mapper.map_type(&col.declared_type, &col.name));
                ColumnDescriptor {
                    name: col.name.clone(),
                    source_type: col.declared_type.clone(),
                    is_json: is_json_type(&target_type),
                    target_type,
                }
            })
            .collect();

        Self {
            name: name.into(),
            columns,
        }
    }

    /// Column names in insert order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_columns() -> Vec<SourceColumn> {
        vec![
            SourceColumn::new("id", "INTEGER"),
            SourceColumn::new("data", "TEXT"),
            SourceColumn::new("enabled", "INTEGER"),
        ]
    }

    #[test]
    fn test_build_uses_mapped_types_without_target() {
        let desc = TableDescriptor::build(
            "settings",
            &settings_columns(),
            &HashMap::new(),
            &TypeMapper::default(),
            &IdentifierPolicy::default(),
        );
        let names: Vec<_> = desc.column_names().collect();
        assert_eq!(names, vec!["id", "data", "enabled"]);
        assert_eq!(desc.columns[0].target_type, "INTEGER");
        assert_eq!(desc.columns[1].target_type, "JSONB");
        assert!(desc.columns[1].is_json);
        assert!(!desc.columns[2].is_boolean());
    }

    #[test]
    fn test_build_prefers_introspected_types() {
        let mut target = HashMap::new();
        target.insert("enabled".to_string(), "boolean".to_string());
        target.insert("data".to_string(), "text".to_string());
        let desc = TableDescriptor::build(
            "settings",
            &settings_columns(),
            &target,
            &TypeMapper::default(),
            &IdentifierPolicy::default(),
        );
        assert_eq!(desc.columns[1].target_type, "text");
        assert!(!desc.columns[1].is_json);
        assert!(desc.columns[2].is_boolean());
    }

    #[test]
    fn test_build_looks_up_folded_column_names() {
        let mut target = HashMap::new();
        target.insert("createdat".to_string(), "bigint".to_string());
        let desc = TableDescriptor::build(
            "chat",
            &[SourceColumn::new("createdAt", "INTEGER")],
            &target,
            &TypeMapper::default(),
            &IdentifierPolicy::default(),
        );
        assert_eq!(desc.columns[0].target_type, "bigint");
    }
}
