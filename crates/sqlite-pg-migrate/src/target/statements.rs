//! PostgreSQL statement text.
//!
//! Values arrive as finished literal fragments from the transcoder and are
//! spliced in as-is; identifiers go through [`IdentifierPolicy`].

use crate::core::{IdentifierPolicy, TableDescriptor};

/// Introspect existing column types of a table in the current schema.
pub const COLUMN_TYPES_QUERY: &str = "SELECT column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1 \
     ORDER BY ordinal_position";

/// Savepoint that isolates a single row insert inside a page transaction.
pub const ROW_SAVEPOINT: &str = "migrate_row";

pub fn truncate_table(identifiers: &IdentifierPolicy, table: &str) -> String {
    format!("TRUNCATE TABLE {} CASCADE", identifiers.quote_target(table))
}

pub fn create_table(identifiers: &IdentifierPolicy, table: &TableDescriptor) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("{} {}", identifiers.quote_target(&c.name), c.target_type))
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        identifiers.quote_target(&table.name),
        columns.join(", ")
    )
}

/// `INSERT` for one row. `literals` must be in descriptor column order.
pub fn insert_row(
    identifiers: &IdentifierPolicy,
    table: &TableDescriptor,
    literals: &[String],
) -> String {
    let columns: Vec<String> = table
        .column_names()
        .map(|name| identifiers.quote_target(name))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        identifiers.quote_target(&table.name),
        columns.join(", "),
        literals.join(", ")
    )
}
