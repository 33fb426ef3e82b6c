//! Identifier quoting for the source and target dialects.
//!
//! SQL identifiers (table and column names) cannot be bound as statement
//! parameters, so quoting here is the only protection when they are spliced
//! into statements.
//!
//! The two directions are asymmetric:
//! - SQLite: every identifier is double-quoted.
//! - PostgreSQL: only identifiers in the reserved-word set are quoted; all
//!   others are emitted bare and therefore fold to lower case.

use crate::error::{MigrateError, Result};
use std::collections::HashSet;

/// Maximum identifier length accepted (PostgreSQL truncates at 63 bytes,
/// SQLite has no practical limit).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Reject identifiers that cannot be safely spliced into a statement.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Wrap in double quotes, doubling any embedded double quote.
fn double_quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQLite identifier. SQLite identifiers are always quoted.
pub fn quote_sqlite(name: &str) -> String {
    double_quote(name)
}

/// Quoting rules for both dialects, driven by a reserved-word table.
#[derive(Debug, Clone)]
pub struct IdentifierPolicy {
    reserved: HashSet<String>,
}

impl IdentifierPolicy {
    /// Create a policy from a reserved-word list. Matching is case-insensitive.
    pub fn new<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            reserved: reserved
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Whether `name` collides with a reserved word on the target.
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(&name.to_lowercase())
    }

    /// Identifier ready for a SQLite statement. Always quoted.
    pub fn quote_source(&self, name: &str) -> String {
        quote_sqlite(name)
    }

    /// Identifier ready for a PostgreSQL statement. Quoted only when reserved.
    pub fn quote_target(&self, name: &str) -> String {
        if self.is_reserved(name) {
            double_quote(name)
        } else {
            name.to_string()
        }
    }

    /// The name PostgreSQL records in its catalog for an identifier emitted
    /// by [`quote_target`](Self::quote_target).
    pub fn target_catalog_name(&self, name: &str) -> String {
        if self.is_reserved(name) {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        Self::new(&crate::config::MigrationConfig::default().reserved_words)
    }
}
