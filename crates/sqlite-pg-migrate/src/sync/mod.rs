//! Target schema synchronization.
//!
//! Before any row of a table is copied, the target table is emptied (or
//! created) and the descriptor used by the transcoder is built from the
//! column types the target actually has.

use crate::core::{validate_identifier, IdentifierPolicy, SourceColumn, TableDescriptor};
use crate::error::{MigrateError, Result};
use crate::source::SourceReader;
use crate::target::TargetWriter;
use crate::typemap::TypeMapper;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Prepares target tables for loading.
pub struct SchemaSync<'a> {
    source: &'a dyn SourceReader,
    target: &'a dyn TargetWriter,
    mapper: &'a TypeMapper,
    identifiers: &'a IdentifierPolicy,
    max_retries: usize,
}

impl<'a> SchemaSync<'a> {
    pub fn new(
        source: &'a dyn SourceReader,
        target: &'a dyn TargetWriter,
        mapper: &'a TypeMapper,
        identifiers: &'a IdentifierPolicy,
        max_retries: usize,
    ) -> Self {
        Self {
            source,
            target,
            mapper,
            identifiers,
            max_retries: max_retries.max(1),
        }
    }

    /// Read the source schema, prepare the target table and return the
    /// descriptor rows of `table` are transcoded against.
    pub async fn synchronize(&self, table: &str) -> Result<TableDescriptor> {
        let columns = self.load_source_columns(table).await?;

        let draft = TableDescriptor::build(
            table,
            &columns,
            &HashMap::new(),
            self.mapper,
            self.identifiers,
        );
        self.ensure_table(&draft).await?;

        let target_types = match self.target.column_types(table).await {
            Ok(types) => types,
            Err(e) => {
                warn!("{}: could not read target column types, using mapped types: {}", table, e);
                HashMap::new()
            }
        };

        let descriptor = TableDescriptor::build(
            table,
            &columns,
            &target_types,
            self.mapper,
            self.identifiers,
        );
        for column in &descriptor.columns {
            debug!(
                "{}.{}: {} -> {}{}",
                table,
                column.name,
                column.source_type,
                column.target_type,
                if column.is_json { " (json)" } else { "" }
            );
        }

        Ok(descriptor)
    }

    /// Source columns with bounded retry. The last error is returned once
    /// all attempts fail.
    pub async fn load_source_columns(&self, table: &str) -> Result<Vec<SourceColumn>> {
        validate_identifier(table)
            .map_err(|e| MigrateError::SchemaExtraction(format!("{}: {}", table, e)))?;

        let mut attempt = 0;
        let columns = loop {
            attempt += 1;
            match self.source.table_columns(table).await {
                Ok(columns) => break columns,
                Err(e) if attempt < self.max_retries => {
                    warn!(
                        "Retry {}/{} reading schema of {}: {}",
                        attempt, self.max_retries, table, e
                    );
                }
                Err(e) => {
                    return Err(MigrateError::SchemaExtraction(format!(
                        "{}: {} (after {} attempts)",
                        table, e, attempt
                    )))
                }
            }
        };

        if columns.is_empty() {
            return Err(MigrateError::SchemaExtraction(format!(
                "{}: source table has no columns",
                table
            )));
        }

        for column in &columns {
            validate_identifier(&column.name)
                .map_err(|e| MigrateError::SchemaExtraction(format!("{}: {}", table, e)))?;
        }

        Ok(columns)
    }

    /// Empty the target table, creating it when it does not exist.
    /// Running this twice leaves the same column set as running it once.
    pub async fn ensure_table(&self, table: &TableDescriptor) -> Result<()> {
        if let Err(e) = self.target.truncate_table(&table.name).await {
            warn!("Could not truncate {} (it may not exist yet): {}", table.name, e);
        }

        let existing = match self.target.column_types(&table.name).await {
            Ok(types) => types,
            Err(e) => {
                warn!("Could not read columns of {}: {}", table.name, e);
                HashMap::new()
            }
        };

        if existing.is_empty() {
            self.target
                .create_table(table)
                .await
                .map_err(|e| MigrateError::transfer(&table.name, format!("create table failed: {}", e)))?;
        } else {
            info!("{}: reusing existing target table ({} columns)", table.name, existing.len());
        }

        Ok(())
    }
}
