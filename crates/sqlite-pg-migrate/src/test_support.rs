//! In-memory source and target used by unit tests.

use crate::core::{IdentifierPolicy, RawRow, SourceColumn, TableDescriptor};
use crate::error::{MigrateError, Result};
use crate::source::SourceReader;
use crate::target::{statements, TargetWriter};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct FakeTable {
    name: String,
    columns: Vec<SourceColumn>,
    rows: Vec<RawRow>,
}

#[derive(Default)]
struct FakeSourceState {
    tables: Vec<FakeTable>,
    failing_offsets: HashSet<u64>,
    schema_failures: usize,
    schema_calls: usize,
    closed: bool,
}

/// Source backed by vectors. Clones share state.
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<Mutex<FakeSourceState>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, columns: &[(&str, &str)], rows: Vec<RawRow>) -> Self {
        self.lock().tables.push(FakeTable {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(n, t)| SourceColumn::new(*n, *t))
                .collect(),
            rows,
        });
        self
    }

    /// Make `fetch_page` fail for pages starting at `offset`.
    pub fn failing_fetch_at(self, offset: u64) -> Self {
        self.lock().failing_offsets.insert(offset);
        self
    }

    /// Make the first `times` schema reads fail.
    pub fn failing_schema(self, times: usize) -> Self {
        self.lock().schema_failures = times;
        self
    }

    pub fn schema_calls(&self) -> usize {
        self.lock().schema_calls
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, FakeSourceState> {
        self.state.lock().unwrap()
    }
}

fn no_such_table(table: &str) -> MigrateError {
    MigrateError::SchemaExtraction(format!("no such table: {}", table))
}

#[async_trait]
impl SourceReader for FakeSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.lock().tables.iter().map(|t| t.name.clone()).collect())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<SourceColumn>> {
        let mut state = self.lock();
        state.schema_calls += 1;
        if state.schema_failures > 0 {
            state.schema_failures -= 1;
            return Err(MigrateError::pool("database is locked", "reading schema"));
        }
        state
            .tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| no_such_table(table))
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        self.lock()
            .tables
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| no_such_table(table))
    }

    async fn fetch_page(&self, table: &str, limit: usize, offset: u64) -> Result<Vec<RawRow>> {
        let state = self.lock();
        if state.failing_offsets.contains(&offset) {
            return Err(MigrateError::pool("database disk image is malformed", "fetching page"));
        }
        let t = state
            .tables
            .iter()
            .find(|t| t.name == table)
            .ok_or_else(|| no_such_table(table))?;
        Ok(t.rows
            .iter()
            .skip(offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    fn db_type(&self) -> &str {
        "fake-sqlite"
    }

    async fn close(&self) {
        self.lock().closed = true;
    }
}

#[derive(Default)]
struct FakeTargetState {
    statements: Vec<String>,
    /// Catalog table name to ordered (column, type).
    tables: HashMap<String, Vec<(String, String)>>,
    rows: HashMap<String, Vec<Vec<String>>>,
    pending: Vec<(String, Vec<String>)>,
    in_transaction: bool,
    failing_marker: Option<String>,
    fail_create: bool,
    fail_commit: bool,
    rollbacks: usize,
    closed: bool,
}

/// Target that records statements instead of executing them. Clones share
/// state.
#[derive(Clone, Default)]
pub struct FakeTarget {
    state: Arc<Mutex<FakeTargetState>>,
    identifiers: IdentifierPolicy,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a target table with the given catalog columns.
    pub fn with_table(self, table: &str, columns: &[(&str, &str)]) -> Self {
        self.lock().tables.insert(
            table.to_string(),
            columns
                .iter()
                .map(|(n, t)| (n.to_string(), t.to_string()))
                .collect(),
        );
        self
    }

    /// Reject inserts whose literals contain `marker`.
    pub fn failing_inserts_containing(self, marker: &str) -> Self {
        self.lock().failing_marker = Some(marker.to_string());
        self
    }

    pub fn failing_create(self) -> Self {
        self.lock().fail_create = true;
        self
    }

    pub fn failing_commit(self) -> Self {
        self.lock().fail_commit = true;
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Committed rows for a table, by catalog name.
    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.lock().rows.get(table).cloned().unwrap_or_default()
    }

    /// Column set of a table, by catalog name.
    pub fn columns(&self, table: &str) -> Vec<(String, String)> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn rollbacks(&self) -> usize {
        self.lock().rollbacks
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, FakeTargetState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl TargetWriter for FakeTarget {
    async fn truncate_table(&self, table: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .statements
            .push(statements::truncate_table(&self.identifiers, table));
        let key = self.identifiers.target_catalog_name(table);
        if !state.tables.contains_key(&key) {
            return Err(MigrateError::transfer(
                table,
                format!("relation \"{}\" does not exist", key),
            ));
        }
        state.rows.remove(&key);
        Ok(())
    }

    async fn column_types(&self, table: &str) -> Result<HashMap<String, String>> {
        let key = self.identifiers.target_catalog_name(table);
        Ok(self
            .lock()
            .tables
            .get(&key)
            .map(|cols| cols.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_table(&self, table: &TableDescriptor) -> Result<()> {
        let mut state = self.lock();
        state
            .statements
            .push(statements::create_table(&self.identifiers, table));
        if state.fail_create {
            return Err(MigrateError::transfer(&table.name, "permission denied for schema public"));
        }
        let key = self.identifiers.target_catalog_name(&table.name);
        let columns = table
            .columns
            .iter()
            .map(|c| {
                (
                    self.identifiers.target_catalog_name(&c.name),
                    c.target_type.to_lowercase(),
                )
            })
            .collect();
        state.tables.entry(key).or_insert(columns);
        Ok(())
    }

    async fn begin(&self) -> Result<()> {
        let mut state = self.lock();
        state.statements.push("BEGIN".to_string());
        state.in_transaction = true;
        state.pending.clear();
        Ok(())
    }

    async fn insert_row(&self, table: &TableDescriptor, literals: &[String]) -> Result<()> {
        let mut state = self.lock();
        state
            .statements
            .push(statements::insert_row(&self.identifiers, table, literals));
        if let Some(marker) = &state.failing_marker {
            if literals.iter().any(|l| l.contains(marker.as_str())) {
                return Err(MigrateError::transfer(&table.name, "violates check constraint"));
            }
        }
        let key = self.identifiers.target_catalog_name(&table.name);
        if state.in_transaction {
            state.pending.push((key, literals.to_vec()));
        } else {
            state.rows.entry(key).or_default().push(literals.to_vec());
        }
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.lock();
        state.statements.push("COMMIT".to_string());
        state.in_transaction = false;
        if state.fail_commit {
            state.pending.clear();
            return Err(MigrateError::pool("connection reset by peer", "commit"));
        }
        let pending = std::mem::take(&mut state.pending);
        for (table, row) in pending {
            state.rows.entry(table).or_default().push(row);
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.lock();
        state.statements.push("ROLLBACK".to_string());
        state.in_transaction = false;
        state.pending.clear();
        state.rollbacks += 1;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "fake-postgres"
    }

    async fn close(&self) {
        self.lock().closed = true;
    }
}
