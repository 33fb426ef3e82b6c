//! Per-table outcome records.

use serde::{Deserialize, Serialize};

/// A row that could not be migrated. Never retried within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRow {
    /// Table the row belongs to.
    pub table: String,

    /// Logical row index: page offset plus position within the page.
    pub row_index: u64,

    /// Error description.
    pub error: String,
}

/// A value that was replaced during transcoding (invalid JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeWarning {
    pub table: String,
    pub row_index: u64,
    pub column: String,
    pub message: String,
}

/// Outcome of migrating one table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Table name.
    pub table: String,

    /// Row count reported by the source before the first page (advisory).
    pub rows_total: u64,

    /// Rows read from the source and offered to the target.
    pub rows_attempted: u64,

    /// Rows inserted and committed.
    pub rows_committed: u64,

    /// Pages skipped because the source could not be read.
    pub pages_skipped: u64,

    /// Rows that failed, in encounter order.
    pub failed_rows: Vec<FailedRow>,

    /// Values replaced during transcoding.
    pub warnings: Vec<TranscodeWarning>,

    /// Wall time spent on the table.
    pub duration_seconds: f64,
}

impl MigrationReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn rows_failed(&self) -> u64 {
        self.failed_rows.len() as u64
    }

    /// Record a failed row.
    pub fn record_failure(&mut self, row_index: u64, error: impl Into<String>) {
        self.failed_rows.push(FailedRow {
            table: self.table.clone(),
            row_index,
            error: error.into(),
        });
    }
}
