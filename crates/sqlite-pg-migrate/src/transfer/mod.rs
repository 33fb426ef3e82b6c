//! Paged row copy for a single table.
//!
//! Rows are read in `LIMIT/OFFSET` pages and inserted one by one inside a
//! transaction per page. A row that fails is recorded and skipped; it still
//! consumes its offset slot and is never retried.

use crate::core::{MigrationReport, TableDescriptor};
use crate::error::{MigrateError, Result};
use crate::source::SourceReader;
use crate::target::TargetWriter;
use crate::transcode::Transcoder;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, warn};

/// Progress line emitted to stderr after each page when enabled.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate<'a> {
    pub table: &'a str,
    pub processed: u64,
    pub total: u64,
    pub rows_committed: u64,
    pub rows_failed: u64,
}

/// Drives the page loop for one table at a time.
pub struct BatchDriver<'a> {
    source: &'a dyn SourceReader,
    target: &'a dyn TargetWriter,
    transcoder: Transcoder,
    progress: bool,
}

impl<'a> BatchDriver<'a> {
    pub fn new(source: &'a dyn SourceReader, target: &'a dyn TargetWriter) -> Self {
        Self {
            source,
            target,
            transcoder: Transcoder::new(),
            progress: false,
        }
    }

    /// Print a JSON progress line to stderr after each page.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Copy every row of `table`. Errors are returned only when the row
    /// count cannot be read or a page commit fails.
    pub async fn migrate_table(
        &self,
        table: &TableDescriptor,
        page_size: usize,
    ) -> Result<MigrationReport> {
        let start = Instant::now();
        let page_size = page_size.max(1);
        let mut report = MigrationReport::new(&table.name);

        let total = self.source.row_count(&table.name).await?;
        report.rows_total = total;
        info!("{}: migrating {} rows (page size {})", table.name, total, page_size);

        let mut processed: u64 = 0;
        while processed < total {
            let rows = match self
                .source
                .fetch_page(&table.name, page_size, processed)
                .await
            {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(
                        "{}: skipping rows {}..{} after read failure: {}",
                        table.name,
                        processed,
                        processed + page_size as u64,
                        e
                    );
                    processed += page_size as u64;
                    report.pages_skipped += 1;
                    continue;
                }
            };

            if rows.is_empty() {
                break;
            }

            self.target.begin().await?;

            let mut committed_in_page = 0u64;
            for (i, row) in rows.iter().enumerate() {
                let row_index = processed + i as u64;

                let outcome = match self.transcoder.transcode(row, table, row_index) {
                    Ok(transcoded) => {
                        for warning in &transcoded.warnings {
                            warn!(
                                "{}: row {} column {}: {}",
                                warning.table, warning.row_index, warning.column, warning.message
                            );
                        }
                        report.warnings.extend(transcoded.warnings);
                        self.target.insert_row(table, &transcoded.literals).await
                    }
                    Err(e) => Err(e),
                };

                match outcome {
                    Ok(()) => committed_in_page += 1,
                    Err(e) => report.record_failure(row_index, e.to_string()),
                }
            }

            processed += rows.len() as u64;
            report.rows_attempted += rows.len() as u64;

            self.target.commit().await.map_err(|e| {
                MigrateError::transfer(
                    &table.name,
                    format!("commit failed at offset {}: {}", processed, e),
                )
            })?;
            report.rows_committed += committed_in_page;

            info!("{}: {}/{} rows processed", table.name, processed.min(total), total);
            if self.progress {
                self.emit_progress(&report, processed.min(total), total);
            }
        }

        report.duration_seconds = start.elapsed().as_secs_f64();

        info!(
            "{}: {} rows completed, {} rows failed",
            table.name,
            report.rows_committed,
            report.rows_failed()
        );
        for failed in &report.failed_rows {
            error!("{}: row {} failed: {}", failed.table, failed.row_index, failed.error);
        }

        Ok(report)
    }

    fn emit_progress(&self, report: &MigrationReport, processed: u64, total: u64) {
        let update = ProgressUpdate {
            table: &report.table,
            processed,
            total,
            rows_committed: report.rows_committed,
            rows_failed: report.rows_failed(),
        };
        if let Ok(json) = serde_json::to_string(&update) {
            eprintln!("{}", json);
        }
    }
}
