//! Migration orchestrator - main workflow coordinator.

use crate::config::{Config, MigrationConfig};
use crate::core::{IdentifierPolicy, MigrationReport};
use crate::error::Result;
use crate::source::{SourceReader, SqliteSource};
use crate::sync::SchemaSync;
use crate::target::{PgTarget, TargetWriter};
use crate::transfer::BatchDriver;
use crate::typemap::TypeMapper;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};

/// Migration orchestrator.
///
/// Owns the source and target for the duration of one run; both are closed
/// when [`run`](Self::run) returns, whatever the outcome.
pub struct Orchestrator {
    config: MigrationConfig,
    source: Box<dyn SourceReader>,
    target: Box<dyn TargetWriter>,
    progress: bool,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Tables migrated (excluded tables are not counted).
    pub tables_total: usize,

    /// Names of tables skipped as bookkeeping tables.
    pub tables_excluded: Vec<String>,

    /// Rows committed across all tables.
    pub rows_committed: u64,

    /// Rows that failed across all tables.
    pub rows_failed: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,

    /// Per-table reports, in migration order.
    pub tables: Vec<MigrationReport>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity report for `health-check`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_version: Option<String>,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_version: Option<String>,
    pub target_error: Option<String>,
    pub healthy: bool,
}

/// One source table as seen by `check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: u64,
    pub excluded: bool,
}

/// Source inspection report for `check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    pub path: String,
    pub sqlite_version: String,
    pub tables: Vec<TableSummary>,
}

impl Orchestrator {
    /// Create an orchestrator over already-open endpoints.
    pub fn new(
        source: Box<dyn SourceReader>,
        target: Box<dyn TargetWriter>,
        config: MigrationConfig,
    ) -> Self {
        Self {
            config,
            source,
            target,
            progress: false,
        }
    }

    /// Open the SQLite source, verify it and connect to PostgreSQL.
    pub async fn connect(config: &Config) -> Result<Self> {
        let source = SqliteSource::open(&config.source)?;

        if config.source.integrity_check {
            if let Err(e) = source.check_integrity().await {
                source.close().await;
                return Err(e);
            }
        } else {
            warn!("Skipping source integrity check");
        }

        let identifiers = IdentifierPolicy::new(&config.migration.reserved_words);
        let target = match PgTarget::connect(&config.target, identifiers).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::new(
            Box::new(source),
            Box::new(target),
            config.migration.clone(),
        ))
    }

    /// Enable JSON progress lines on stderr.
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Run the migration.
    pub async fn run(self) -> Result<MigrationResult> {
        let outcome = self.migrate_all().await;

        if let Err(ref e) = outcome {
            error!("Migration aborted: {}", e);
            if let Err(rollback_err) = self.target.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
        }

        self.source.close().await;
        self.target.close().await;

        outcome
    }

    async fn migrate_all(&self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(
            "Starting migration run {} ({} -> {})",
            run_id,
            self.source.db_type(),
            self.target.db_type()
        );

        let mapper = TypeMapper::from_config(&self.config);
        let identifiers = IdentifierPolicy::new(&self.config.reserved_words);
        let sync = SchemaSync::new(
            self.source.as_ref(),
            self.target.as_ref(),
            &mapper,
            &identifiers,
            self.config.max_retries,
        );
        let driver = BatchDriver::new(self.source.as_ref(), self.target.as_ref())
            .with_progress(self.progress);

        let mut tables_excluded = Vec::new();
        let mut reports = Vec::new();

        for table in self.source.list_tables().await? {
            if self.config.excluded_tables.contains(&table) {
                info!("Skipping bookkeeping table {}", table);
                tables_excluded.push(table);
                continue;
            }

            info!("Migrating table {}", table);
            let descriptor = sync.synchronize(&table).await?;
            let report = driver
                .migrate_table(&descriptor, self.config.page_size)
                .await?;
            reports.push(report);
        }

        let duration = start.elapsed().as_secs_f64();
        let rows_committed: u64 = reports.iter().map(|r| r.rows_committed).sum();
        let rows_failed: u64 = reports.iter().map(|r| r.rows_failed()).sum();
        let rows_per_second = if duration > 0.0 {
            (rows_committed as f64 / duration) as u64
        } else {
            0
        };

        info!(
            "Migration complete: {} tables, {} rows committed, {} rows failed in {:.2}s",
            reports.len(),
            rows_committed,
            rows_failed,
            duration
        );

        Ok(MigrationResult {
            run_id,
            status: "completed".to_string(),
            duration_seconds: duration,
            started_at,
            completed_at: Utc::now(),
            tables_total: reports.len(),
            tables_excluded,
            rows_committed,
            rows_failed,
            rows_per_second,
            tables: reports,
        })
    }

    /// Test both connections. Never fails; problems are reported in the result.
    pub async fn health_check(config: &Config) -> HealthCheckResult {
        let mut result = HealthCheckResult::default();

        let start = Instant::now();
        match SqliteSource::open(&config.source) {
            Ok(source) => {
                match source.version().await {
                    Ok(version) => {
                        result.source_connected = true;
                        result.source_version = Some(version);
                    }
                    Err(e) => result.source_error = Some(e.to_string()),
                }
                source.close().await;
            }
            Err(e) => result.source_error = Some(e.to_string()),
        }
        result.source_latency_ms = start.elapsed().as_millis() as u64;

        let identifiers = IdentifierPolicy::new(&config.migration.reserved_words);
        match PgTarget::connect(&config.target, identifiers).await {
            Ok(target) => {
                match target.health_check().await {
                    Ok(health) => {
                        result.target_connected = true;
                        result.target_latency_ms = health.latency_ms;
                        result.target_version = Some(health.server_version);
                    }
                    Err(e) => result.target_error = Some(e.to_string()),
                }
                target.close().await;
            }
            Err(e) => result.target_error = Some(e.to_string()),
        }

        result.healthy = result.source_connected && result.target_connected;
        result
    }

    /// Open and verify the source, then list its tables and row counts.
    pub async fn check_source(config: &Config) -> Result<SourceSummary> {
        let source = SqliteSource::open(&config.source)?;
        let summary = Self::summarize(&source, config).await;
        source.close().await;
        summary
    }

    async fn summarize(source: &SqliteSource, config: &Config) -> Result<SourceSummary> {
        let sqlite_version = source.version().await?;
        if config.source.integrity_check {
            source.check_integrity().await?;
        } else {
            warn!("Skipping source integrity check");
        }

        let mut tables = Vec::new();
        for name in source.list_tables().await? {
            let rows = source.row_count(&name).await?;
            tables.push(TableSummary {
                excluded: config.migration.excluded_tables.contains(&name),
                name,
                rows,
            });
        }

        Ok(SourceSummary {
            path: source.path().display().to_string(),
            sqlite_version,
            tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RawValue;
    use crate::error::MigrateError;
    use crate::test_support::{FakeSource, FakeTarget};
    use rusqlite::Connection;

    fn sqlite_source(sql: &str) -> SqliteSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(sql).unwrap();
        SqliteSource::from_connection(conn)
    }

    fn orchestrator(source: Box<dyn SourceReader>, target: &FakeTarget) -> Orchestrator {
        Orchestrator::new(source, Box::new(target.clone()), MigrationConfig::default())
    }

    #[tokio::test]
    async fn test_settings_table_end_to_end() {
        let source = sqlite_source(
            "CREATE TABLE settings (id INTEGER, data TEXT);
             INSERT INTO settings VALUES (1, '{\"a\":1}');",
        );
        let target = FakeTarget::new();

        let result = orchestrator(Box::new(source), &target).run().await.unwrap();

        assert_eq!(result.tables_total, 1);
        assert_eq!(result.rows_committed, 1);
        assert!(target
            .columns("settings")
            .contains(&("data".to_string(), "jsonb".to_string())));
        assert_eq!(
            target.rows("settings"),
            vec![vec!["1".to_string(), "'{\"a\":1}'::jsonb".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_warning_not_a_failure() {
        let source = sqlite_source(
            "CREATE TABLE settings (id INTEGER, data TEXT);
             INSERT INTO settings VALUES (1, 'not json at all');",
        );
        let target = FakeTarget::new();

        let result = orchestrator(Box::new(source), &target).run().await.unwrap();

        let report = &result.tables[0];
        assert_eq!(report.rows_failed(), 0);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(target.rows("settings")[0][1], "'{}'::jsonb");
    }

    #[tokio::test]
    async fn test_reserved_table_name_round_trip() {
        let source = sqlite_source(
            "CREATE TABLE \"group\" (id TEXT, name TEXT);
             INSERT INTO \"group\" VALUES ('g1', 'Admins');",
        );
        let target = FakeTarget::new();

        orchestrator(Box::new(source), &target).run().await.unwrap();

        let statements = target.statements();
        assert!(statements.contains(&"TRUNCATE TABLE \"group\" CASCADE".to_string()));
        assert!(statements
            .contains(&"INSERT INTO \"group\" (id, name) VALUES ('g1', 'Admins')".to_string()));
    }

    #[tokio::test]
    async fn test_bookkeeping_tables_are_excluded() {
        let source = FakeSource::new()
            .with_table("alembic_version", &[("version_num", "TEXT")], vec![vec![RawValue::text("abc")]])
            .with_table("users", &[("id", "INTEGER")], vec![vec![RawValue::Integer(1)]])
            .with_table("migratehistory", &[("id", "INTEGER")], vec![]);
        let target = FakeTarget::new();

        let result = orchestrator(Box::new(source), &target).run().await.unwrap();

        let names: Vec<&str> = result.tables.iter().map(|r| r.table.as_str()).collect();
        assert_eq!(names, vec!["users"]);
        assert_eq!(result.tables_excluded, vec!["alembic_version", "migratehistory"]);
        assert!(target
            .statements()
            .iter()
            .all(|s| !s.contains("alembic_version") && !s.contains("migratehistory")));
    }

    #[tokio::test]
    async fn test_failed_rows_do_not_fail_the_run() {
        let source = FakeSource::new().with_table(
            "users",
            &[("id", "INTEGER"), ("name", "TEXT")],
            vec![
                vec![RawValue::Integer(1), RawValue::text("a")],
                vec![RawValue::Integer(2)],
                vec![RawValue::Integer(3), RawValue::text("c")],
            ],
        );
        let target = FakeTarget::new();

        let result = orchestrator(Box::new(source.clone()), &target).run().await.unwrap();

        assert_eq!(result.status, "completed");
        assert_eq!(result.rows_committed, 2);
        assert_eq!(result.rows_failed, 1);
        assert_eq!(result.tables[0].failed_rows[0].row_index, 1);
        assert!(source.is_closed());
        assert!(target.is_closed());
        assert_eq!(target.rollbacks(), 0);
    }

    #[tokio::test]
    async fn test_table_failure_rolls_back_and_closes() {
        let source = FakeSource::new()
            .with_table("users", &[("id", "INTEGER")], vec![vec![RawValue::Integer(1)]]);
        let target = FakeTarget::new().failing_create();

        let err = orchestrator(Box::new(source.clone()), &target)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, MigrateError::Transfer { .. }));
        assert_eq!(target.rollbacks(), 1);
        assert!(source.is_closed());
        assert!(target.is_closed());
    }

    #[tokio::test]
    async fn test_result_serializes_to_json() {
        let source = FakeSource::new()
            .with_table("users", &[("id", "INTEGER")], vec![vec![RawValue::Integer(1)]]);
        let target = FakeTarget::new();

        let result = orchestrator(Box::new(source), &target).run().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();

        assert_eq!(json["rows_committed"], 1);
        assert_eq!(json["tables"][0]["table"], "users");
    }

    fn dangling_child_config(dir: &tempfile::TempDir, integrity_check: bool) -> Config {
        let path = dir.path().join("webui.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys=OFF;
             CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (id INTEGER, parent_id INTEGER REFERENCES parent(id));
             INSERT INTO child VALUES (1, 99);",
        )
        .unwrap();
        drop(conn);

        Config {
            source: crate::config::SourceConfig {
                path,
                integrity_check,
            },
            target: crate::config::TargetConfig::with_host("localhost"),
            migration: MigrationConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_check_source_reports_integrity_failure() {
        let dir = tempfile::tempdir().unwrap();
        let config = dangling_child_config(&dir, true);

        let err = Orchestrator::check_source(&config).await.unwrap_err();
        assert!(matches!(err, MigrateError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_check_source_honors_disabled_integrity_check() {
        let dir = tempfile::tempdir().unwrap();
        let config = dangling_child_config(&dir, false);

        let summary = Orchestrator::check_source(&config).await.unwrap();
        let names: Vec<_> = summary.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["parent", "child"]);
        assert_eq!(summary.tables[1].rows, 1);
    }
}
