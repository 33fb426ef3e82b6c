//! SQLite source database operations.

use crate::config::SourceConfig;
use crate::core::{quote_sqlite, RawRow, RawValue, SourceColumn};
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Busy timeout used when the source file is shared with a running app.
const BUSY_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait for source database operations.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List user tables in creation order.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Ordered (name, declared type) pairs for a table.
    async fn table_columns(&self, table: &str) -> Result<Vec<SourceColumn>>;

    /// Row count for a table.
    async fn row_count(&self, table: &str) -> Result<u64>;

    /// Fetch up to `limit` rows starting at `offset`.
    async fn fetch_page(&self, table: &str, limit: usize, offset: u64) -> Result<Vec<RawRow>>;

    /// Get the database type.
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(&self);
}

/// SQLite source backed by a single rusqlite connection.
///
/// rusqlite is synchronous; every call runs on the blocking pool while the
/// caller awaits, so at most one source query is in flight.
pub struct SqliteSource {
    conn: Arc<Mutex<Option<Connection>>>,
    path: PathBuf,
}

impl SqliteSource {
    /// Open and verify a SQLite database file.
    pub fn open(config: &SourceConfig) -> Result<Self> {
        let path = config.path.as_path();
        if !path.exists() {
            return Err(MigrateError::Config(format!(
                "SQLite file '{}' does not exist",
                path.display()
            )));
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let version: String = conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
        info!(
            "Opened SQLite database {} (version {}, journal_mode={})",
            path.display(),
            version,
            mode
        );

        Ok(Self::with_path(conn, path))
    }

    /// Wrap an already-open connection (in-memory databases, tests).
    pub fn from_connection(conn: Connection) -> Self {
        Self::with_path(conn, Path::new(":memory:"))
    }

    fn with_path(conn: Connection, path: &Path) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path: path.to_path_buf(),
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let path = self.path.display().to_string();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let conn = guard
                .as_ref()
                .ok_or_else(|| MigrateError::pool("SQLite connection is closed", path))?;
            f(conn)
        })
        .await?
    }

    /// SQLite library version.
    pub async fn version(&self) -> Result<String> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?)
        })
        .await
    }

    /// Run SQLite's integrity, quick and foreign-key checks, then make sure
    /// the schema table itself is readable.
    pub async fn check_integrity(&self) -> Result<()> {
        self.with_conn(|conn| {
            let checks = [
                ("Integrity check", "PRAGMA integrity_check"),
                ("Quick check", "PRAGMA quick_check"),
                ("Foreign key check", "PRAGMA foreign_key_check"),
            ];

            for (name, pragma) in checks {
                let findings = pragma_findings(conn, pragma)?;
                let passed = findings.is_empty() || findings == ["ok"];
                if !passed {
                    return Err(MigrateError::Integrity(format!(
                        "{} failed: {}",
                        name,
                        findings.join("; ")
                    )));
                }
                info!("{}: passed", name);
            }

            conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(|e| MigrateError::Integrity(format!("database appears to be corrupted: {}", e)))?;

            Ok(())
        })
        .await
    }
}

/// Collect every row of a PRAGMA as a single display string.
fn pragma_findings(conn: &Connection, pragma: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(pragma)?;
    let width = stmt.column_count();
    let mut rows = stmt.query([])?;
    let mut findings = Vec::new();

    while let Some(row) = rows.next()? {
        let mut parts = Vec::with_capacity(width);
        for idx in 0..width {
            parts.push(match RawValue::from(row.get_ref(idx)?) {
                RawValue::Null => "NULL".to_string(),
                RawValue::Integer(i) => i.to_string(),
                RawValue::Real(f) => f.to_string(),
                RawValue::Text(t) | RawValue::Blob(t) => String::from_utf8_lossy(&t).into_owned(),
            });
        }
        findings.push(parts.join(" "));
    }

    Ok(findings)
}

#[async_trait]
impl SourceReader for SqliteSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                 ORDER BY rowid",
            )?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(names)
        })
        .await
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<SourceColumn>> {
        let sql = format!("PRAGMA table_info({})", quote_sqlite(table));
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let columns = stmt
                .query_map([], |row| {
                    Ok(SourceColumn {
                        name: row.get(1)?,
                        declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(columns)
        })
        .await
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_sqlite(table));
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn fetch_page(&self, table: &str, limit: usize, offset: u64) -> Result<Vec<RawRow>> {
        let sql = format!("SELECT * FROM {} LIMIT ?1 OFFSET ?2", quote_sqlite(table));
        debug!("{} (limit={}, offset={})", sql, limit, offset);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let width = stmt.column_count();
            let mut rows = stmt.query(params![limit as i64, offset as i64])?;
            let mut page = Vec::with_capacity(limit.min(10_000));

            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(RawValue::from(row.get_ref(idx)?));
                }
                page.push(values);
            }

            Ok(page)
        })
        .await
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        let conn = Arc::clone(&self.conn);
        let closed = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match guard.take() {
                Some(conn) => conn.close().map_err(|(_, e)| e),
                None => Ok(()),
            }
        })
        .await;

        match closed {
            Ok(Ok(())) => debug!("Closed SQLite source {}", self.path.display()),
            Ok(Err(e)) => warn!("Error closing SQLite source: {}", e),
            Err(e) => warn!("SQLite close task failed: {}", e),
        }
    }
}
