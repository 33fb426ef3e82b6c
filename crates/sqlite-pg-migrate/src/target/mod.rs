//! PostgreSQL target database operations.

pub mod statements;
pub mod tls;

pub use tls::SslMode;

use crate::config::TargetConfig;
use crate::core::{IdentifierPolicy, TableDescriptor};
use crate::error::{describe_pg_error, MigrateError, Result};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

/// Trait for target database operations.
///
/// All statements run on a single connection. Between [`begin`](Self::begin)
/// and [`commit`](Self::commit), a failed [`insert_row`](Self::insert_row)
/// leaves the transaction usable for the following rows.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// `TRUNCATE ... CASCADE` the table.
    async fn truncate_table(&self, table: &str) -> Result<()>;

    /// Existing column types keyed by catalog column name. Empty when the
    /// table does not exist.
    async fn column_types(&self, table: &str) -> Result<HashMap<String, String>>;

    /// `CREATE TABLE IF NOT EXISTS` using the descriptor's target types.
    async fn create_table(&self, table: &TableDescriptor) -> Result<()>;

    /// Open a transaction.
    async fn begin(&self) -> Result<()>;

    /// Insert one row of literal fragments, in descriptor column order.
    async fn insert_row(&self, table: &TableDescriptor, literals: &[String]) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&self) -> Result<()>;

    /// Roll back the open transaction, if any.
    async fn rollback(&self) -> Result<()>;

    /// Get the database type.
    fn db_type(&self) -> &str;

    /// Release the connection.
    async fn close(&self);
}

/// Result of a target health check.
#[derive(Debug, Clone)]
pub struct TargetHealth {
    pub server_version: String,
    pub latency_ms: u64,
}

/// PostgreSQL target holding one pooled connection for the whole run.
pub struct PgTarget {
    pool: Pool,
    client: Mutex<Option<Object>>,
    identifiers: IdentifierPolicy,
    in_transaction: AtomicBool,
}

impl PgTarget {
    /// Connect and check the target with `SELECT 1`.
    pub async fn connect(config: &TargetConfig, identifiers: IdentifierPolicy) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("sqlite-pg-migrate");
        pg_config.connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        let mgr = match ssl_mode.connector()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => Manager::from_config(pg_config, NoTls, mgr_config),
        };

        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL pool"))?;

        let client = pool.get().await.map_err(|e| {
            let message = match &e {
                PoolError::Backend(pg) => classify_connect_error(pg, config),
                other => format!("Failed to connect to PostgreSQL: {}", other),
            };
            MigrateError::pool(message, format!("connecting to {}", config.address()))
        })?;

        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {} (ssl_mode={})",
            config.address(),
            config.ssl_mode
        );

        Ok(Self {
            pool,
            client: Mutex::new(Some(client)),
            identifiers,
            in_transaction: AtomicBool::new(false),
        })
    }

    /// Round-trip a trivial query and report the server version.
    pub async fn health_check(&self) -> Result<TargetHealth> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed)?;

        let start = Instant::now();
        client.simple_query("SELECT 1").await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let row = client.query_one("SHOW server_version", &[]).await?;
        Ok(TargetHealth {
            server_version: row.get(0),
            latency_ms,
        })
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed)?;
        debug!("{}", sql);
        client.batch_execute(sql).await?;
        Ok(())
    }
}

#[async_trait]
impl TargetWriter for PgTarget {
    async fn truncate_table(&self, table: &str) -> Result<()> {
        self.execute(&statements::truncate_table(&self.identifiers, table))
            .await
    }

    async fn column_types(&self, table: &str) -> Result<HashMap<String, String>> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed)?;

        let catalog_name = self.identifiers.target_catalog_name(table);
        let rows = client
            .query(statements::COLUMN_TYPES_QUERY, &[&catalog_name])
            .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<_, String>(0), row.get::<_, String>(1)))
            .collect())
    }

    async fn create_table(&self, table: &TableDescriptor) -> Result<()> {
        let sql = statements::create_table(&self.identifiers, table);
        info!("Creating table {}: {}", table.name, sql);
        self.execute(&sql).await
    }

    async fn begin(&self) -> Result<()> {
        self.execute("BEGIN").await?;
        self.in_transaction.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn insert_row(&self, table: &TableDescriptor, literals: &[String]) -> Result<()> {
        let sql = statements::insert_row(&self.identifiers, table, literals);
        debug!("{}", sql);
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed)?;

        if !self.in_transaction.load(Ordering::SeqCst) {
            client.batch_execute(&sql).await?;
            return Ok(());
        }

        client
            .batch_execute(&format!("SAVEPOINT {}", statements::ROW_SAVEPOINT))
            .await?;

        match client.batch_execute(&sql).await {
            Ok(()) => {
                client
                    .batch_execute(&format!("RELEASE SAVEPOINT {}", statements::ROW_SAVEPOINT))
                    .await?;
                Ok(())
            }
            Err(e) => {
                client
                    .batch_execute(&format!(
                        "ROLLBACK TO SAVEPOINT {}",
                        statements::ROW_SAVEPOINT
                    ))
                    .await?;
                Err(e.into())
            }
        }
    }

    async fn commit(&self) -> Result<()> {
        self.in_transaction.store(false, Ordering::SeqCst);
        self.execute("COMMIT").await
    }

    async fn rollback(&self) -> Result<()> {
        if !self.in_transaction.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.execute("ROLLBACK").await
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            debug!("Released PostgreSQL connection");
        }
        self.pool.close();
    }
}

fn closed() -> MigrateError {
    MigrateError::pool("connection already closed", "PostgreSQL target")
}

/// Name the likely cause of a failed connection attempt.
pub fn classify_connect_error(err: &tokio_postgres::Error, config: &TargetConfig) -> String {
    describe_connect_failure(err.code(), &describe_pg_error(err), config)
}

/// Classify on the SQLSTATE when the server answered, otherwise on the
/// client-side error text.
pub fn describe_connect_failure(
    code: Option<&SqlState>,
    message: &str,
    config: &TargetConfig,
) -> String {
    let lower = message.to_lowercase();

    match code {
        Some(c) if *c == SqlState::INVALID_PASSWORD => {
            return format!("Invalid password for user '{}'", config.user)
        }
        Some(c) if *c == SqlState::INVALID_CATALOG_NAME => {
            return format!("Database '{}' does not exist", config.database)
        }
        Some(c) if *c == SqlState::INVALID_AUTHORIZATION_SPECIFICATION && lower.contains("role") => {
            return format!("User '{}' does not exist on {}", config.user, config.address())
        }
        _ => {}
    }

    if lower.contains("connection refused")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
    {
        warn!("PostgreSQL server unreachable: {}", message);
        format!(
            "Cannot reach PostgreSQL server at {}:{}",
            config.host, config.port
        )
    } else {
        format!("Failed to connect to PostgreSQL: {}", message)
    }
}
