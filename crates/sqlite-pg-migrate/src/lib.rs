//! # sqlite-pg-migrate
//!
//! One-shot bulk migration of a SQLite database into PostgreSQL.
//!
//! Every user table of the source is copied into a table of the same name
//! on the target:
//!
//! - **Schema sync**: the target table is truncated, or created from mapped
//!   types when it does not exist
//! - **Paged copy** with one transaction per page
//! - **Row-level recovery**: a bad row is logged and skipped, the page still
//!   commits
//! - **JSON columns** are validated and written as `jsonb` literals
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::connect(&config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Migrated {} rows", result.rows_committed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod sync;
pub mod target;
pub mod transcode;
pub mod transfer;
pub mod typemap;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use core::{
    FailedRow, IdentifierPolicy, MigrationReport, RawValue, TableDescriptor, TranscodeWarning,
};
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator, SourceSummary};
pub use source::{SourceReader, SqliteSource};
pub use sync::SchemaSync;
pub use target::{PgTarget, TargetWriter};
pub use transcode::Transcoder;
pub use transfer::BatchDriver;
pub use typemap::TypeMapper;
