//! Error types for the migration library.

use thiserror::Error;

/// Process exit codes used by the CLI.
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_SOURCE_ERROR: u8 = 2;
pub const EXIT_TARGET_ERROR: u8 = 3;
pub const EXIT_SCHEMA_ERROR: u8 = 4;
pub const EXIT_TRANSFER_ERROR: u8 = 5;
pub const EXIT_INTEGRITY_ERROR: u8 = 6;
pub const EXIT_IO_ERROR: u8 = 7;
pub const EXIT_INTERNAL_ERROR: u8 = 8;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad env file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source (SQLite) open or query error
    #[error("Source database error: {0}")]
    Source(#[from] rusqlite::Error),

    /// Target (PostgreSQL) connection or query error
    #[error("Target database error: {}", describe_pg_error(.0))]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Source schema could not be read
    #[error("Schema extraction failed: {0}")]
    SchemaExtraction(String),

    /// Source database failed an integrity check
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Migration failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// A row could not be converted into insert literals
    #[error("Transcode failed for column {column}: {message}")]
    Transcode { column: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking source task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Map the error to a process exit code.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::Source(_) => EXIT_SOURCE_ERROR,
            MigrateError::Target(_) | MigrateError::Pool { .. } => EXIT_TARGET_ERROR,
            MigrateError::SchemaExtraction(_) => EXIT_SCHEMA_ERROR,
            MigrateError::Transfer { .. } | MigrateError::Transcode { .. } => EXIT_TRANSFER_ERROR,
            MigrateError::Integrity(_) => EXIT_INTEGRITY_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Json(_) | MigrateError::Task(_) => EXIT_INTERNAL_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Full text of a PostgreSQL error: the server message with its SQLSTATE,
/// detail and hint, or the chain of client-side causes.
pub fn describe_pg_error(err: &tokio_postgres::Error) -> String {
    if let Some(db) = err.as_db_error() {
        let mut text = format!("{} {}: {}", db.severity(), db.code().code(), db.message());
        if let Some(detail) = db.detail() {
            text.push_str(&format!(" (DETAIL: {})", detail));
        }
        if let Some(hint) = db.hint() {
            text.push_str(&format!(" (HINT: {})", hint));
        }
        return text;
    }

    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
