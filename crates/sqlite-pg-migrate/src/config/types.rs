//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Page size above which a warning is logged.
pub const PAGE_SIZE_SOFT_LIMIT: usize = 10_000;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,

    /// Run integrity checks before migrating (default: true).
    #[serde(default = "default_true")]
    pub integrity_check: bool,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name (default: "postgres").
    #[serde(default = "default_postgres")]
    pub database: String,

    /// Username (default: "postgres").
    #[serde(default = "default_postgres")]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,

    /// Connect timeout in seconds (default: 5).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows fetched per page (default: 500).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Attempts made to read a source table schema (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Bookkeeping tables that are never migrated.
    #[serde(default = "default_excluded_tables")]
    pub excluded_tables: Vec<String>,

    /// Column names that always map to the JSON type.
    #[serde(default = "default_json_columns")]
    pub json_columns: Vec<String>,

    /// Target identifiers that must be quoted.
    #[serde(default = "default_reserved_words")]
    pub reserved_words: Vec<String>,

    /// Declared source type (upper-case) to target type.
    #[serde(default = "default_type_map")]
    pub type_map: BTreeMap<String, String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_retries: default_max_retries(),
            excluded_tables: default_excluded_tables(),
            json_columns: default_json_columns(),
            reserved_words: default_reserved_words(),
            type_map: default_type_map(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pg_port() -> u16 {
    5432
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_page_size() -> usize {
    500
}

fn default_max_retries() -> usize {
    3
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_excluded_tables() -> Vec<String> {
    to_strings(&["migratehistory", "alembic_version"])
}

fn default_json_columns() -> Vec<String> {
    to_strings(&["data", "meta", "permissions", "user_ids"])
}

fn default_reserved_words() -> Vec<String> {
    to_strings(&[
        "user",
        "group",
        "order",
        "table",
        "select",
        "where",
        "from",
        "index",
        "constraint",
    ])
}

fn default_type_map() -> BTreeMap<String, String> {
    [
        ("INTEGER", "INTEGER"),
        ("REAL", "DOUBLE PRECISION"),
        ("TEXT", "TEXT"),
        ("BLOB", "BYTEA"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl TargetConfig {
    /// Target config with defaults for everything but the host.
    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_pg_port(),
            database: default_postgres(),
            user: default_postgres(),
            password: String::new(),
            ssl_mode: default_disable(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}
