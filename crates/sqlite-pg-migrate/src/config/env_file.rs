//! `.env`-style configuration files.
//!
//! Lines are `KEY=VALUE`. Blank lines and `#` comments are skipped, lines
//! without `=` are skipped with a warning, and one layer of matching single
//! or double quotes around the value is removed.

use super::{Config, MigrationConfig, SourceConfig, TargetConfig};
use crate::error::{MigrateError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

/// Parse env file content into a key/value map. Later keys win.
pub fn parse_env(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            warn!("Skipping malformed env line {}: {}", idx + 1, line);
            continue;
        };

        vars.insert(key.trim().to_string(), unquote(value.trim()).to_string());
    }

    vars
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// First non-empty value among `keys`.
fn lookup<'a>(vars: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| vars.get(*k))
        .map(String::as_str)
        .find(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| MigrateError::Config(format!("{} must be a number, got '{}'", key, value)))
}

/// Build a configuration from env variables.
pub fn config_from_env(vars: &HashMap<String, String>) -> Result<Config> {
    let path = lookup(vars, &["SQLITE_DB_PATH"])
        .ok_or_else(|| MigrateError::Config("SQLITE_DB_PATH is not set".into()))?;

    let host = lookup(vars, &["POSTGRES_HOST", "PG_HOST"])
        .ok_or_else(|| MigrateError::Config("POSTGRES_HOST (or PG_HOST) is not set".into()))?;

    let mut target = TargetConfig::with_host(host);
    if let Some(port) = lookup(vars, &["POSTGRES_PORT", "PG_PORT"]) {
        target.port = parse_number("POSTGRES_PORT", port)?;
    }
    if let Some(db) = lookup(vars, &["POSTGRES_DB", "PG_DATABASE", "POSTGRES_DATABASE"]) {
        target.database = db.to_string();
    }
    if let Some(user) = lookup(vars, &["POSTGRES_USER", "PG_USER"]) {
        target.user = user.to_string();
    }
    if let Some(password) = lookup(vars, &["POSTGRES_PASSWORD", "PG_PASSWORD"]) {
        target.password = password.to_string();
    }
    if let Some(ssl_mode) = lookup(vars, &["PG_SSLMODE", "POSTGRES_SSLMODE"]) {
        target.ssl_mode = ssl_mode.to_string();
    }

    let mut migration = MigrationConfig::default();
    if let Some(size) = lookup(vars, &["MIGRATION_BATCH_SIZE"]) {
        migration.page_size = parse_number("MIGRATION_BATCH_SIZE", size)?;
    }

    Ok(Config {
        source: SourceConfig {
            path: PathBuf::from(path),
            integrity_check: true,
        },
        target,
        migration,
    })
}
