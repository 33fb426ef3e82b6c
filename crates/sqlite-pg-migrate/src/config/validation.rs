//! Configuration validation.

use super::{Config, PAGE_SIZE_SOFT_LIMIT};
use crate::error::{MigrateError, Result};
use tracing::warn;

const SSL_MODES: &[&str] = &["disable", "require", "verify-ca", "verify-full"];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    let ssl_mode = config.target.ssl_mode.to_lowercase();
    if !SSL_MODES.contains(&ssl_mode.as_str()) {
        return Err(MigrateError::Config(format!(
            "target.ssl_mode must be one of {}, got '{}'",
            SSL_MODES.join(", "),
            config.target.ssl_mode
        )));
    }

    // Migration validation
    if config.migration.page_size == 0 {
        return Err(MigrateError::Config(
            "migration.page_size must be at least 1".into(),
        ));
    }
    if config.migration.page_size > PAGE_SIZE_SOFT_LIMIT {
        warn!(
            "migration.page_size={} is above {}; large pages may use a lot of memory",
            config.migration.page_size, PAGE_SIZE_SOFT_LIMIT
        );
    }
    if config.migration.max_retries == 0 {
        return Err(MigrateError::Config(
            "migration.max_retries must be at least 1".into(),
        ));
    }

    Ok(())
}
