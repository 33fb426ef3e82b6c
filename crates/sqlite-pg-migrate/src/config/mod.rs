//! Configuration loading and validation.

mod env_file;
mod types;
mod validation;

pub use env_file::parse_env;
pub use types::*;

use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a `.env`-style file.
    pub fn from_env_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_env_map(&parse_env(&content))
    }

    /// Build configuration from already-parsed env variables.
    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self> {
        let config = env_file::config_from_env(vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// `host:port/database` for log lines. Never includes credentials.
    pub fn address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}
