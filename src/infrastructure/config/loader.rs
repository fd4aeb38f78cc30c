//! Hierarchical config loading: defaults, then project and local YAML
//! overrides, then environment variables, merged through a figment pipeline.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("database.path cannot be empty")]
    EmptyDatabasePath,

    #[error("database.max_connections must be at least 1")]
    InvalidMaxConnections,

    #[error("logging.level must be one of: trace, debug, info, warn, error (got {0})")]
    InvalidLogLevel(String),

    #[error("logging.format must be one of: json, pretty (got {0})")]
    InvalidLogFormat(String),

    #[error("bootstrap_concurrency must be at least 1")]
    InvalidBootstrapConcurrency,

    #[error("circuit_breaker_threshold must be at least 1")]
    InvalidCircuitBreakerThreshold,

    #[error("clarify_max_rounds must be at least 1")]
    InvalidClarifyMaxRounds,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence, lowest to highest:
    /// 1. Programmatic defaults
    /// 2. `.taskwing/config.yaml` (project config)
    /// 3. `.taskwing/local.yaml` (project-local overrides, optional)
    /// 4. `TASKWING_*` environment variables
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".taskwing/config.yaml"))
            .merge(Yaml::file(".taskwing/local.yaml"))
            .merge(Env::prefixed("TASKWING_").split("__"))
            .extract()
            .context("failed to extract configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections);
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.bootstrap_concurrency == 0 {
            return Err(ConfigError::InvalidBootstrapConcurrency);
        }
        if config.circuit_breaker_threshold == 0 {
            return Err(ConfigError::InvalidCircuitBreakerThreshold);
        }
        if config.clarify_max_rounds == 0 {
            return Err(ConfigError::InvalidClarifyMaxRounds);
        }

        Ok(())
    }
}
