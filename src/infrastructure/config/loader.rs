use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{Config, RetryConfig, SolverBackend};

/// Project-local directory holding config files and the default database.
pub const CONFIG_DIR: &str = ".foilopt";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid search configuration: {0}")]
    InvalidSearch(String),

    #[error("The http solver backend needs evaluator.endpoint")]
    MissingEndpoint,

    #[error("Invalid surrogate_noise: {0}. Must be in [0, 0.5]")]
    InvalidNoise(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid {section} backoff: initial_backoff_ms ({initial}) exceeds max_backoff_ms ({max})")]
    InvalidBackoff {
        section: &'static str,
        initial: u64,
        max: u64,
    },

    #[error("Invalid {section} jitter: {value}. Must be in [0, 1)")]
    InvalidJitter { section: &'static str, value: f64 },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Built-in defaults
    /// 2. `.foilopt/config.yaml` (written by `foilopt init`)
    /// 3. `.foilopt/local.yaml` (uncommitted overrides)
    /// 4. `FOILOPT_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same layering, rooted at `project_dir`.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Config> {
        let dir = project_dir.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("FOILOPT_").split("__"))
            .extract()
            .context("Failed to extract configuration")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Defaults overlaid with a single YAML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        config
            .search
            .validate()
            .map_err(|e| ConfigError::InvalidSearch(e.to_string()))?;

        let evaluator = &config.evaluator;
        if evaluator.backend == SolverBackend::Http
            && evaluator.endpoint.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::MissingEndpoint);
        }
        if !(0.0..=0.5).contains(&evaluator.surrogate_noise) {
            return Err(ConfigError::InvalidNoise(evaluator.surrogate_noise));
        }
        validate_retry("evaluator.retry", &evaluator.retry)?;

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }
        validate_retry("database.append_retry", &config.database.append_retry)?;

        let logging = &config.logging;
        if !["trace", "debug", "info", "warn", "error"].contains(&logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(logging.level.clone()));
        }
        if !["json", "pretty"].contains(&logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(logging.format.clone()));
        }
        if !["daily", "hourly", "never"].contains(&logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(logging.rotation.clone()));
        }

        Ok(())
    }
}

fn validate_retry(section: &'static str, retry: &RetryConfig) -> Result<(), ConfigError> {
    if retry.initial_backoff_ms > retry.max_backoff_ms {
        return Err(ConfigError::InvalidBackoff {
            section,
            initial: retry.initial_backoff_ms,
            max: retry.max_backoff_ms,
        });
    }
    if !(0.0..1.0).contains(&retry.jitter) {
        return Err(ConfigError::InvalidJitter {
            section,
            value: retry.jitter,
        });
    }
    Ok(())
}
