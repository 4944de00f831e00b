//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::experiment::ChaosExperimentType;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port: 0 is not a usable listen port")]
    InvalidPort,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid default experiment type: {0}")]
    InvalidExperiment(String),

    #[error("Invalid chaos duration: 0 seconds leaves nothing to observe")]
    InvalidDuration,

    #[error("Invalid poll config: pod_attempts must be at least 1")]
    InvalidPodAttempts,

    #[error("Invalid stuck threshold: {0}s. Must be positive")]
    InvalidStuckThreshold(u64),

    #[error("Target namespace cannot be empty")]
    EmptyNamespace,

    #[error("Operator manifest URL must be http(s): {0}")]
    InvalidManifestUrl(String),
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. havoc.yaml in the working directory
    /// 3. Environment variables (HAVOC_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("havoc.yaml"))
            .merge(Env::prefixed("HAVOC_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("HAVOC_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        if config.target_namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if ChaosExperimentType::from_str(&config.chaos.experiment).is_none() {
            return Err(ConfigError::InvalidExperiment(
                config.chaos.experiment.clone(),
            ));
        }

        if config.chaos.duration_secs == 0 {
            return Err(ConfigError::InvalidDuration);
        }

        if config.poll.pod_attempts == 0 {
            return Err(ConfigError::InvalidPodAttempts);
        }

        if config.recovery.stuck_threshold_secs == 0 {
            return Err(ConfigError::InvalidStuckThreshold(
                config.recovery.stuck_threshold_secs,
            ));
        }

        let url = &config.installer.operator_manifest_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidManifestUrl(url.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(ConfigLoader::validate(&config).is_ok());
        assert_eq!(config.port, 8080);
        assert_eq!(config.chaos.experiment, "pod-delete");
    }

    #[test]
    fn test_rejects_zero_port() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPort)
        ));
    }

    #[test]
    fn test_rejects_unknown_experiment() {
        let mut config = Config::default();
        config.chaos.experiment = "cpu-hog".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidExperiment(_))
        ));
    }

    #[test]
    fn test_rejects_non_http_manifest_url() {
        let mut config = Config::default();
        config.installer.operator_manifest_url = "ftp://nope".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidManifestUrl(_))
        ));
    }

    #[test]
    fn test_rejects_zero_stuck_threshold() {
        let mut config = Config::default();
        config.recovery.stuck_threshold_secs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidStuckThreshold(0))
        ));
    }
}
