//! Configuration module for the teardown orchestrator
//!
//! Supports configuration via:
//! - YAML/TOML config files
//! - Environment variables (with TEARDOWN_ prefix)
//! - Command line flags (applied by the binary on top of the loaded config)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main teardown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeardownConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Container engine connection settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Network to remove when none is given on the command line
    #[serde(default = "default_network")]
    pub network: String,

    /// Stop grace period in seconds (engine default when unset)
    #[serde(default)]
    pub grace_period_seconds: Option<u64>,

    /// Abandon teardown after this many seconds
    #[serde(default)]
    pub deadline_seconds: Option<u64>,

    /// Tear containers down concurrently
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Maximum number of containers torn down at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// How the binary treats failures in the outcome
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Leave the network and containers alone while other workloads use the network
    #[serde(default)]
    pub guard_shared_network: bool,

    /// Metrics settings
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Container engine connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine address: unix socket path, `unix://`, `tcp://` or `http://` URL.
    /// Falls back to `DOCKER_HOST` and the default socket when unset.
    #[serde(default)]
    pub host: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_engine_timeout")]
    pub timeout_seconds: u64,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty on a terminal, JSON otherwise
    #[default]
    Auto,
    Pretty,
    Json,
}

/// Whether failures in the outcome fail the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Any failed resource fails the run
    #[default]
    Strict,
    /// Failures are reported and the run still succeeds
    BestEffort,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    /// Write Prometheus text exposition here after each run
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_network() -> String {
    "ecs-local-network".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    8
}

fn default_engine_timeout() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: None,
            timeout_seconds: default_engine_timeout(),
        }
    }
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            engine: EngineConfig::default(),
            network: default_network(),
            grace_period_seconds: None,
            deadline_seconds: None,
            parallel: true,
            max_concurrency: default_max_concurrency(),
            failure_policy: FailurePolicy::default(),
            guard_shared_network: false,
            metrics: MetricsConfig::default(),
        }
    }
}

impl TeardownConfig {
    /// Load configuration from the default files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Load configuration, adding an explicit config file on top of the defaults
    pub fn load_with(file: Option<&Path>) -> Result<Self> {
        // Try to load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&TeardownConfig::default())?)
            // Load from config file if present
            .add_source(config::File::with_name("config/teardown").required(false))
            .add_source(config::File::with_name("/etc/teardown/config").required(false));

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            // Override with environment variables (TEARDOWN_ prefix)
            .add_source(
                config::Environment::with_prefix("TEARDOWN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let teardown_config: TeardownConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        teardown_config.validate()?;

        Ok(teardown_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.network.trim().is_empty() {
            anyhow::bail!("Network cannot be empty");
        }

        if self.max_concurrency == 0 {
            anyhow::bail!("max_concurrency must be at least 1");
        }

        if self.engine.timeout_seconds == 0 {
            anyhow::bail!("Engine timeout cannot be 0");
        }

        // Stop calls block for up to the grace period
        if let Some(grace) = self.grace_period_seconds {
            if grace >= self.engine.timeout_seconds {
                anyhow::bail!(
                    "Engine timeout ({}s) must exceed the stop grace period ({}s)",
                    self.engine.timeout_seconds,
                    grace
                );
            }
        }

        if self.deadline_seconds == Some(0) {
            anyhow::bail!("Deadline cannot be 0");
        }

        Ok(())
    }

    pub fn grace_period(&self) -> Option<Duration> {
        self.grace_period_seconds.map(Duration::from_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_seconds.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TeardownConfig::default();
        assert_eq!(config.network, "ecs-local-network");
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.failure_policy, FailurePolicy::Strict);
        assert!(config.parallel);
        assert!(!config.guard_shared_network);
        assert!(config.grace_period().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = TeardownConfig {
            max_concurrency: 0,
            ..TeardownConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TeardownConfig {
            grace_period_seconds: Some(300),
            ..TeardownConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TeardownConfig {
            deadline_seconds: Some(0),
            ..TeardownConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TeardownConfig {
            network: String::new(),
            ..TeardownConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_names() {
        let policy: FailurePolicy = serde_json::from_str(r#""best-effort""#).unwrap();
        assert_eq!(policy, FailurePolicy::BestEffort);

        let format: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
