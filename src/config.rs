//! Configuration management for zkwatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all process settings. It uses the `figment`
//! crate to load configuration from a `zkwatch.toml` file and merge it
//! with environment variables and command-line arguments.
//!
//! The watched paths live in a separate YAML document, mapping each path to
//! its [`WatchedPathConfig`]:
//!
//! ```yaml
//! /services/foo/min_1:
//!   children: 1
//!   cancel_timeout: 30
//!   alerter:
//!     email: you@home.com
//! ```

use crate::cli::Cli;
use crate::core::AlerterParams;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// YAML file listing the paths to watch.
    pub paths_file: Option<PathBuf>,
    /// Where this monitor cluster lives in the coordination service.
    pub registry: RegistryConfig,
    /// Configuration for the HTTP status endpoint.
    pub status: StatusConfig,
    /// Configuration for the email alerter.
    pub email: EmailConfig,
    /// Configuration for the Slack alerter.
    pub slack: SlackConfig,
}

/// Where this monitor cluster lives in the coordination service.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RegistryConfig {
    /// Prefix path shared by all zkwatch clusters.
    pub cluster_prefix: String,
    /// Unique cluster name (e.g. `prod-zookeeper-monitor`).
    pub cluster_name: String,
}

impl RegistryConfig {
    /// The cluster's workspace path, `{cluster_prefix}/{cluster_name}`.
    pub fn workspace(&self) -> String {
        format!(
            "{}/{}",
            self.cluster_prefix.trim_end_matches('/'),
            self.cluster_name
        )
    }
}

/// Configuration for the HTTP status endpoint.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StatusConfig {
    pub enabled: bool,
    /// The address the status server binds to.
    pub listen_address: String,
}

/// Configuration for the email alerter.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmailConfig {
    /// The sender address on outgoing alerts.
    pub from_address: String,
}

/// Configuration for the Slack alerter.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SlackConfig {
    /// Request timeout for webhook posts.
    pub timeout_seconds: u64,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are layered in order: built-in defaults, the TOML file given by
    /// `--config` (or `zkwatch.toml`), `ZKWATCH_` environment variables with
    /// `__` separating nested keys, then the command line.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from("zkwatch.toml"));
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // e.g. ZKWATCH_REGISTRY__CLUSTER_NAME=prod
            .merge(Env::prefixed("ZKWATCH_").split("__"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            paths_file: None,
            registry: RegistryConfig {
                cluster_prefix: "/zk_monitor".to_string(),
                cluster_name: "zkmonitor".to_string(),
            },
            status: StatusConfig {
                enabled: true,
                listen_address: "0.0.0.0:8080".to_string(),
            },
            email: EmailConfig {
                from_address: "zkwatch".to_string(),
            },
            slack: SlackConfig {
                timeout_seconds: 10,
            },
        }
    }
}

// =============================================================================
// Watched paths
// =============================================================================

/// Monitoring settings for one watched path.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WatchedPathConfig {
    /// Minimum number of children, checked by the compliance evaluator.
    #[serde(default)]
    pub children: Option<u32>,
    /// Seconds an alert-worthy state must persist before alerting. Absent,
    /// `null` or `0` fire immediately.
    #[serde(default)]
    pub cancel_timeout: Option<f64>,
    /// Backend name to the parameters handed to that backend.
    #[serde(default)]
    pub alerter: BTreeMap<String, AlerterParams>,
    /// Send one more round of alerts when the path returns to `OK` after
    /// having alerted.
    #[serde(default)]
    pub notify_recovery: bool,
}

impl WatchedPathConfig {
    /// The debounce window, or `None` when alerts fire immediately.
    pub fn cancel_timeout(&self) -> Option<Duration> {
        self.cancel_timeout
            .filter(|seconds| *seconds > 0.0)
            .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
    }

    /// Checks the settings that can't be enforced by deserialization alone.
    pub fn validate(&self, path: &str) -> Result<(), ConfigError> {
        if let Some(value) = self.cancel_timeout {
            // Rejects negative, NaN, infinite and out-of-range values alike.
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::InvalidCancelTimeout {
                    path: path.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// All watched paths, keyed by path.
pub type PathConfigs = BTreeMap<String, WatchedPathConfig>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read path list {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse path list: {0}")]
    Parse(String),

    #[error("watched path names must not be empty")]
    EmptyPath,

    #[error("invalid cancel_timeout {value} for {path}: expected a non-negative, representable number of seconds")]
    InvalidCancelTimeout { path: String, value: f64 },
}

/// Validates every entry of a path list.
pub fn validate_paths(paths: &PathConfigs) -> Result<(), ConfigError> {
    for (path, config) in paths {
        if path.trim().is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        config.validate(path)?;
    }
    Ok(())
}

/// Parses and validates a YAML path list.
///
/// A path listed with no settings (`/foo:`) is watched with the defaults.
pub fn parse_paths(content: &str) -> Result<PathConfigs, ConfigError> {
    if content.trim().is_empty() {
        return Ok(PathConfigs::new());
    }

    let raw: BTreeMap<String, Option<WatchedPathConfig>> =
        serde_yml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    let paths: PathConfigs = raw
        .into_iter()
        .map(|(path, config)| (path, config.unwrap_or_default()))
        .collect();

    validate_paths(&paths)?;
    Ok(paths)
}

/// Reads, parses and validates the YAML path list at `path`.
pub fn load_paths(path: &Path) -> Result<PathConfigs, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_paths(&content)
}
