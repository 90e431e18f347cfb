use super::types::*;
use crate::error_handling::types::ConfigError;
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://ovpn-monitor.sqlite3?mode=rwc";
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Application configuration loaded from a TOML file.
///
/// # Examples
///
/// ```toml
/// database_url = "sqlite:///var/lib/ovpn-monitor/monitor.sqlite3?mode=rwc"
/// interval_secs = 60
/// timeout_secs = 5
///
/// [hosts.office]
/// host = "10.0.0.1"
/// monitoring_port = 7505
/// ```
///
/// # Fields Overview
///
/// - `hosts`: host alias to management interface address, one pipeline per entry
/// - `interval_secs`: polling period, whole seconds
/// - `timeout_secs`: management read timeout, never larger than the interval
/// - `database_url`: SeaORM connection string for the telemetry database
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub hosts: BTreeMap<String, HostConfig>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_database_url")]
    pub database_url: String,
}

/// Values that may be supplied on the command line or through the
/// environment, taking precedence over the file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Polling interval in seconds
    ///
    /// # Command Line
    /// Use `--interval <SECONDS>` or the `INTERVAL` environment variable
    #[arg(long, env = "INTERVAL")]
    pub interval: Option<u64>,

    /// Management interface read timeout in seconds
    ///
    /// Capped to the polling interval.
    ///
    /// # Command Line
    /// Use `--timeout <SECONDS>` or the `TIMEOUT` environment variable
    #[arg(long, env = "TIMEOUT")]
    pub timeout: Option<u64>,

    /// Database connection string
    ///
    /// # Command Line
    /// Use `--database-url <URL>` or the `CONNECTION_STRING` environment variable
    #[arg(long, env = "CONNECTION_STRING")]
    pub database_url: Option<String>,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_database_url() -> String {
    String::from(DEFAULT_DATABASE_URL)
}

impl Config {
    /// Reads a configuration file without validating it.
    ///
    /// Command line and environment overrides may still fix the values, so
    /// validation happens in [`Config::apply_overrides`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        info!(
            "Loaded configuration for {} host(s) from {}",
            config.hosts.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parses and validates a configuration.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config = Self::parse(content)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(interval) = overrides.interval {
            self.interval_secs = interval;
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout_secs = timeout;
        }
        if let Some(ref url) = overrides.database_url {
            self.database_url = url.clone();
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hosts.is_empty() {
            return Err(ConfigError::HostsEmpty);
        }
        for (alias, target) in &self.hosts {
            if alias.is_empty() {
                return Err(ConfigError::BadHost(String::from("empty host alias")));
            }
            if target.host.trim().is_empty() {
                return Err(ConfigError::BadHost(format!("`{}` has an empty address", alias)));
            }
            if target.monitoring_port == 0 {
                return Err(ConfigError::BadHost(format!("`{}` has monitoring port 0", alias)));
            }
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::NotInRange(String::from(
                "interval_secs must be at least 1",
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::NotInRange(String::from(
                "timeout_secs must be at least 1",
            )));
        }
        if self.timeout_secs > self.interval_secs {
            warn!(
                "Timeout of {}s exceeds the {}s interval, capping it",
                self.timeout_secs, self.interval_secs
            );
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Read timeout actually used against the management interfaces.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.min(self.interval_secs))
    }

    /// Capacity of every bounded channel in the pipeline.
    pub fn channel_capacity(&self) -> usize {
        (self.hosts.len() * 2).max(2)
    }
}
