//! Configuration management for towersync
//!
//! This module handles loading and validating configuration from environment variables,
//! TOML files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::UploadTarget;
use crate::upload::config::MAX_BATCH_SIZE;
use crate::upload::{BeaconDbConfig, OpenCelliDConfig, TargetSettings, UploadConfig};
use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record store configuration
    pub storage: StorageConfig,

    /// Upload run configuration
    pub upload: UploadSection,

    /// OpenCelliD target configuration
    pub opencellid: OpenCelliDConfig,

    /// BeaconDB target configuration
    pub beacondb: BeaconDbConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/survey.db"),
        }
    }
}

/// Upload run and scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    /// Records per kind fetched in one batch step
    pub batch_size: usize,

    /// Timeout for a single target send in seconds
    pub send_timeout_secs: u64,

    /// Report `Retrying` instead of `Failed` when a target fails
    pub retry_enabled: bool,

    /// Pause between scheduled runs in seconds
    pub interval_secs: u64,

    /// Maximum consecutive retries before waiting for the next interval
    pub max_retries: u32,

    /// Base delay in milliseconds for retry backoff
    pub retry_base_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    pub retry_max_delay_ms: u64,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            batch_size: crate::upload::config::DEFAULT_BATCH_SIZE,
            send_timeout_secs: 60,
            retry_enabled: true,
            interval_secs: 3600,
            max_retries: 5,
            retry_base_delay_ms: 30_000,
            retry_max_delay_ms: 30 * 60 * 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn parse_var<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_flag(value: Option<String>) -> Option<bool> {
    value.map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// Every `TOWERSYNC_*` variable that is missing or unparsable keeps its default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("TOWERSYNC_DB_PATH") {
            config.storage.path = PathBuf::from(path);
        }

        let upload = &mut config.upload;
        if let Some(v) = parse_var(lookup("TOWERSYNC_BATCH_SIZE")) {
            upload.batch_size = v;
        }
        if let Some(v) = parse_var(lookup("TOWERSYNC_SEND_TIMEOUT")) {
            upload.send_timeout_secs = v;
        }
        if let Some(v) = parse_flag(lookup("TOWERSYNC_RETRY_ENABLED")) {
            upload.retry_enabled = v;
        }
        if let Some(v) = parse_var(lookup("TOWERSYNC_UPLOAD_INTERVAL")) {
            upload.interval_secs = v;
        }
        if let Some(v) = parse_var(lookup("TOWERSYNC_MAX_RETRIES")) {
            upload.max_retries = v;
        }

        let ocid = &mut config.opencellid;
        if let Some(v) = parse_flag(lookup("TOWERSYNC_OCID_ENABLED")) {
            ocid.enabled = v;
        }
        if let Some(v) = lookup("TOWERSYNC_OCID_ENDPOINT") {
            ocid.endpoint = v;
        }
        if let Some(v) = lookup("TOWERSYNC_OCID_API_KEY") {
            ocid.api_key = Some(v);
        }
        if let Some(v) = parse_flag(lookup("TOWERSYNC_OCID_ANONYMOUS")) {
            ocid.anonymous = v;
        }
        if let Some(v) = lookup("TOWERSYNC_OCID_ANONYMOUS_KEY") {
            ocid.anonymous_key = Some(v);
        }

        let beacondb = &mut config.beacondb;
        if let Some(v) = parse_flag(lookup("TOWERSYNC_BEACONDB_ENABLED")) {
            beacondb.enabled = v;
        }
        if let Some(v) = lookup("TOWERSYNC_BEACONDB_ENDPOINT") {
            beacondb.endpoint = v;
        }

        if let Some(v) = lookup("TOWERSYNC_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = lookup("TOWERSYNC_LOG_FORMAT") {
            config.logging.format = v;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.upload.batch_size == 0 {
            anyhow::bail!("batch_size must be greater than 0");
        }

        if self.upload.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!("batch_size must be at most {MAX_BATCH_SIZE}");
        }

        if self.upload.send_timeout_secs == 0 {
            anyhow::bail!("send_timeout_secs must be greater than 0");
        }

        if self.upload.interval_secs == 0 {
            anyhow::bail!("interval_secs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be \"text\" or \"json\"");
        }

        self.opencellid
            .validate()
            .context("Invalid [opencellid] section")?;
        self.beacondb.validate().context("Invalid [beacondb] section")?;

        Ok(())
    }

    /// Get the per-send timeout as Duration
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.upload.send_timeout_secs)
    }

    /// Get the scheduling interval as Duration
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.upload.interval_secs)
    }

    /// Run-level configuration for the upload coordinator
    pub fn upload_config(&self) -> UploadConfig {
        let targets = [
            (UploadTarget::OpenCelliD, self.opencellid.enabled),
            (UploadTarget::BeaconDb, self.beacondb.enabled),
        ]
        .into_iter()
        .map(|(target, enabled)| (target, TargetSettings { enabled }))
        .collect();

        UploadConfig {
            batch_size: self.upload.batch_size,
            send_timeout: self.send_timeout(),
            retry_enabled: self.upload.retry_enabled,
            targets,
        }
    }

    /// Backoff settings for retried runs
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_delays(
            self.upload.max_retries,
            self.upload.retry_base_delay_ms,
            self.upload.retry_max_delay_ms,
        )
    }
}
