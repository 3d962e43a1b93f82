//! Run-level upload configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::models::UploadTarget;

/// Default number of records per kind fetched in one batch step
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Largest accepted batch size
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Default per-call timeout for a target send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-target switches for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Disabled targets are never contacted; their records count as delivered
    pub enabled: bool,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration handed to [`UploadCoordinator::run`](super::UploadCoordinator::run)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Records per kind fetched in one batch step
    pub batch_size: usize,

    /// Timeout applied to each individual target send
    #[serde(with = "duration_secs")]
    pub send_timeout: Duration,

    /// Whether an unsuccessful run ends in `Retrying` instead of `Failed`
    pub retry_enabled: bool,

    /// Settings keyed by target; missing targets use the defaults
    pub targets: BTreeMap<UploadTarget, TargetSettings>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            retry_enabled: true,
            targets: UploadTarget::ALL
                .iter()
                .map(|t| (*t, TargetSettings::default()))
                .collect(),
        }
    }
}

impl UploadConfig {
    /// Create a new config builder
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder::default()
    }

    /// Whether the target takes part in uploads
    pub fn is_enabled(&self, target: UploadTarget) -> bool {
        self.targets
            .get(&target)
            .map(|s| s.enabled)
            .unwrap_or_else(|| TargetSettings::default().enabled)
    }

    /// Targets that will actually be contacted
    pub fn enabled_targets(&self) -> Vec<UploadTarget> {
        UploadTarget::ALL
            .iter()
            .copied()
            .filter(|t| self.is_enabled(*t))
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be greater than 0"));
        }

        if self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::config(format!(
                "batch_size must be at most {MAX_BATCH_SIZE}"
            )));
        }

        if self.send_timeout.is_zero() {
            return Err(Error::config("send_timeout must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for UploadConfig
#[derive(Debug, Default)]
pub struct UploadConfigBuilder {
    batch_size: Option<usize>,
    send_timeout: Option<Duration>,
    retry_enabled: Option<bool>,
    targets: BTreeMap<UploadTarget, TargetSettings>,
}

impl UploadConfigBuilder {
    /// Set records per kind per batch step
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Set the per-send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Enable/disable the `Retrying` disposition
    pub fn retry_enabled(mut self, enable: bool) -> Self {
        self.retry_enabled = Some(enable);
        self
    }

    /// Enable/disable a single target
    pub fn target_enabled(mut self, target: UploadTarget, enabled: bool) -> Self {
        self.targets.insert(target, TargetSettings { enabled });
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<UploadConfig> {
        let default = UploadConfig::default();
        let mut targets = default.targets;
        targets.extend(self.targets);

        let config = UploadConfig {
            batch_size: self.batch_size.unwrap_or(default.batch_size),
            send_timeout: self.send_timeout.unwrap_or(default.send_timeout),
            retry_enabled: self.retry_enabled.unwrap_or(default.retry_enabled),
            targets,
        };

        config.validate()?;
        Ok(config)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
