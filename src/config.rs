//! Engine configuration.
//!
//! [`EngineConfig`] collects everything the snapshot and version managers
//! need to be constructed: where durable state lives, retention limits, the
//! executor timeout and retry policy, and the device command dialect.
//!
//! There is no ambient global configuration — the composition root builds an
//! `EngineConfig` (from defaults, a TOML file, or the builder) and hands it
//! to the managers it constructs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::executor::{CommandSet, RetryPolicy};

/// Configuration for the snapshot/version engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory for durable snapshot/version storage.
    pub storage_dir: PathBuf,

    /// Maximum number of snapshots to retain; older ones are pruned.
    pub max_snapshots: usize,

    /// Maximum number of versions to retain; older ones are pruned.
    pub max_versions: usize,

    /// Timeout for a single executor call.
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Retry policy applied to executor calls.
    pub retry: RetryPolicy,

    /// Device command dialect.
    pub commands: CommandSet,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(".configd"),
            max_snapshots: 10,
            max_versions: 50,
            command_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            commands: CommandSet::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// A small configuration for tests: short timeout, no retries.
    pub fn minimal() -> Self {
        Self {
            command_timeout: Duration::from_secs(5),
            retry: RetryPolicy::no_retry(),
            ..Self::default()
        }
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_snapshots == 0 {
            return Err(Error::Config("max_snapshots must be at least 1".into()));
        }
        if self.max_versions == 0 {
            return Err(Error::Config("max_versions must be at least 1".into()));
        }
        if self.command_timeout.is_zero() {
            return Err(Error::Config("command_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Sets the storage directory.
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    /// Sets the snapshot retention limit.
    pub fn max_snapshots(mut self, max: usize) -> Self {
        self.config.max_snapshots = max;
        self
    }

    /// Sets the version retention limit.
    pub fn max_versions(mut self, max: usize) -> Self {
        self.config.max_versions = max;
        self
    }

    /// Sets the executor call timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Sets the executor retry policy.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Sets the device command dialect.
    pub fn commands(mut self, commands: CommandSet) -> Self {
        self.config.commands = commands;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_snapshots, 10);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::builder()
            .storage_dir("/tmp/configd-test")
            .max_snapshots(5)
            .command_timeout(Duration::from_secs(10))
            .build();
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/configd-test"));
        assert_eq!(config.max_snapshots, 5);
    }

    #[test]
    fn test_zero_retention_is_rejected() {
        let config = EngineConfig::builder().max_snapshots(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
