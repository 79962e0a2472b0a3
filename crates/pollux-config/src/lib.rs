//! Configuration management for Pollux
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (`POLLUX_*` prefix, `__` between nested keys)
//! 2. pollux.local.toml (gitignored, local overrides)
//! 3. pollux.toml (git-tracked, project config)
//! 4. ~/.config/pollux/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use pollux_types::ModelCheckingParams;
use serde::{Deserialize, Serialize};

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

/// Main Pollux configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolluxConfig {
    /// Statistical parameters for each verification run.
    pub checking: ModelCheckingParams,
    /// Distributed sampling coordinator settings.
    pub sampling: SamplingConfig,
}

/// Settings for the distributed sampling coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Address the coordinator listens on for workers.
    pub bind_address: String,
    /// Whether the coordinator also simulates paths itself.
    ///
    /// When false it still falls back to local simulation once no worker
    /// remains in the schedule.
    pub local_sampling: bool,
    /// A worker at the head of the schedule that stays silent this long is
    /// dropped.
    pub idle_timeout_ms: u64,
    /// Maximum number of connected workers.
    pub max_clients: usize,
    /// Initial capacity of per-connection buffers.
    pub read_buffer_size: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5545".to_string(),
            local_sampling: true,
            idle_timeout_ms: 30_000,
            max_clients: 64,
            read_buffer_size: 4096,
        }
    }
}

impl SamplingConfig {
    /// Parses [`Self::bind_address`].
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.bind_address.clone()))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.max_clients == 0 {
            return Err(ConfigError::ValidationError(
                "sampling.max_clients must be positive".to_string(),
            ));
        }
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "sampling.idle_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl PolluxConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Distributed configuration listening on `bind_address`.
    pub fn distributed(bind_address: impl Into<String>) -> Self {
        Self {
            sampling: SamplingConfig {
                bind_address: bind_address.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Renders the configuration as a `pollux.toml` document.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks every section for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.checking.validate()?;
        self.sampling.validate()
    }
}
