//! Configuration module for preproc-test
//!
//! The engine consumes a single timeout bounding the whole test run plus the
//! sandbox limits for script steps. Both live in [`EngineConfig`], stored as
//! TOML.
//!
//! # Config Location
//!
//! When no explicit path is given the configuration is read from the
//! platform-appropriate config directory:
//! - **Linux**: `~/.config/preproc-test/config.toml`
//! - **macOS**: `~/Library/Application Support/preproc-test/config.toml`
//! - **Windows**: `%APPDATA%\preproc-test\config.toml`
//!
//! # Example
//!
//! ```toml
//! timeout_ms = 3000
//!
//! [script]
//! max_operations = 500000
//! cache_capacity = 16
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{PreprocError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "preproc-test";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default overall timeout for a test run in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound on total execution time of one test run
    pub timeout_ms: u64,

    /// Script sandbox limits
    pub script: ScriptLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            script: ScriptLimits::default(),
        }
    }
}

impl EngineConfig {
    /// Overall timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the overall timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PreprocError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(PreprocError::from)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Load from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)
                    .map_err(PreprocError::from)
                    .context("Failed to create config directory")?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PreprocError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(PreprocError::from)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(PreprocError::Config(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
