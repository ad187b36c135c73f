//! opsrun Configuration Module
//!
//! Config is stored in `~/.config/opsrun/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Command line (`--tasks`)
//! 2. Environment variables (`OPSRUN_TASKS`, `OPSRUN_TIMEOUT_SECS`)
//! 3. Config file
//! 4. Defaults (built-in task file, no timeout)

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ast::Tool;
use crate::error::{OpsError, Result};

pub const ENV_TASKS: &str = "OPSRUN_TASKS";
pub const ENV_TIMEOUT_SECS: &str = "OPSRUN_TIMEOUT_SECS";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OpsConfig {
    /// Task file to load instead of the built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks_file: Option<PathBuf>,

    /// Timeout for steps that do not declare their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_secs: Option<u64>,

    /// Tool aliases overriding the task file's `tools:`. A value is an
    /// executable path or a list such as `["cargo", "run", "--quiet", "--"]`.
    #[serde(default)]
    pub tools: BTreeMap<String, Tool>,
}

impl OpsConfig {
    /// Returns `~/.config/opsrun/` on Unix, `%APPDATA%/opsrun/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("opsrun")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load the default config file
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Load an explicit config file (must exist)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| OpsError::ConfigError {
            reason: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| OpsError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })?;
        for (alias, tool) in &config.tools {
            tool.validate(alias).map_err(|e| OpsError::ConfigError {
                reason: format!("Invalid [tools] entry: {}", e),
            })?;
        }
        Ok(config)
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Result<Self> {
        if let Ok(path) = std::env::var(ENV_TASKS) {
            if !path.is_empty() {
                self.tasks_file = Some(PathBuf::from(path));
            }
        }

        if let Ok(secs) = std::env::var(ENV_TIMEOUT_SECS) {
            if !secs.is_empty() {
                let secs = secs.parse::<u64>().map_err(|_| OpsError::ConfigError {
                    reason: format!("{} must be a whole number of seconds, got '{}'", ENV_TIMEOUT_SECS, secs),
                })?;
                self.default_timeout_secs = Some(secs);
            }
        }

        Ok(self)
    }

    /// Effective step timeout; zero means none
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}
