//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/pocket/config.toml)
//! 3. Environment variables (POCKET_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "POCKET";

/// Default database file stem for the content cache
const DEFAULT_DATABASE_NAME: &str = "editorDB";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (content database, preference stores)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File stem of the content database inside `data_dir`
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// Upper bound for a single store operation, in milliseconds
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_name: default_database_name(),
            operation_timeout_ms: None,
        }
    }
}

impl Config {
    /// Configuration rooted at a specific data directory, ignoring files and env
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (POCKET_DATA_DIR, POCKET_DATABASE_NAME,
    ///    POCKET_OPERATION_TIMEOUT_MS)
    /// 2. Config file (~/.config/pocket/config.toml or POCKET_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_DATABASE_NAME", ENV_PREFIX)) {
            if !val.is_empty() {
                self.database_name = val;
            }
        }

        // Empty string clears the timeout
        if let Ok(val) = std::env::var(format!("{}_OPERATION_TIMEOUT_MS", ENV_PREFIX)) {
            self.operation_timeout_ms = if val.is_empty() {
                None
            } else {
                Some(val.parse().with_context(|| {
                    format!("Invalid {}_OPERATION_TIMEOUT_MS: '{}'", ENV_PREFIX, val)
                })?)
            };
        }

        Ok(())
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with POCKET_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pocket")
            .join("config.toml")
    }

    /// Get the path to the content database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.sqlite", self.database_name))
    }

    /// Get the path to the change-tracking metadata file
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("metadata.json")
    }

    /// Per-operation timeout, if one is configured
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pocket")
}

fn default_database_name() -> String {
    DEFAULT_DATABASE_NAME.to_string()
}
