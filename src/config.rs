//! Configuration file handling.
//!
//! This module provides loading and saving of threatscan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/threatscan/config.toml`
//! - macOS: `~/Library/Application Support/threatscan/config.toml`
//! - Windows: `%APPDATA%\threatscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! threats_dir = "/opt/threat-definitions"
//! check_global_cache = false
//! default_format = "table"
//! command_timeout_secs = 5
//! log_level = "warn"
//!
//! [ignore]
//! threats = ["legacy-*"]
//! packages = ["@internal/*"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pattern::matches_any;
use crate::platform;

/// Name of the threat definition directory looked up next to the working
/// directory and in the config directory.
pub const THREATS_DIR_NAME: &str = "threats";

/// Application configuration.
///
/// # Example
///
/// ```no_run
/// use threatscan::Config;
///
/// let config = Config::load().unwrap();
/// println!("Timeout: {}s", config.command_timeout_secs);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory (or single file) of threat definitions.
    ///
    /// Default: unset, see [`Config::threats_path`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threats_dir: Option<PathBuf>,

    /// Consult global package caches for every threat.
    ///
    /// Default: false
    pub check_global_cache: bool,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json"
    /// Default: "table"
    pub default_format: String,

    /// Timeout for each package manager or tool query, in seconds.
    ///
    /// Default: 5
    pub command_timeout_secs: u64,

    /// Log filter used when neither `RUST_LOG` nor `--verbose` is given.
    ///
    /// Default: "warn"
    pub log_level: String,

    /// Ignore lists for suppressing threats or packages.
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Threats and packages to leave out of scans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Threat ids to skip. Supports `*` globs.
    pub threats: Vec<String>,

    /// Package names never resolved. Supports `*` globs (e.g. "@types/*").
    pub packages: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_threat(&self, threat_id: &str) -> bool {
        matches_any(&self.threats, threat_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threats_dir: None,
            check_global_cache: false,
            default_format: "table".to_string(),
            command_timeout_secs: 5,
            log_level: "warn".to_string(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from an explicit path, defaulting when absent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// ```
    /// use threatscan::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Picks the threat definitions location.
    ///
    /// Order: the explicit `flag`, `threats_dir`, `./threats` when it exists,
    /// then `threats` inside the config directory.
    pub fn threats_path(&self, flag: Option<&Path>) -> PathBuf {
        if let Some(path) = flag {
            return path.to_path_buf();
        }
        if let Some(path) = &self.threats_dir {
            return path.clone();
        }
        let local = PathBuf::from(THREATS_DIR_NAME);
        if local.is_dir() {
            return local;
        }
        platform::config_dir().join(THREATS_DIR_NAME)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
