//! Configuration file handling.
//!
//! This module handles loading, merging and resetting configuration from
//! `.ovoledger.toml` files. A loaded [`Config`] is passed explicitly to
//! the store and report layers; nothing reads configuration globally.

use crate::cli::{Args, OutputFormat};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".ovoledger.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Dashboard aggregation and formatting settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Report output settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Owner whose records are read and written.
    #[serde(default = "default_owner")]
    pub owner: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
        }
    }
}

fn default_owner() -> String {
    "default".to_string()
}

/// Storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Records kept in memory for the lifetime of the process
    Memory,
    /// One JSON file per owner under the data directory (default)
    #[default]
    Json,
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which backend to use.
    #[serde(default)]
    pub backend: Backend,

    /// Directory for the JSON backend.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".ovoledger")
}

/// Number formatting locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    /// `1,234.56`
    #[serde(rename = "en-US")]
    EnUs,
    /// `1.234,56`
    #[default]
    #[serde(rename = "pt-BR")]
    PtBr,
}

impl Locale {
    pub fn thousands_separator(&self) -> char {
        match self {
            Locale::EnUs => ',',
            Locale::PtBr => '.',
        }
    }

    pub fn decimal_separator(&self) -> char {
        match self {
            Locale::EnUs => '.',
            Locale::PtBr => ',',
        }
    }
}

/// Dashboard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Number of most recent days shown in the trend.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// Locale used for currency, counts and percentages.
    #[serde(default)]
    pub locale: Locale,

    /// Currency symbol placed before amounts.
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            trend_window: default_trend_window(),
            locale: Locale::default(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

fn default_trend_window() -> usize {
    crate::analysis::DEFAULT_TREND_WINDOW
}

fn default_currency_symbol() -> String {
    "R$".to_string()
}

/// Report output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Default output file path (`-` for stdout).
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "ovoledger_dashboard.md".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_if_exists(Path::new(CONFIG_FILE_NAME))
    }

    /// Load `path` if it exists.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Write a default configuration file. Fails if `path` already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!(
                "{} already exists. Remove it first or edit it manually.",
                path.display()
            );
        }

        std::fs::write(path, Self::default_toml())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Remove a configuration file so defaults apply again.
    ///
    /// Returns `false` if there was nothing to remove.
    pub fn reset(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(true)
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref owner) = args.owner {
            self.general.owner = owner.clone();
        }

        if let Some(backend) = args.backend {
            self.store.backend = backend;
        }
        if let Some(ref data_dir) = args.data_dir {
            self.store.data_dir = data_dir.clone();
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
