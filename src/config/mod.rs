//! Configuration for the defectdesk client
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/defectdesk/config.toml)
//! 3. Built-in defaults (lowest priority)
//!
//! The request timeout is fixed by the transport.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::messages::Locale;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod observability;
mod serialization;


pub use observability::{FileLogging, LogRotation, LoggingConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// API base URL used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";

pub const ENV_API_BASE_URL: &str = "DEFECTDESK_API_BASE_URL";
pub const ENV_STORAGE_DIR: &str = "DEFECTDESK_STORAGE_DIR";
pub const ENV_LOCALE: &str = "DEFECTDESK_LOCALE";

/// `<data dir>/defectdesk`, or `./.defectdesk` when the platform has no data dir
pub(crate) fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("defectdesk"))
        .unwrap_or_else(|| PathBuf::from(".defectdesk"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the defect-tracker API, e.g. `http://localhost:8080/api/v1`
    pub api_base_url: String,

    /// Root directory for persisted sessions (one subdirectory per API origin)
    pub storage_dir: PathBuf,

    /// Language of fallback error messages
    pub locale: Locale,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage_dir: default_data_dir().join("sessions"),
            locale: Locale::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub api_base_url: Option<String>,
    pub storage_dir: Option<String>,
    pub locale: Option<String>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/defectdesk/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("defectdesk").join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    /// Called during startup to help users discover configuration options
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // config is optional
            }
        }

        let _ = std::fs::write(&path, Self::default().to_toml());
    }

    /// Parse a config file; a missing file yields an empty `FileConfig`
    ///
    /// A file that exists but cannot be read or parsed is an error: a broken
    /// config should fail loudly instead of silently falling back to defaults.
    pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).with_context(|| {
                format!(
                    "failed to parse {} (delete it or run `defectdesk config --reset`)",
                    path.display()
                )
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }

    /// Load configuration: env vars -> file -> defaults
    pub fn from_env() -> Result<Self> {
        let file = match Self::config_path() {
            Some(path) => Self::load_file_config(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::resolve(file, |key| std::env::var(key).ok()))
    }

    /// Merge a parsed file with an environment lookup
    pub(crate) fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        // API base URL: env > file > default
        let api_base_url = env(ENV_API_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .or(file.api_base_url)
            .unwrap_or(defaults.api_base_url);

        // Storage dir: env > file > default
        let storage_dir = env(ENV_STORAGE_DIR)
            .filter(|v| !v.trim().is_empty())
            .or(file.storage_dir)
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);

        // Locale: env > file > default
        let locale = env(ENV_LOCALE)
            .or(file.locale)
            .map(|s| Locale::from_str(&s))
            .unwrap_or(defaults.locale);

        let logging = LoggingConfig::from_file(file.logging);

        Self {
            api_base_url,
            storage_dir,
            locale,
            logging,
        }
    }
}
