//! `[logging]` section: level, JSON file output, rotation
//!
//! Unknown rotation names are rejected while the file is parsed, so a typo
//! surfaces as a config error instead of quietly becoming daily rotation.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use super::default_data_dir;

/// How often the JSON log file is rolled over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    /// One file, never rolled
    Never,
}

impl LogRotation {
    pub const NAMES: [&'static str; 3] = ["hourly", "daily", "never"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Never => "never",
        }
    }
}

/// Rotation name that is not one of `LogRotation::NAMES`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRotation(pub String);

impl fmt::Display for UnknownRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown log rotation {:?} (expected one of: {})",
            self.0,
            LogRotation::NAMES.join(", ")
        )
    }
}

impl std::error::Error for UnknownRotation {}

impl FromStr for LogRotation {
    type Err = UnknownRotation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            _ => Err(UnknownRotation(s.to_string())),
        }
    }
}

impl TryFrom<String> for LogRotation {
    type Error = UnknownRotation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for LogRotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level for this crate's events; `RUST_LOG` overrides it
    pub level: String,
    pub file_enabled: bool,
    pub file_dir: PathBuf,
    pub file_rotation: LogRotation,
    /// File name prefix, e.g. `defectdesk` -> `defectdesk.2026-10-18`
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            file_dir: default_data_dir().join("logs"),
            file_rotation: LogRotation::Daily,
            file_prefix: "defectdesk".to_string(),
        }
    }
}

/// `[logging]` as written in the config file
#[derive(Debug, Deserialize, Default)]
pub struct FileLogging {
    pub level: Option<String>,
    pub file_enabled: Option<bool>,
    pub file_dir: Option<PathBuf>,
    pub file_rotation: Option<LogRotation>,
    pub file_prefix: Option<String>,
}

impl LoggingConfig {
    /// Fill the gaps in the file section with defaults
    pub fn from_file(file: Option<FileLogging>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            level: file
                .level
                .filter(|l| !l.trim().is_empty())
                .unwrap_or(defaults.level),
            file_enabled: file.file_enabled.unwrap_or(defaults.file_enabled),
            file_dir: file.file_dir.unwrap_or(defaults.file_dir),
            file_rotation: file.file_rotation.unwrap_or(defaults.file_rotation),
            file_prefix: file
                .file_prefix
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.file_prefix),
        }
    }
}
