//! TOML serialization for `Config`

use super::Config;
use std::path::Path;

/// Quote a value as a TOML basic string
fn toml_string(s: &str) -> String {
    toml::Value::String(s.to_string()).to_string()
}

fn toml_path(path: &Path) -> String {
    toml_string(&path.to_string_lossy())
}

impl Config {
    /// Serialize config to TOML string (single source of truth for format)
    pub fn to_toml(&self) -> String {
        format!(
            r#"# defectdesk configuration

# Base URL of the defect-tracker API
# Env: DEFECTDESK_API_BASE_URL
api_base_url = {api_base_url}

# Where signed-in sessions are kept (one subdirectory per API origin)
# Env: DEFECTDESK_STORAGE_DIR
storage_dir = {storage_dir}

# Language of fallback error messages: en, ru
# Env: DEFECTDESK_LOCALE
locale = "{locale}"

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = {log_level}
# JSON file logging in addition to stderr
file_enabled = {log_file_enabled}
file_dir = {log_file_dir}
file_rotation = "{log_file_rotation}"  # hourly, daily, never
file_prefix = {log_file_prefix}
"#,
            api_base_url = toml_string(&self.api_base_url),
            storage_dir = toml_path(&self.storage_dir),
            locale = self.locale.as_str(),
            log_level = toml_string(&self.logging.level),
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = toml_path(&self.logging.file_dir),
            log_file_rotation = self.logging.file_rotation.as_str(),
            log_file_prefix = toml_string(&self.logging.file_prefix),
        )
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<(), std::io::Error> {
        let Some(path) = Self::config_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config path",
            ));
        };
        self.save_to(&path)
    }

    pub(crate) fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml())
    }
}
