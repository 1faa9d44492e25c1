//! Marginalia configuration.
//!
//! Loaded from `~/.marginalia/config.toml`. Every field is optional; a
//! missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::source::SourceSettings;

/// Filter used when neither `MARGINALIA_LOG` nor `log-filter` is set.
pub const DEFAULT_LOG_FILTER: &str = "marginalia=info";

/// Marginalia configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Path of the `SQLite` store. Defaults to `~/.marginalia/marginalia.sqlite`.
    pub database: Option<PathBuf>,

    /// The default annotator when neither `--as` nor `MARGINALIA_USER` is set.
    pub user: Option<String>,

    /// Timeout for remote API datasources, in seconds.
    pub remote_timeout_secs: Option<u64>,

    /// `tracing` filter directives, e.g. `marginalia=debug`.
    pub log_filter: Option<String>,
}

impl Config {
    /// Load config from `~/.marginalia/config.toml`, or defaults when absent.
    pub fn load() -> Result<Self, String> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from `path`, or defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.marginalia/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".marginalia").join("config.toml"))
    }

    /// Settings handed to datasource instantiation.
    pub fn source_settings(&self) -> SourceSettings {
        let mut settings = SourceSettings::default();
        if let Some(secs) = self.remote_timeout_secs {
            settings.remote_timeout = Duration::from_secs(secs);
        }
        settings
    }

    /// The configured log filter, or [`DEFAULT_LOG_FILTER`].
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn missing_file_means_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.source_settings().remote_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_kebab_case_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "user = \"ann\"\nremote-timeout-secs = 3\nlog-filter = \"marginalia=debug\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.user.as_deref(), Some("ann"));
        assert_eq!(config.log_filter(), "marginalia=debug");
        assert_eq!(config.source_settings().remote_timeout, Duration::from_secs(3));
        assert_eq!(config.database, None);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "default-identity = \"ann\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.contains("invalid config"), "{err}");
    }
}
