//! Service configuration.
//!
//! Read once at startup from `$XDG_CONFIG_HOME/CapyServices/config.json`.
//! A missing or malformed file yields the defaults.

use capy_icons::IconConfig;
use capy_resources::DEFAULT_RESERVED_PATHS;
use capy_search::DEFAULT_MIN_TERM_LENGTH;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Icon theme id or title; `CAPY_ICON_THEME` overrides it.
    pub icon_theme: Option<String>,
    /// Terms shorter than this only search the always-on domains.
    pub min_search_length: usize,
    /// Paths no producer may write to.
    pub reserved_paths: Vec<String>,
    /// Mirror UPower devices.
    pub power: bool,
    /// Scan installed applications.
    pub applications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            icon_theme: None,
            min_search_length: DEFAULT_MIN_TERM_LENGTH,
            reserved_paths: DEFAULT_RESERVED_PATHS.iter().map(|p| p.to_string()).collect(),
            power: true,
            applications: true,
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/nonexistent"))
            .join("CapyServices")
            .join("config.json")
    }

    /// Load from config file, or return default if not found
    pub fn load(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            info!("No config at {}, using defaults", path.display());
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn icon_config(&self) -> IconConfig {
        IconConfig::from_environment(self.icon_theme.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json"));
        assert_eq!(config, Config::default());
        assert_eq!(config.min_search_length, 3);
        assert!(config.reserved_paths.contains(&"/search".to_string()));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"icon_theme": "Papirus", "power": false}"#).unwrap();

        let config = Config::load(&path);
        assert_eq!(config.icon_theme.as_deref(), Some("Papirus"));
        assert!(!config.power);
        assert!(config.applications);
        assert_eq!(config.min_search_length, 3);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load(&path), Config::default());
    }
}
