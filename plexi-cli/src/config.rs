//! REPL session state persisted between runs.

use std::path::{Path, PathBuf};

use anyhow::Result;
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};

use plexi_client::DEFAULT_MODEL;

/// Editing mode names accepted by `/mode`.
pub const MODE_VI: &str = "vi";
pub const MODE_EMACS: &str = "emacs";

/// Persisted REPL configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// Model the session starts on.
    pub active_model: String,
    /// Line-editing mode, `vi` or `emacs`.
    pub editing_mode: String,
    /// Whether queries get the coding-style preamble.
    pub query_code_style: bool,
    /// Directory `/save` writes transcripts into; home when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_area: Option<PathBuf>,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            active_model: DEFAULT_MODEL.to_string(),
            editing_mode: MODE_VI.to_string(),
            query_code_style: true,
            work_area: None,
        }
    }
}

impl ReplConfig {
    /// Platform config directory for plexi.
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "plexi").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Path of the persisted configuration file.
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Path of the line-editor history file.
    pub fn history_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("history"))
    }

    /// Load the configuration, writing the defaults on first run.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from a specific path; a missing file is created with defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            Ok(config)
        }
    }

    /// Persist to the user config path.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            self.save_to_path(&path)?;
        }
        Ok(())
    }

    /// Persist to a specific path, creating parent directories as needed.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Directory where `/save` writes prompt transcripts.
    pub fn work_area_path(&self) -> PathBuf {
        self.work_area.clone().unwrap_or_else(|| {
            UserDirs::new()
                .map(|dirs| dirs.home_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = ReplConfig::default();
        assert_eq!(config.active_model, DEFAULT_MODEL);
        assert_eq!(config.editing_mode, MODE_VI);
        assert!(config.query_code_style);
        assert!(config.work_area.is_none());
    }

    #[test]
    fn save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = ReplConfig {
            active_model: "llama-3.1-70b-instruct".to_string(),
            editing_mode: MODE_EMACS.to_string(),
            query_code_style: false,
            work_area: Some(PathBuf::from("/tmp/workarea")),
        };
        config.save_to_path(&path).unwrap();

        let loaded = ReplConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_missing_file_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = ReplConfig::load_from_path(&path).unwrap();
        assert_eq!(config, ReplConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "this is not valid toml {{{{").unwrap();

        assert!(ReplConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "editing_mode = \"emacs\"\n").unwrap();

        let config = ReplConfig::load_from_path(&path).unwrap();
        assert_eq!(config.editing_mode, MODE_EMACS);
        assert_eq!(config.active_model, DEFAULT_MODEL);
        assert!(config.query_code_style);
    }

    #[test]
    fn work_area_path_prefers_configured_directory() {
        let config = ReplConfig {
            work_area: Some(PathBuf::from("/tmp/workarea")),
            ..Default::default()
        };
        assert_eq!(config.work_area_path(), PathBuf::from("/tmp/workarea"));
    }

    #[test]
    fn work_area_path_defaults_to_home() {
        let config = ReplConfig::default();
        let path = config.work_area_path();
        assert!(!path.as_os_str().is_empty());
    }
}
