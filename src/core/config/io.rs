use crate::core::config::data::{path_display, Settings};
use crate::core::constants::SETTINGS_FILE_NAME;
use crate::utils::fs::write_atomic;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the settings file from disk.
    #[error("Failed to read settings at {}: {source}", path_display(.path))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`Settings`].
    #[error("Failed to parse settings at {}: {source}", path_display(.path))]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to write the settings file.
    #[error("Failed to write settings at {}: {source}", path_display(.path))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Could not determine a configuration directory for this platform")]
    NoConfigDir,
}

impl Settings {
    pub fn load_from_path(settings_path: &Path) -> Result<Settings, ConfigError> {
        if !settings_path.exists() {
            debug!(path = %settings_path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(settings_path).map_err(|source| ConfigError::Read {
            path: settings_path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: settings_path.to_path_buf(),
            source,
        })
    }

    /// Write atomically: serialize into a sibling temp file, then rename over the target.
    pub fn save_to_path(&self, settings_path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        write_atomic(settings_path, contents.as_bytes()).map_err(|source| ConfigError::Write {
            path: settings_path.to_path_buf(),
            source,
        })?;
        debug!(path = %settings_path.display(), "settings saved");
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs =
            ProjectDirs::from("org", "ai-writer", "ai-writer").ok_or(ConfigError::NoConfigDir)?;
        Ok(proj_dirs.config_dir().join(SETTINGS_FILE_NAME))
    }
}
