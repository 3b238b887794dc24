//! Persistent application configuration
//!
//! Stores capture settings and reconstruction thresholds in a JSON file at
//! `<config_dir>/bcilog/config.json`.

use bcilog_core::{CaptureConfig, ReconstructParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Live capture settings
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Offline reconstruction thresholds
    #[serde(default)]
    pub reconstruct: ReconstructParams,
}

impl AppConfig {
    /// Config file path: `<config_dir>/bcilog/config.json`
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bcilog")
            .join("config.json")
    }

    /// Load config from the default path
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load from `explicit` if given, else from the default path
    ///
    /// Returns the config together with the path it belongs to, so a later
    /// `save` writes back to the same file.
    pub fn resolve(explicit: Option<PathBuf>) -> (Self, PathBuf) {
        match explicit {
            Some(path) => (Self::load_from(&path), path),
            None => (Self::load(), Self::path()),
        }
    }

    /// Load config from `path`, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }
}
