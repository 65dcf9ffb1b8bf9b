//! User configuration.
//!
//! Settings live in one JSON file under the platform config directory;
//! every field has a usable default so a missing file is not an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RecapError;

const APP_DIR: &str = "git-recap";

/// Persisted user settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Remote whose tracking refs define sync points.
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Provider family used for summarization ("openai" or "anthropic").
    #[serde(default = "default_primary_provider")]
    pub primary_provider: String,
    /// Model override for the primary provider.
    #[serde(default)]
    pub primary_model: Option<String>,
    /// Optional secondary provider family used for context-length
    /// fallback.
    #[serde(default)]
    pub fallback_provider: Option<String>,
    /// Model override for the fallback provider.
    #[serde(default)]
    pub fallback_model: Option<String>,
    /// Override for the report directory.
    #[serde(default)]
    pub reports_dir: Option<PathBuf>,
    /// Override for the heuristics file.
    #[serde(default)]
    pub heuristics_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            primary_provider: default_primary_provider(),
            primary_model: None,
            fallback_provider: None,
            fallback_model: None,
            reports_dir: None,
            heuristics_path: None,
        }
    }
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_primary_provider() -> String {
    "openai".to_string()
}

impl Settings {
    /// Directory reports are written to, defaulting under the platform
    /// data directory.
    pub fn reports_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.reports_dir {
            return Ok(dir.clone());
        }
        Ok(data_dir()?.join("reports"))
    }

    /// Path of the learned-heuristics file, defaulting under the
    /// platform data directory.
    pub fn heuristics_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.heuristics_path {
            return Ok(path.clone());
        }
        Ok(data_dir()?.join("heuristics.json"))
    }

    /// Path of the marker file that exists while an analysis run is in
    /// progress. Read-only commands check it to report active runs.
    pub fn session_marker_path(&self) -> Result<PathBuf> {
        Ok(data_dir()?.join("analysis-in-progress"))
    }
}

fn data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .ok_or_else(|| {
            RecapError::Configuration("Could not determine the platform data directory".to_string())
                .into()
        })
}

/// Loads and saves [`Settings`] at a fixed path.
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a manager over the default settings location.
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| {
            RecapError::Configuration(
                "Could not determine the platform config directory".to_string(),
            )
        })?;
        Ok(Self {
            path: dir.join(APP_DIR).join("settings.json"),
        })
    }

    /// Creates a manager over an explicit path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The settings file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads settings; a missing file yields the defaults, a malformed
    /// file is an error.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Malformed settings at {}", self.path.display()))
    }

    /// Writes settings as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(settings).context("Failed to encode settings")?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
