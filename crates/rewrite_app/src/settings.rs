//! User settings persisted between runs as RON.
use std::fs;
use std::path::{Path, PathBuf};

use rewrite_core::DEFAULT_MODEL;
use rewrite_engine::{write_atomically, Endpoint, ModelError, PersistError};
use rewrite_logging::{rewrite_info, rewrite_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SETTINGS_FILENAME: &str = "settings.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// As entered; validated by [`Settings::endpoint`].
    pub host: String,
    pub port: String,
    pub model: String,
    /// Host names or URL prefixes where the rewrite action is disabled.
    pub blacklist: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: Endpoint::DEFAULT_HOST.to_string(),
            port: Endpoint::DEFAULT_PORT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            blacklist: Vec::new(),
        }
    }
}

impl Settings {
    pub fn endpoint(&self) -> Result<Endpoint, ModelError> {
        Endpoint::parse(&self.host, &self.port)
    }

    /// Adds a blacklist entry. Returns false for blanks and duplicates.
    pub fn block(&mut self, entry: &str) -> bool {
        let entry = entry.trim();
        if entry.is_empty() || self.blacklist.iter().any(|e| e.eq_ignore_ascii_case(entry)) {
            return false;
        }
        self.blacklist.push(entry.to_string());
        true
    }

    pub fn unblock(&mut self, entry: &str) -> bool {
        let before = self.blacklist.len();
        self.blacklist
            .retain(|e| !e.eq_ignore_ascii_case(entry.trim()));
        self.blacklist.len() != before
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not serialize settings: {0}")]
    Serialize(#[from] ron::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// `<config dir>/rewrite/settings.ron`, or the working directory when the
/// platform has no config dir.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("rewrite").join(SETTINGS_FILENAME))
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILENAME))
}

/// Loads settings, falling back to defaults when the file is missing or
/// unusable.
pub fn load(path: &Path) -> Settings {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Settings::default();
        }
        Err(err) => {
            rewrite_warn!("Failed to read settings from {:?}: {}", path, err);
            return Settings::default();
        }
    };

    match ron::from_str(&content) {
        Ok(settings) => {
            rewrite_info!("Loaded settings from {:?}", path);
            settings
        }
        Err(err) => {
            rewrite_warn!("Failed to parse settings from {:?}: {}", path, err);
            Settings::default()
        }
    }
}

pub fn save(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(settings, pretty)?;
    write_atomically(path, &content)?;
    rewrite_info!("Saved settings to {:?}", path);
    Ok(())
}
