//! Settings - persisted detection toggles
//!
//! Backs the diagnostic-mode switch and the per-channel enable flags. The
//! file is read fresh on every query, never cached across events, so a
//! toggle flipped in the host UI takes effect on the very next callback.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detect::DetectMode;
use crate::types::SourceKind;

fn default_true() -> bool {
    true
}

/// On-disk settings shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Diagnostic mode: classifier accepts every event (test tooling only)
    #[serde(default)]
    pub diagnostic_mode: bool,
    #[serde(default = "default_true")]
    pub screen_source_enabled: bool,
    #[serde(default = "default_true")]
    pub notification_source_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            diagnostic_mode: false,
            screen_source_enabled: true,
            notification_source_enabled: true,
        }
    }
}

impl Settings {
    pub fn detect_mode(&self) -> DetectMode {
        if self.diagnostic_mode {
            DetectMode::Permissive
        } else {
            DetectMode::Strict
        }
    }

    pub fn source_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::ScreenContent => self.screen_source_enabled,
            SourceKind::Notification => self.notification_source_enabled,
        }
    }
}

/// Reads settings from a YAML file, defaulting when the file is missing or
/// unparseable.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the current settings. Called once per event.
    pub fn load(&self) -> Settings {
        if !self.path.exists() {
            debug!(path = ?self.path, "no settings file, using defaults");
            return Settings::default();
        }

        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, path = ?self.path, "failed to parse settings, using defaults");
                    Settings::default()
                }
            },
            Err(e) => {
                warn!(error = %e, path = ?self.path, "failed to read settings, using defaults");
                Settings::default()
            }
        }
    }

    /// Persist settings (used by the host bridge when the user flips a
    /// toggle).
    pub fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(settings)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
