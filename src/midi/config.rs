//! Output configuration loaded from ~/.modal/config.yaml.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::BackendError;
use crate::event::DEFAULT_DIVISION;

/// Default channel volume written at the start of every track.
pub const DEFAULT_VOLUME: u8 = 80;
/// Default NoteOn/NoteOff velocity.
pub const DEFAULT_VELOCITY: u8 = 64;

/// Settings for the MIDI backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Ticks per quarter note.
    pub division: u16,
    /// Channel volume forced at the start of each track (0-127).
    pub volume: u8,
    /// Velocity used for every note (0-127).
    pub velocity: u8,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            division: DEFAULT_DIVISION,
            volume: DEFAULT_VOLUME,
            velocity: DEFAULT_VELOCITY,
        }
    }
}

impl MidiConfig {
    /// The standard config path, `~/.modal/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        let home = dirs::home_dir()?;
        Some(home.join(".modal").join("config.yaml"))
    }

    /// Load config from the standard path.
    /// Returns None if the file doesn't exist or cannot be used.
    pub fn load() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return None;
        }
        match Self::from_path(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unusable config file");
                None
            }
        }
    }

    /// Load and validate config from an explicit path.
    pub fn from_path(path: &Path) -> Result<Self, BackendError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, BackendError> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| BackendError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BackendError> {
        if self.division == 0 || self.division >= 0x8000 {
            return Err(BackendError::InvalidConfig(format!(
                "division {} must be within 1..=32767 ticks per quarter note",
                self.division
            )));
        }
        if self.volume > 127 {
            return Err(BackendError::InvalidConfig(format!(
                "volume {} must be within 0..=127",
                self.volume
            )));
        }
        if self.velocity > 127 {
            return Err(BackendError::InvalidConfig(format!(
                "velocity {} must be within 0..=127",
                self.velocity
            )));
        }
        Ok(())
    }
}
