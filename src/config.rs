// SPDX-License-Identifier: GPL-3.0-only

//! User configuration handling
//!
//! Persisted as JSON under the user config directory. Every field has a
//! default so a missing or partial file never blocks startup.

use crate::constants::BitratePreset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Validate every GPU operation and surface failures as GraphicsError.
    ///
    /// Off by default for frame-rate; tests and debugging turn it on.
    pub strict_gpu_error_checking: bool,
    /// Watermark overlay repaint period in milliseconds
    pub overlay_refresh_ms: u64,
    /// Default recorded video width (portrait)
    pub record_width: u32,
    /// Default recorded video height (portrait)
    pub record_height: u32,
    /// Video encoder bitrate preset (Low, Medium, High)
    pub bitrate_preset: BitratePreset,
    /// Mirror camera preview horizontally (selfie mode)
    pub mirror_preview: bool,
    /// Last used camera device identifier (PipeWire target-object)
    pub last_camera_target: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_gpu_error_checking: false,
            overlay_refresh_ms: crate::constants::timing::OVERLAY_REFRESH.as_millis() as u64,
            record_width: crate::constants::recording::DEFAULT_WIDTH,
            record_height: crate::constants::recording::DEFAULT_HEIGHT,
            bitrate_preset: BitratePreset::default(),
            mirror_preview: false,
            last_camera_target: None,
        }
    }
}

impl Config {
    /// Path of the persisted configuration file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("watermark-camera").join("config.json"))
    }

    /// Load the configuration, falling back to defaults on any failure
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    debug!(path = ?path, "Loaded configuration");
                    config
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Malformed config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist the configuration
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::path() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, contents)
    }
}
