use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::PhysicalRect;
use crate::encoder::{
    EncoderSettings, DEFAULT_BITRATE, DEFAULT_CODEC, DEFAULT_FRAME_RATE, DEFAULT_GOP_SIZE,
    DEFAULT_MAX_B_FRAMES,
};
use crate::shared::paths::{ensure_dir, get_default_output_dir, get_settings_path};

pub const DEFAULT_HOTKEY: &str = "shift+super+KeyV";
pub const MIN_FRAME_RATE: u32 = 1;
pub const MAX_FRAME_RATE: u32 = 240;

/// Recorder settings, persisted as `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderSettings {
    /// Toggle hotkey, in `global-hotkey` syntax.
    pub hotkey: String,
    pub frame_rate: u32,
    /// Target bitrate in bits per second.
    pub bitrate: u64,
    pub gop_size: u32,
    pub max_b_frames: u32,
    pub codec: String,
    /// Overrides the default videos directory.
    pub output_dir: Option<PathBuf>,
    /// Physical rectangle confirmed by the preset selection UI.
    pub selection: Option<PhysicalRect>,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            hotkey: DEFAULT_HOTKEY.to_string(),
            frame_rate: DEFAULT_FRAME_RATE,
            bitrate: DEFAULT_BITRATE,
            gop_size: DEFAULT_GOP_SIZE,
            max_b_frames: DEFAULT_MAX_B_FRAMES,
            codec: DEFAULT_CODEC.to_string(),
            output_dir: None,
            selection: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Failed to parse hotkey: {0}")]
    HotkeyParseError(String),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

impl RecorderSettings {
    /// Clamps the frame rate into range and rejects values no encoder accepts.
    pub fn validate(mut self) -> Result<Self, SettingsError> {
        let clamped = self.frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
        if clamped != self.frame_rate {
            tracing::warn!(target: "system", "[SETTINGS] frameRate {} out of range, using {}", self.frame_rate, clamped);
            self.frame_rate = clamped;
        }
        if self.bitrate == 0 {
            return Err(SettingsError::Invalid("bitrate must be positive".to_string()));
        }
        if self.gop_size == 0 {
            return Err(SettingsError::Invalid("gopSize must be positive".to_string()));
        }
        if self.codec.trim().is_empty() {
            return Err(SettingsError::Invalid("codec must not be empty".to_string()));
        }
        Ok(self)
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            frame_rate: self.frame_rate,
            bitrate: self.bitrate,
            gop_size: self.gop_size,
            max_b_frames: self.max_b_frames,
            codec: self.codec.clone(),
        }
    }

    /// Where finished recordings go.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(get_default_output_dir)
    }
}

/// Load settings from disk, returning defaults if the file doesn't exist or is invalid.
pub fn load_settings() -> RecorderSettings {
    let path = get_settings_path();

    if !path.exists() {
        tracing::info!(target: "system", "[SETTINGS] Settings file not found, using defaults");
        return RecorderSettings::default();
    }

    match load_settings_from_file(&path) {
        Ok(settings) => {
            tracing::info!(target: "system", "[SETTINGS] Settings loaded from {:?}", path);
            settings
        }
        Err(e) => {
            tracing::warn!(target: "system", "[SETTINGS] Failed to load settings: {}, using defaults", e);
            RecorderSettings::default()
        }
    }
}

/// Load and validate settings from a specific path.
pub fn load_settings_from_file(path: &Path) -> Result<RecorderSettings, SettingsError> {
    let contents = std::fs::read_to_string(path)?;
    let settings: RecorderSettings = serde_json::from_str(&contents)?;
    settings.validate()
}

/// Save settings to the default location.
pub fn save_settings(settings: &RecorderSettings) -> Result<(), SettingsError> {
    save_settings_to_file(settings, &get_settings_path())
}

pub fn save_settings_to_file(settings: &RecorderSettings, path: &Path) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        ensure_dir(dir)?;
    }

    let contents = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, contents)?;

    tracing::info!(target: "system", "[SETTINGS] Settings saved to {:?}", path);
    Ok(())
}
