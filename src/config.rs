//! Recorder configuration.
//!
//! All knobs the core needs are gathered into [`RecorderConfig`], an explicit
//! value object handed to the session manager at construction. Nothing reads
//! presentation state at call time.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Container/codec preference order. Broad compatibility first.
pub const DEFAULT_FORMAT_PREFERENCES: &[&str] = &[
    "video/mp4;codecs=avc1,mp4a.40.2",
    "video/mp4",
    "video/webm;codecs=h264",
    "video/webm;codecs=vp9,opus",
    "video/webm",
];

/// Target video bitrate handed to the encoder (8 Mbps)
pub const DEFAULT_VIDEO_BITS_PER_SECOND: u32 = 8_000_000;

/// Interval at which the encoder delivers segments
pub const DEFAULT_TIMESLICE_MS: u64 = 100;

/// Maximum number of recordings kept in history
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Prefix for derived artifact file names
pub const DEFAULT_FILE_NAME_PREFIX: &str = "REC_SR1";

/// Directory name used under the platform data dir for the history database
pub const HISTORY_DIR_NAME: &str = "sr1";

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid JSON for [`RecorderConfig`]
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Ideal screen capture constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Default for DisplayConstraints {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 60,
        }
    }
}

/// Microphone capture constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MicrophoneConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
}

impl Default for MicrophoneConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 44_100,
        }
    }
}

/// History store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryConfig {
    /// Maximum number of entries retained (never below 1)
    pub capacity: usize,
    /// Directory holding the history database; platform data dir when unset
    pub database_dir: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_HISTORY_CAPACITY,
            database_dir: None,
        }
    }
}

impl HistoryConfig {
    /// Capacity clamped to at least one entry
    pub fn effective_capacity(&self) -> usize {
        self.capacity.max(1)
    }

    /// Resolve the database directory, falling back to `<data_dir>/sr1`
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        self.database_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join(HISTORY_DIR_NAME)))
    }
}

/// Complete recorder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    pub format_preferences: Vec<String>,
    pub video_bits_per_second: u32,
    pub timeslice_ms: u64,
    pub display: DisplayConstraints,
    pub microphone: MicrophoneConstraints,
    pub history: HistoryConfig,
    pub file_name_prefix: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            format_preferences: DEFAULT_FORMAT_PREFERENCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            video_bits_per_second: DEFAULT_VIDEO_BITS_PER_SECOND,
            timeslice_ms: DEFAULT_TIMESLICE_MS,
            display: DisplayConstraints::default(),
            microphone: MicrophoneConstraints::default(),
            history: HistoryConfig::default(),
            file_name_prefix: DEFAULT_FILE_NAME_PREFIX.to_string(),
        }
    }
}

impl RecorderConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. Fields absent from the file keep
    /// their default values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            crate::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: RecorderConfig = serde_json::from_str(&content)?;
        config.history.capacity = config.history.effective_capacity();
        if config.timeslice_ms == 0 {
            crate::warn!("timesliceMs of 0 is not allowed, using {}", DEFAULT_TIMESLICE_MS);
            config.timeslice_ms = DEFAULT_TIMESLICE_MS;
        }

        crate::info!("Loaded recorder config from {:?}", path);
        Ok(config)
    }

    /// Encoder chunking interval
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
