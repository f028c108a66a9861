use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::domain::capture_constraints::{CaptureConstraints, FacingMode};
use crate::shared::constants::{
    DEFAULT_DETECTION_INTERVAL_MS, DEFAULT_DETECTOR_INPUT_SIZE, DEFAULT_MAX_START_RETRIES,
    DEFAULT_MODEL_BASE, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_SCORE_THRESHOLD,
    DEFAULT_START_TIMEOUT_MS, IDEAL_CAPTURE_HEIGHT, IDEAL_CAPTURE_WIDTH,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunables shared by every front end.
///
/// Missing fields fall back to their defaults, so a settings file only needs
/// to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Local directory or `http(s)://` base URL holding the model manifest.
    pub model_base: String,
    /// Capture device name; `None` picks the platform default camera.
    pub camera_device: Option<String>,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: FacingMode,
    pub start_timeout_ms: u64,
    pub max_start_retries: u32,
    pub retry_backoff_ms: u64,
    pub detection_interval_ms: u64,
    pub detector_input_size: u32,
    pub score_threshold: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model_base: DEFAULT_MODEL_BASE.to_string(),
            camera_device: None,
            ideal_width: IDEAL_CAPTURE_WIDTH,
            ideal_height: IDEAL_CAPTURE_HEIGHT,
            facing_mode: FacingMode::User,
            start_timeout_ms: DEFAULT_START_TIMEOUT_MS,
            max_start_retries: DEFAULT_MAX_START_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            detection_interval_ms: DEFAULT_DETECTION_INTERVAL_MS,
            detector_input_size: DEFAULT_DETECTOR_INPUT_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

impl AnalysisSettings {
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn capture_constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
            facing_mode: self.facing_mode,
            device: self.camera_device.clone(),
        }
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }
}
