use serde::{Deserialize, Serialize};

use crate::capture::domain::capture_error::CaptureErrorKind;
use crate::detection::domain::face_detection::FaceDetection;

/// Everything the front ends render, split into three independent slices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub webcam: WebcamState,
    pub models: ModelsState,
    pub detection: DetectionState,
}

/// Camera lifecycle. `is_active` and `is_loading` are never both true.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WebcamState {
    pub is_active: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub error_kind: Option<CaptureErrorKind>,
}

/// Model loading lifecycle. `is_loaded` never goes back to false.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsState {
    pub is_loaded: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionState {
    pub faces: Vec<FaceDetection>,
    pub is_processing: bool,
    pub error: Option<String>,
}

/// Coarse webcam phase, for views that switch on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebcamPhase {
    Idle,
    Loading,
    Active,
    Failed,
}

impl WebcamState {
    pub fn phase(&self) -> WebcamPhase {
        if self.is_active {
            WebcamPhase::Active
        } else if self.is_loading {
            WebcamPhase::Loading
        } else if self.error.is_some() {
            WebcamPhase::Failed
        } else {
            WebcamPhase::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let state = AppState::default();
        assert_eq!(state.webcam.phase(), WebcamPhase::Idle);
        assert!(!state.models.is_loaded);
        assert!(state.detection.faces.is_empty());
        assert!(!state.detection.is_processing);
    }

    #[test]
    fn test_phase_reports_failure() {
        let webcam = WebcamState {
            error: Some("denied".into()),
            error_kind: Some(CaptureErrorKind::PermissionDenied),
            ..WebcamState::default()
        };
        assert_eq!(webcam.phase(), WebcamPhase::Failed);
    }
}
