use serde::{Deserialize, Serialize};

use crate::capture::domain::capture_error::CaptureErrorKind;
use crate::detection::domain::face_detection::FaceDetection;

/// Every state change the store accepts.
///
/// Serialized adjacently tagged, e.g. `{"type": "DETECTION_FAILURE", "payload": "x"}`.
/// Unrecognised `type` values decode to [`Action::Unknown`], which the
/// reducer ignores, so newer action logs still replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    WebcamStart,
    WebcamStartSuccess,
    WebcamStartFailure(CaptureFailure),
    WebcamStop,
    ModelsLoadStart,
    ModelsLoadSuccess,
    ModelsLoadFailure(String),
    DetectionStart,
    DetectionSuccess(Vec<FaceDetection>),
    DetectionFailure(String),
    DetectionClear,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureFailure {
    pub kind: CaptureErrorKind,
    pub message: String,
}

impl Action {
    pub fn webcam_failure(kind: CaptureErrorKind) -> Self {
        Action::WebcamStartFailure(CaptureFailure {
            kind,
            message: kind.message().to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::WebcamStart => "WEBCAM_START",
            Action::WebcamStartSuccess => "WEBCAM_START_SUCCESS",
            Action::WebcamStartFailure(_) => "WEBCAM_START_FAILURE",
            Action::WebcamStop => "WEBCAM_STOP",
            Action::ModelsLoadStart => "MODELS_LOAD_START",
            Action::ModelsLoadSuccess => "MODELS_LOAD_SUCCESS",
            Action::ModelsLoadFailure(_) => "MODELS_LOAD_FAILURE",
            Action::DetectionStart => "DETECTION_START",
            Action::DetectionSuccess(_) => "DETECTION_SUCCESS",
            Action::DetectionFailure(_) => "DETECTION_FAILURE",
            Action::DetectionClear => "DETECTION_CLEAR",
            Action::Unknown => "UNKNOWN",
        }
    }
}
