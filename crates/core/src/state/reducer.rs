//! The single reduction function behind [`Store`](super::store::Store).
//!
//! `reduce` has no side effects and never fails: every action maps the
//! previous state to the next one, and anything it does not recognise leaves
//! the state untouched.

use crate::state::action::Action;
use crate::state::app_state::{AppState, DetectionState, ModelsState, WebcamState};

pub fn reduce(mut state: AppState, action: Action) -> AppState {
    match action {
        Action::WebcamStart => {
            // An active stream is never "loading" again.
            if !state.webcam.is_active {
                state.webcam.is_loading = true;
                state.webcam.error = None;
                state.webcam.error_kind = None;
            }
        }
        Action::WebcamStartSuccess => {
            state.webcam = WebcamState {
                is_active: true,
                ..WebcamState::default()
            };
        }
        Action::WebcamStartFailure(failure) => {
            state.webcam = WebcamState {
                is_active: false,
                is_loading: false,
                error: Some(failure.message),
                error_kind: Some(failure.kind),
            };
        }
        Action::WebcamStop => {
            state.webcam = WebcamState::default();
            state.detection.faces.clear();
        }
        Action::ModelsLoadStart => {
            if !state.models.is_loaded {
                state.models.is_loading = true;
                state.models.error = None;
            }
        }
        Action::ModelsLoadSuccess => {
            state.models = ModelsState {
                is_loaded: true,
                ..ModelsState::default()
            };
        }
        Action::ModelsLoadFailure(message) => {
            // Loaded models stay loaded for the session.
            if !state.models.is_loaded {
                state.models = ModelsState {
                    is_loaded: false,
                    is_loading: false,
                    error: Some(message),
                };
            }
        }
        Action::DetectionStart => {
            state.detection.is_processing = true;
            state.detection.error = None;
        }
        Action::DetectionSuccess(faces) => {
            state.detection = DetectionState {
                faces,
                is_processing: false,
                error: None,
            };
        }
        Action::DetectionFailure(message) => {
            state.detection.is_processing = false;
            state.detection.error = Some(message);
        }
        Action::DetectionClear => {
            state.detection = DetectionState::default();
        }
        Action::Unknown => {}
    }
    state
}
