use thiserror::Error;

use crate::detection::domain::face_detection::FaceDetection;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("models not loaded yet")]
    ModelsNotLoaded,
    #[error("invalid model manifest: {0}")]
    Manifest(String),
    #[error("failed to load {model} model: {reason}")]
    ModelLoad { model: String, reason: String },
    #[error("face detection failed: {0}")]
    Inference(String),
    #[error("failed to decode image: {0}")]
    Image(String),
}

/// Capability boundary around the pretrained face models.
///
/// Implementations are driven from a single worker thread, hence `Send` and
/// `&mut self`.
pub trait DetectionProvider: Send {
    /// Loads every model the provider needs. Calling it again after a
    /// successful load returns immediately.
    fn load_models(&mut self) -> Result<(), DetectionError>;

    /// Detects faces in `source`. Fails with [`DetectionError::ModelsNotLoaded`]
    /// before a successful [`load_models`](Self::load_models).
    fn detect_faces(&mut self, source: &Frame) -> Result<Vec<FaceDetection>, DetectionError>;
}
