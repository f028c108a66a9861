/// Default model base location. May be a local directory or an `http(s)://` URL.
pub const DEFAULT_MODEL_BASE: &str = "models";

/// File inside the model base that lists the sub-models and their shards.
pub const MODEL_MANIFEST_NAME: &str = "manifest.json";

/// Preferred capture resolution.
pub const IDEAL_CAPTURE_WIDTH: u32 = 1280;
pub const IDEAL_CAPTURE_HEIGHT: u32 = 720;

/// How long a single camera open attempt may take before it is abandoned.
pub const DEFAULT_START_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_START_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Minimum spacing between live-video detections (~10 detections per second).
pub const DEFAULT_DETECTION_INTERVAL_MS: u64 = 100;

/// Face detector input resolution and score threshold.
pub const DEFAULT_DETECTOR_INPUT_SIZE: u32 = 416;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.4;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Messages shown when an operation fails.
pub const MODELS_LOAD_FAILED_MESSAGE: &str =
    "Failed to load facial recognition models. Please retry.";
pub const LIVE_DETECTION_FAILED_MESSAGE: &str = "Face detection failed. Please try again.";
pub const IMAGE_DETECTION_FAILED_MESSAGE: &str = "Failed to analyze image. Please try again.";
pub const MODELS_NOT_READY_MESSAGE: &str = "Face detection models are not loaded yet.";
