use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a capture stream could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureErrorKind {
    NoDevice,
    PermissionDenied,
    DeviceBusy,
    ConstraintsUnsatisfiable,
    Aborted,
    Unsupported,
    Timeout,
    Unknown,
}

/// Platform error names and the cause each one maps to.
const PLATFORM_ERRORS: &[(&str, CaptureErrorKind)] = &[
    ("NotFoundError", CaptureErrorKind::NoDevice),
    ("DevicesNotFoundError", CaptureErrorKind::NoDevice),
    ("NotAllowedError", CaptureErrorKind::PermissionDenied),
    ("PermissionDeniedError", CaptureErrorKind::PermissionDenied),
    ("SecurityError", CaptureErrorKind::PermissionDenied),
    ("NotReadableError", CaptureErrorKind::DeviceBusy),
    ("TrackStartError", CaptureErrorKind::DeviceBusy),
    ("OverconstrainedError", CaptureErrorKind::ConstraintsUnsatisfiable),
    ("ConstraintNotSatisfiedError", CaptureErrorKind::ConstraintsUnsatisfiable),
    ("AbortError", CaptureErrorKind::Aborted),
    ("TypeError", CaptureErrorKind::Unsupported),
    ("NotSupportedError", CaptureErrorKind::Unsupported),
];

impl CaptureErrorKind {
    /// Classifies a platform error name. Unrecognised names map to `Unknown`.
    pub fn classify(platform_name: &str) -> Self {
        PLATFORM_ERRORS
            .iter()
            .find(|(name, _)| *name == platform_name)
            .map(|&(_, kind)| kind)
            .unwrap_or(CaptureErrorKind::Unknown)
    }

    pub fn message(self) -> &'static str {
        match self {
            CaptureErrorKind::NoDevice => "No camera found. Please connect a camera and try again.",
            CaptureErrorKind::PermissionDenied => {
                "Camera access was denied. Please grant permission and try again."
            }
            CaptureErrorKind::DeviceBusy => {
                "The camera is already in use by another application."
            }
            CaptureErrorKind::ConstraintsUnsatisfiable => {
                "The camera does not support the requested resolution."
            }
            CaptureErrorKind::Aborted => "Starting the camera was aborted.",
            CaptureErrorKind::Unsupported => "Camera capture is not supported on this system.",
            CaptureErrorKind::Timeout => "The camera did not start in time.",
            CaptureErrorKind::Unknown => {
                "Could not access webcam. Please ensure you have granted permission."
            }
        }
    }
}

/// Failure reported by a camera backend, keyed by platform error name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name}: {detail}")]
pub struct CameraError {
    pub name: String,
    pub detail: String,
}

impl CameraError {
    pub fn new(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> CaptureErrorKind {
        CaptureErrorKind::classify(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::not_found("NotFoundError", CaptureErrorKind::NoDevice)]
    #[case::not_allowed("NotAllowedError", CaptureErrorKind::PermissionDenied)]
    #[case::security("SecurityError", CaptureErrorKind::PermissionDenied)]
    #[case::not_readable("NotReadableError", CaptureErrorKind::DeviceBusy)]
    #[case::overconstrained("OverconstrainedError", CaptureErrorKind::ConstraintsUnsatisfiable)]
    #[case::abort("AbortError", CaptureErrorKind::Aborted)]
    #[case::type_error("TypeError", CaptureErrorKind::Unsupported)]
    #[case::unrecognised("SomethingElse", CaptureErrorKind::Unknown)]
    #[case::empty("", CaptureErrorKind::Unknown)]
    fn test_classify(#[case] name: &str, #[case] expected: CaptureErrorKind) {
        assert_eq!(CaptureErrorKind::classify(name), expected);
    }

    #[test]
    fn test_unknown_uses_default_message() {
        assert!(CaptureErrorKind::Unknown.message().contains("Could not access webcam"));
    }

    #[test]
    fn test_camera_error_kind_and_display() {
        let err = CameraError::new("NotAllowedError", "EACCES on /dev/video0");
        assert_eq!(err.kind(), CaptureErrorKind::PermissionDenied);
        assert_eq!(err.to_string(), "NotAllowedError: EACCES on /dev/video0");
    }
}
