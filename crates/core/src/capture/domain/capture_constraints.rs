use serde::{Deserialize, Serialize};

use crate::shared::constants::{IDEAL_CAPTURE_HEIGHT, IDEAL_CAPTURE_WIDTH};

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

/// Video-only stream request. Width and height are preferences, not hard
/// requirements: a backend may deliver the nearest mode it supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: FacingMode,
    /// Backend-specific device name or path.
    pub device: Option<String>,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: IDEAL_CAPTURE_WIDTH,
            ideal_height: IDEAL_CAPTURE_HEIGHT,
            facing_mode: FacingMode::User,
            device: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_requests_front_facing_720p() {
        let c = CaptureConstraints::default();
        assert_eq!((c.ideal_width, c.ideal_height), (1280, 720));
        assert_eq!(c.facing_mode, FacingMode::User);
        assert!(c.device.is_none());
    }
}
