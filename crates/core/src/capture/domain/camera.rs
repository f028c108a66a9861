use crate::capture::domain::capture_constraints::CaptureConstraints;
use crate::capture::domain::capture_error::CameraError;
use crate::shared::frame::Frame;

/// Platform capability that hands out live video streams.
///
/// Shared between open attempts, so a retry can start while an abandoned
/// attempt is still blocked inside the platform.
pub trait Camera: Send + Sync {
    /// Acquires a stream. May block for as long as the platform takes to
    /// grant access, which is why the capture controller calls it from a
    /// worker thread.
    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// An open stream holding hardware resources until [`stop`](Self::stop).
pub trait VideoStream: Send {
    /// Blocks until the next frame. `Ok(None)` means the stream ended.
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError>;

    /// Releases the underlying device. Safe to call more than once.
    fn stop(&mut self);
}
