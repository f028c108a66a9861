//! Camera backend on ffmpeg-next.
//!
//! Opens a capture device through libavdevice, or replays a video file at its
//! native frame rate so the live pipeline can run without hardware.
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::capture::domain::camera::{Camera, VideoStream};
use crate::capture::domain::capture_constraints::{CaptureConstraints, FacingMode};
use crate::capture::domain::capture_error::CameraError;
use crate::shared::frame::Frame;

#[derive(Debug, Clone, PartialEq)]
pub enum CameraSource {
    /// The device named by [`CaptureConstraints::device`], or the platform default.
    Device,
    VideoFile(PathBuf),
}

pub struct FfmpegCamera {
    source: CameraSource,
}

impl FfmpegCamera {
    pub fn device() -> Self {
        Self {
            source: CameraSource::Device,
        }
    }

    pub fn video_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: CameraSource::VideoFile(path.into()),
        }
    }

    pub fn source(&self) -> &CameraSource {
        &self.source
    }
}

#[cfg(target_os = "linux")]
const DEVICE_FORMAT: &str = "v4l2";
#[cfg(target_os = "macos")]
const DEVICE_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const DEVICE_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const DEVICE_FORMAT: &str = "";

#[cfg(target_os = "linux")]
const DEFAULT_DEVICE: &str = "/dev/video0";
#[cfg(target_os = "macos")]
const DEFAULT_DEVICE: &str = "0";
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const DEFAULT_DEVICE: &str = "video=Integrated Camera";

impl Camera for FfmpegCamera {
    fn open(&self, constraints: &CaptureConstraints) -> Result<Box<dyn VideoStream>, CameraError> {
        ffmpeg_next::init().map_err(|e| camera_error(&e))?;

        let (ictx, pace) = match &self.source {
            CameraSource::Device => (open_device(constraints)?, false),
            CameraSource::VideoFile(path) => {
                let ictx = ffmpeg_next::format::input(path).map_err(|e| camera_error(&e))?;
                (ictx, true)
            }
        };

        let stream = FfmpegVideoStream::new(ictx, pace)?;
        log::info!(
            "Camera stream open: {}x{}{}",
            stream.width,
            stream.height,
            if pace { " (file replay)" } else { "" }
        );
        Ok(Box::new(stream))
    }
}

fn open_device(
    constraints: &CaptureConstraints,
) -> Result<ffmpeg_next::format::context::Input, CameraError> {
    ffmpeg_next::device::register_all();

    let format = find_device_format()?;

    let device = constraints
        .device
        .clone()
        .unwrap_or_else(|| DEFAULT_DEVICE.to_string());
    if constraints.facing_mode != FacingMode::User {
        log::debug!("Facing mode {:?} has no effect on desktop devices", constraints.facing_mode);
    }

    let mut options = ffmpeg_next::Dictionary::new();
    options.set(
        "video_size",
        &format!("{}x{}", constraints.ideal_width, constraints.ideal_height),
    );
    log::debug!("Opening {device} via {DEVICE_FORMAT}");

    match ffmpeg_next::format::open_with(
        &device,
        &ffmpeg_next::format::Format::Input(format),
        options,
    ) {
        Ok(ctx) => Ok(ctx.input()),
        // The ideal size is only a preference; retry at the device default.
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::util::error::EINVAL => {
            log::debug!("Device rejected the ideal size, using its default");
            ffmpeg_next::format::open_with(
                &device,
                &ffmpeg_next::format::Format::Input(find_device_format()?),
                ffmpeg_next::Dictionary::new(),
            )
            .map(|ctx| ctx.input())
            .map_err(|e| camera_error(&e))
        }
        Err(e) => Err(camera_error(&e)),
    }
}

fn find_device_format() -> Result<ffmpeg_next::format::format::Input, CameraError> {
    ffmpeg_next::device::input::video()
        .find(|f| f.name() == DEVICE_FORMAT)
        .ok_or_else(|| {
            CameraError::new(
                "NotSupportedError",
                format!("no capture input format available ({DEVICE_FORMAT:?})"),
            )
        })
}

/// Maps an ffmpeg failure to the platform error name used for classification.
pub fn platform_error_name(error: &ffmpeg_next::Error) -> &'static str {
    use ffmpeg_next::util::error::{EACCES, EBUSY, EINVAL, EIO, ENOENT, EPERM};
    match error {
        ffmpeg_next::Error::Other { errno } => match *errno {
            e if e == ENOENT => "NotFoundError",
            e if e == EACCES || e == EPERM => "NotAllowedError",
            e if e == EBUSY || e == EIO => "NotReadableError",
            e if e == EINVAL => "OverconstrainedError",
            _ => "UnknownError",
        },
        ffmpeg_next::Error::StreamNotFound => "NotFoundError",
        ffmpeg_next::Error::Exit | ffmpeg_next::Error::Eof => "AbortError",
        ffmpeg_next::Error::DecoderNotFound
        | ffmpeg_next::Error::DemuxerNotFound
        | ffmpeg_next::Error::ProtocolNotFound
        | ffmpeg_next::Error::PatchwelcomeNotImplemented => "NotSupportedError",
        _ => "UnknownError",
    }
}

fn camera_error(error: &ffmpeg_next::Error) -> CameraError {
    CameraError::new(platform_error_name(error), error.to_string())
}

/// A decoding video stream, converted to RGB24 frame by frame.
struct FfmpegVideoStream {
    ictx: Option<ffmpeg_next::format::context::Input>,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    width: u32,
    height: u32,
    sequence: u64,
    /// Frame spacing when replaying a file.
    frame_interval: Option<Duration>,
    last_frame_at: Option<Instant>,
    flushing: bool,
}

// Safety: the stream is owned by exactly one thread at a time (the frame pump
// or the thread calling `stop`, behind a mutex). The raw pointers inside
// ffmpeg types are never shared.
unsafe impl Send for FfmpegVideoStream {}

impl FfmpegVideoStream {
    fn new(ictx: ffmpeg_next::format::context::Input, pace: bool) -> Result<Self, CameraError> {
        let stream = ictx.streams().best(ffmpeg_next::media::Type::Video).ok_or_else(|| {
            CameraError::new("NotFoundError", "source has no video stream")
        })?;
        let video_stream_index = stream.index();
        let rate = stream.rate();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| camera_error(&e))?;
        let decoder = codec_ctx.decoder().video().map_err(|e| camera_error(&e))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| camera_error(&e))?;

        let frame_interval = (pace && rate.numerator() > 0 && rate.denominator() > 0)
            .then(|| Duration::from_secs_f64(rate.denominator() as f64 / rate.numerator() as f64));

        Ok(Self {
            ictx: Some(ictx),
            decoder,
            scaler,
            video_stream_index,
            width,
            height,
            sequence: 0,
            frame_interval,
            last_frame_at: None,
            flushing: false,
        })
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, CameraError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb)
            .map_err(|e| camera_error(&e))?;

        let pixels = extract_rgb_pixels(&rgb, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.sequence);
        self.sequence += 1;
        Ok(Some(frame))
    }

    fn pace(&mut self) {
        if let Some(interval) = self.frame_interval {
            if let Some(last) = self.last_frame_at {
                let elapsed = last.elapsed();
                if elapsed < interval {
                    thread::sleep(interval - elapsed);
                }
            }
            self.last_frame_at = Some(Instant::now());
        }
    }
}

impl VideoStream for FfmpegVideoStream {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        loop {
            if let Some(frame) = self.try_receive()? {
                self.pace();
                return Ok(Some(frame));
            }
            if self.flushing {
                return Ok(None);
            }
            let Some(ictx) = self.ictx.as_mut() else {
                return Ok(None);
            };

            let next = ictx.packets().next();
            match next {
                Some((stream, packet)) => {
                    if stream.index() != self.video_stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::trace!("Skipping undecodable packet: {e}");
                    }
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
            }
        }
    }

    fn stop(&mut self) {
        if self.ictx.take().is_some() {
            self.flushing = true;
            log::debug!("Camera stream released after {} frames", self.sequence);
        }
    }
}

fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture_error::CaptureErrorKind;
    use ffmpeg_next::util::error::{EACCES, EBUSY, EINVAL, ENOENT};
    use rstest::rstest;

    #[rstest]
    #[case::missing(ffmpeg_next::Error::Other { errno: ENOENT }, CaptureErrorKind::NoDevice)]
    #[case::denied(ffmpeg_next::Error::Other { errno: EACCES }, CaptureErrorKind::PermissionDenied)]
    #[case::busy(ffmpeg_next::Error::Other { errno: EBUSY }, CaptureErrorKind::DeviceBusy)]
    #[case::bad_size(ffmpeg_next::Error::Other { errno: EINVAL }, CaptureErrorKind::ConstraintsUnsatisfiable)]
    #[case::exit(ffmpeg_next::Error::Exit, CaptureErrorKind::Aborted)]
    #[case::no_decoder(ffmpeg_next::Error::DecoderNotFound, CaptureErrorKind::Unsupported)]
    #[case::bug(ffmpeg_next::Error::Bug, CaptureErrorKind::Unknown)]
    fn test_ffmpeg_errors_classify(#[case] error: ffmpeg_next::Error, #[case] expected: CaptureErrorKind) {
        assert_eq!(camera_error(&error).kind(), expected);
    }

    #[test]
    fn test_missing_video_file_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let camera = FfmpegCamera::video_file(tmp.path().join("absent.mp4"));
        let constraints = CaptureConstraints::default();
        let err = camera.open(&constraints).err().unwrap();
        assert_eq!(err.kind(), CaptureErrorKind::NoDevice);
    }
}
