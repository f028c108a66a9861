//! Owns the lifecycle of one live camera stream.
//!
//! Opening runs on a worker thread with a deadline; frames arrive from a pump
//! thread. Both report over a channel that [`CaptureController::poll`] drains
//! on the thread owning the store, so every dispatch happens there.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::capture::domain::camera::{Camera, VideoStream};
use crate::capture::domain::capture_constraints::CaptureConstraints;
use crate::capture::domain::capture_error::{CameraError, CaptureErrorKind};
use crate::shared::constants::{
    DEFAULT_MAX_START_RETRIES, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_START_TIMEOUT_MS,
};
use crate::shared::frame::Frame;
use crate::shared::settings::AnalysisSettings;
use crate::state::action::Action;
use crate::state::store::Dispatch;

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub constraints: CaptureConstraints,
    pub start_timeout: Duration,
    pub max_start_retries: u32,
    /// Multiplied by the retry number before each retry.
    pub retry_backoff: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            constraints: CaptureConstraints::default(),
            start_timeout: Duration::from_millis(DEFAULT_START_TIMEOUT_MS),
            max_start_retries: DEFAULT_MAX_START_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl CaptureConfig {
    pub fn from_settings(settings: &AnalysisSettings) -> Self {
        Self {
            constraints: settings.capture_constraints(),
            start_timeout: settings.start_timeout(),
            max_start_retries: settings.max_start_retries,
            retry_backoff: settings.retry_backoff(),
        }
    }
}

/// Worker reports. `generation` identifies the attempt or stream that sent
/// it; anything from an older generation is stale.
enum CaptureEvent {
    Opened {
        generation: u64,
        stream: Box<dyn VideoStream>,
    },
    OpenFailed {
        generation: u64,
        error: CameraError,
    },
    Frame {
        generation: u64,
        frame: Frame,
    },
    Ended {
        generation: u64,
        error: Option<CameraError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Opening { attempt: u32, deadline: Instant },
    Backoff { attempt: u32, resume_at: Instant },
    Streaming,
}

type SharedStream = Arc<Mutex<Option<Box<dyn VideoStream>>>>;

pub struct CaptureController {
    camera: Arc<dyn Camera>,
    config: CaptureConfig,
    events_tx: Sender<CaptureEvent>,
    events_rx: Receiver<CaptureEvent>,
    generation: u64,
    phase: Phase,
    stream: Option<SharedStream>,
    pump_stop: Option<Arc<AtomicBool>>,
    latest: Option<Frame>,
}

impl CaptureController {
    pub fn new(camera: Arc<dyn Camera>, config: CaptureConfig) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            camera,
            config,
            events_tx,
            events_rx,
            generation: 0,
            phase: Phase::Idle,
            stream: None,
            pump_stop: None,
            latest: None,
        }
    }

    /// A start is pending (including retries and backoff).
    pub fn is_starting(&self) -> bool {
        matches!(self.phase, Phase::Opening { .. } | Phase::Backoff { .. })
    }

    pub fn is_streaming(&self) -> bool {
        self.phase == Phase::Streaming
    }

    /// Requests a stream. Ignored while one is open or pending.
    pub fn start(&mut self, store: &mut dyn Dispatch) {
        if self.phase != Phase::Idle {
            log::trace!("Capture start ignored: already {:?}", self.phase);
            return;
        }
        store.dispatch(Action::WebcamStart);
        self.spawn_open(0);
    }

    /// Releases the stream before returning and cancels any pending start.
    pub fn stop(&mut self, store: &mut dyn Dispatch) {
        self.release();
        self.phase = Phase::Idle;
        store.dispatch(Action::WebcamStop);
    }

    /// Applies worker reports and start deadlines, returning the newest
    /// frame delivered since the last call.
    pub fn poll(&mut self, store: &mut dyn Dispatch) -> Option<Frame> {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event, store);
        }
        self.check_deadlines(store, Instant::now());
        self.latest.take()
    }

    fn spawn_open(&mut self, attempt: u32) {
        self.generation += 1;
        let generation = self.generation;
        self.phase = Phase::Opening {
            attempt,
            deadline: Instant::now() + self.config.start_timeout,
        };

        let camera = self.camera.clone();
        let constraints = self.config.constraints.clone();
        let tx = self.events_tx.clone();
        log::debug!("Opening camera (attempt {})", attempt + 1);
        thread::spawn(move || {
            let event = match camera.open(&constraints) {
                Ok(stream) => CaptureEvent::Opened { generation, stream },
                Err(error) => CaptureEvent::OpenFailed { generation, error },
            };
            if let Err(crossbeam_channel::SendError(event)) = tx.send(event) {
                // Controller gone; do not leak the device.
                if let CaptureEvent::Opened { mut stream, .. } = event {
                    stream.stop();
                }
            }
        });
    }

    fn handle_event(&mut self, event: CaptureEvent, store: &mut dyn Dispatch) {
        let current = self.generation;
        match event {
            CaptureEvent::Opened { generation, mut stream } => {
                if generation != current || !matches!(self.phase, Phase::Opening { .. }) {
                    log::debug!("Releasing stream from abandoned start attempt");
                    stream.stop();
                    return;
                }
                self.phase = Phase::Streaming;
                self.install_stream(stream);
                log::info!("Camera started");
                store.dispatch(Action::WebcamStartSuccess);
            }
            CaptureEvent::OpenFailed { generation, error } => {
                if generation != current || !matches!(self.phase, Phase::Opening { .. }) {
                    log::trace!("Ignoring failure from abandoned start attempt: {error}");
                    return;
                }
                self.phase = Phase::Idle;
                let kind = error.kind();
                log::warn!("Camera failed to start ({kind:?}): {error}");
                store.dispatch(Action::webcam_failure(kind));
            }
            CaptureEvent::Frame { generation, frame } => {
                if generation == current && self.phase == Phase::Streaming {
                    if let Some(dropped) = self.latest.replace(frame) {
                        log::trace!("Dropping undelivered frame {}", dropped.sequence());
                    }
                }
            }
            CaptureEvent::Ended { generation, error } => {
                if generation != current || self.phase != Phase::Streaming {
                    return;
                }
                match error {
                    Some(e) => log::warn!("Camera stream failed: {e}"),
                    None => log::info!("Camera stream ended"),
                }
                self.release();
                self.phase = Phase::Idle;
                store.dispatch(Action::WebcamStop);
            }
        }
    }

    fn check_deadlines(&mut self, store: &mut dyn Dispatch, now: Instant) {
        match self.phase {
            Phase::Opening { attempt, deadline } if now >= deadline => {
                // Invalidate the attempt so its late stream is released on arrival.
                self.generation += 1;
                if attempt < self.config.max_start_retries {
                    let next = attempt + 1;
                    log::warn!(
                        "Camera start timed out, retrying ({next}/{})",
                        self.config.max_start_retries
                    );
                    self.phase = Phase::Backoff {
                        attempt: next,
                        resume_at: now + self.config.retry_backoff * next,
                    };
                } else {
                    log::warn!("Camera start timed out after {} attempts", attempt + 1);
                    self.phase = Phase::Idle;
                    store.dispatch(Action::webcam_failure(CaptureErrorKind::Timeout));
                }
            }
            Phase::Backoff { attempt, resume_at } if now >= resume_at => {
                self.spawn_open(attempt);
            }
            _ => {}
        }
    }

    fn install_stream(&mut self, stream: Box<dyn VideoStream>) {
        let shared: SharedStream = Arc::new(Mutex::new(Some(stream)));
        let stop = Arc::new(AtomicBool::new(false));
        let generation = self.generation;
        let tx = self.events_tx.clone();
        let pump_stream = shared.clone();
        let pump_stop = stop.clone();

        thread::spawn(move || run_pump(generation, &pump_stream, &pump_stop, &tx));

        self.stream = Some(shared);
        self.pump_stop = Some(stop);
    }

    /// Stops the pump and the stream, and invalidates everything in flight.
    fn release(&mut self) {
        self.generation += 1;
        self.latest = None;
        if let Some(stop) = self.pump_stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
        if let Some(shared) = self.stream.take() {
            let taken = match shared.lock() {
                Ok(mut guard) => guard.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            if let Some(mut stream) = taken {
                stream.stop();
                log::info!("Camera stopped");
            }
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.release();
    }
}

fn run_pump(
    generation: u64,
    stream: &SharedStream,
    stop: &AtomicBool,
    tx: &Sender<CaptureEvent>,
) {
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let result = {
            let mut guard = match stream.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            match guard.as_mut() {
                Some(s) => s.next_frame(),
                // Taken by `stop`.
                None => return,
            }
        };
        let event = match result {
            Ok(Some(frame)) => CaptureEvent::Frame { generation, frame },
            Ok(None) => CaptureEvent::Ended {
                generation,
                error: None,
            },
            Err(error) => CaptureEvent::Ended {
                generation,
                error: Some(error),
            },
        };
        let ended = matches!(event, CaptureEvent::Ended { .. });
        if tx.send(event).is_err() || ended {
            return;
        }
    }
}
