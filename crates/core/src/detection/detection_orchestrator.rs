//! Sequences model loading and face detection against the store.
//!
//! A single worker thread owns the [`DetectionProvider`]; jobs go to it over
//! one channel and outcomes come back over another. Outcomes are applied by
//! [`DetectionOrchestrator::poll`] on the thread owning the store.
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::detection_provider::{DetectionError, DetectionProvider};
use crate::detection::domain::face_detection::FaceDetection;
use crate::shared::constants::{
    IMAGE_DETECTION_FAILED_MESSAGE, LIVE_DETECTION_FAILED_MESSAGE, MODELS_LOAD_FAILED_MESSAGE,
    MODELS_NOT_READY_MESSAGE,
};
use crate::shared::frame::Frame;
use crate::state::action::Action;
use crate::state::store::Dispatch;

/// Where a frame came from. Live frames are throttled and only analysed
/// while the webcam is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOrigin {
    LiveVideo,
    StillImage,
}

impl FrameOrigin {
    fn failure_message(self) -> &'static str {
        match self {
            FrameOrigin::LiveVideo => LIVE_DETECTION_FAILED_MESSAGE,
            FrameOrigin::StillImage => IMAGE_DETECTION_FAILED_MESSAGE,
        }
    }
}

/// What happened to a frame handed to [`DetectionOrchestrator::detect_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Submitted,
    /// A detection is already in flight.
    DroppedBusy,
    /// Live frame arrived before the minimum interval elapsed.
    Throttled,
    /// Live frame while the webcam is not active.
    CaptureInactive,
    ModelsNotReady,
}

enum Job {
    LoadModels,
    Detect {
        epoch: u64,
        origin: FrameOrigin,
        frame: Frame,
    },
}

enum Outcome {
    ModelsLoaded(Result<(), DetectionError>),
    Detected {
        epoch: u64,
        origin: FrameOrigin,
        result: Result<Vec<FaceDetection>, DetectionError>,
    },
}

pub struct DetectionOrchestrator {
    jobs: Sender<Job>,
    outcomes: Receiver<Outcome>,
    epoch: u64,
    min_interval: Duration,
    last_live_submit: Option<Instant>,
}

impl DetectionOrchestrator {
    /// Moves `provider` onto a new worker thread. The worker exits when the
    /// orchestrator is dropped.
    pub fn new(provider: Box<dyn DetectionProvider>, min_interval: Duration) -> Self {
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<Job>();
        let (outcomes_tx, outcomes_rx) = crossbeam_channel::unbounded::<Outcome>();

        thread::spawn(move || run_worker(provider, &jobs_rx, &outcomes_tx));

        Self {
            jobs: jobs_tx,
            outcomes: outcomes_rx,
            epoch: 0,
            min_interval,
            last_live_submit: None,
        }
    }

    /// Starts loading models unless they are loaded or loading. Call again
    /// after a failure to retry.
    pub fn ensure_models_loaded(&mut self, store: &mut dyn Dispatch) {
        let models = &store.state().models;
        if models.is_loaded || models.is_loading {
            return;
        }
        store.dispatch(Action::ModelsLoadStart);
        if self.jobs.send(Job::LoadModels).is_err() {
            log::error!("Detection worker is gone, cannot load models");
            store.dispatch(Action::ModelsLoadFailure(MODELS_LOAD_FAILED_MESSAGE.to_string()));
        }
    }

    /// Submits one frame for analysis, at most one in flight.
    pub fn detect_once(
        &mut self,
        store: &mut dyn Dispatch,
        frame: Frame,
        origin: FrameOrigin,
    ) -> Submission {
        let state = store.state();
        if state.detection.is_processing {
            log::trace!("Frame {} dropped: detection in flight", frame.sequence());
            return Submission::DroppedBusy;
        }
        if origin == FrameOrigin::LiveVideo && !state.webcam.is_active {
            return Submission::CaptureInactive;
        }
        if !state.models.is_loaded {
            if origin == FrameOrigin::StillImage {
                store.dispatch(Action::DetectionFailure(MODELS_NOT_READY_MESSAGE.to_string()));
            }
            return Submission::ModelsNotReady;
        }
        if origin == FrameOrigin::LiveVideo {
            let now = Instant::now();
            if let Some(last) = self.last_live_submit {
                if now.duration_since(last) < self.min_interval {
                    return Submission::Throttled;
                }
            }
            self.last_live_submit = Some(now);
        }

        store.dispatch(Action::DetectionStart);
        let job = Job::Detect {
            epoch: self.epoch,
            origin,
            frame,
        };
        if self.jobs.send(job).is_err() {
            log::error!("Detection worker is gone");
            store.dispatch(Action::DetectionFailure(origin.failure_message().to_string()));
        }
        Submission::Submitted
    }

    /// Applies finished outcomes. Returns whether anything was applied.
    pub fn poll(&mut self, store: &mut dyn Dispatch) -> bool {
        let mut applied = false;
        while let Ok(outcome) = self.outcomes.try_recv() {
            applied = true;
            match outcome {
                Outcome::ModelsLoaded(Ok(())) => store.dispatch(Action::ModelsLoadSuccess),
                Outcome::ModelsLoaded(Err(e)) => {
                    log::error!("Error loading models: {e}");
                    store.dispatch(Action::ModelsLoadFailure(
                        MODELS_LOAD_FAILED_MESSAGE.to_string(),
                    ));
                }
                Outcome::Detected {
                    epoch,
                    origin,
                    result,
                } => self.apply_detection(store, epoch, origin, result),
            }
        }
        applied
    }

    /// Discards whatever is in flight and empties the detection slice.
    pub fn clear(&mut self, store: &mut dyn Dispatch) {
        self.epoch += 1;
        self.last_live_submit = None;
        store.dispatch(Action::DetectionClear);
    }

    fn apply_detection(
        &mut self,
        store: &mut dyn Dispatch,
        epoch: u64,
        origin: FrameOrigin,
        result: Result<Vec<FaceDetection>, DetectionError>,
    ) {
        if epoch != self.epoch {
            log::debug!("Discarding detection result from before the last clear");
            return;
        }
        if origin == FrameOrigin::LiveVideo && !store.state().webcam.is_active {
            log::debug!("Discarding live detection result: webcam stopped");
            store.dispatch(Action::DetectionClear);
            return;
        }
        match result {
            Ok(faces) => store.dispatch(Action::DetectionSuccess(faces)),
            Err(e) => {
                log::warn!("Error during face detection: {e}");
                store.dispatch(Action::DetectionFailure(origin.failure_message().to_string()));
            }
        }
    }
}

fn run_worker(
    mut provider: Box<dyn DetectionProvider>,
    jobs: &Receiver<Job>,
    outcomes: &Sender<Outcome>,
) {
    log::debug!("Detection worker started");
    for job in jobs.iter() {
        let outcome = match job {
            Job::LoadModels => Outcome::ModelsLoaded(provider.load_models()),
            Job::Detect {
                epoch,
                origin,
                frame,
            } => {
                let started = Instant::now();
                let result = provider.detect_faces(&frame);
                if let Ok(faces) = &result {
                    log::debug!(
                        "Detected {} faces in {:?} ({origin:?})",
                        faces.len(),
                        started.elapsed()
                    );
                }
                Outcome::Detected {
                    epoch,
                    origin,
                    result,
                }
            }
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    log::debug!("Detection worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::geometry::Rect;
    use crate::state::store::Store;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Loads according to `load_ok`; each detection blocks until the test
    /// sends its result.
    struct FakeProvider {
        load_ok: bool,
        loaded: bool,
        loads: Arc<AtomicUsize>,
        results: Receiver<Result<Vec<FaceDetection>, DetectionError>>,
    }

    impl DetectionProvider for FakeProvider {
        fn load_models(&mut self) -> Result<(), DetectionError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.load_ok {
                self.loaded = true;
                Ok(())
            } else {
                Err(DetectionError::Manifest("missing".into()))
            }
        }

        fn detect_faces(&mut self, _: &Frame) -> Result<Vec<FaceDetection>, DetectionError> {
            if !self.loaded {
                return Err(DetectionError::ModelsNotLoaded);
            }
            self.results
                .recv()
                .unwrap_or_else(|_| Err(DetectionError::Inference("closed".into())))
        }
    }

    struct Harness {
        orchestrator: DetectionOrchestrator,
        store: Store,
        results: Sender<Result<Vec<FaceDetection>, DetectionError>>,
        loads: Arc<AtomicUsize>,
    }

    fn harness(load_ok: bool, min_interval: Duration) -> Harness {
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        let loads = Arc::new(AtomicUsize::new(0));
        let provider = FakeProvider {
            load_ok,
            loaded: false,
            loads: loads.clone(),
            results: results_rx,
        };
        Harness {
            orchestrator: DetectionOrchestrator::new(Box::new(provider), min_interval),
            store: Store::new(),
            results: results_tx,
            loads,
        }
    }

    impl Harness {
        fn wait_until(&mut self, done: impl Fn(&Store) -> bool) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !done(&self.store) {
                assert!(Instant::now() < deadline, "condition not reached in time");
                self.orchestrator.poll(&mut self.store);
                thread::sleep(Duration::from_millis(1));
            }
        }

        fn load(&mut self) {
            self.orchestrator.ensure_models_loaded(&mut self.store);
            self.wait_until(|s| s.state().models.is_loaded);
        }

        fn submit(&mut self, origin: FrameOrigin) -> Submission {
            self.orchestrator.detect_once(&mut self.store, frame(), origin)
        }

        fn count(&self, name: &str) -> usize {
            self.store.history().filter(|a| a.name() == name).count()
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0; 4 * 4 * 3], 4, 4, 3, 1)
    }

    fn face(x: f64) -> FaceDetection {
        FaceDetection::new(Rect::new(x, 0.0, 10.0, 10.0), 0.9)
    }

    #[test]
    fn test_models_load_once() {
        let mut h = harness(true, Duration::ZERO);
        h.orchestrator.ensure_models_loaded(&mut h.store);
        h.orchestrator.ensure_models_loaded(&mut h.store);
        assert!(h.store.state().models.is_loading);

        h.wait_until(|s| s.state().models.is_loaded);
        h.orchestrator.ensure_models_loaded(&mut h.store);

        assert_eq!(h.loads.load(Ordering::SeqCst), 1);
        assert_eq!(h.count("MODELS_LOAD_START"), 1);
    }

    #[test]
    fn test_model_load_failure_can_be_retried() {
        let mut h = harness(false, Duration::ZERO);
        h.orchestrator.ensure_models_loaded(&mut h.store);
        h.wait_until(|s| s.state().models.error.is_some());

        assert_eq!(
            h.store.state().models.error.as_deref(),
            Some(MODELS_LOAD_FAILED_MESSAGE)
        );
        assert!(!h.store.state().models.is_loading);

        h.orchestrator.ensure_models_loaded(&mut h.store);
        assert!(h.store.state().models.is_loading);
        h.wait_until(|s| s.state().models.error.is_some());
        assert_eq!(h.loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_still_image_before_models_ready_reports_failure() {
        let mut h = harness(true, Duration::ZERO);
        assert_eq!(h.submit(FrameOrigin::StillImage), Submission::ModelsNotReady);
        assert_eq!(
            h.store.state().detection.error.as_deref(),
            Some(MODELS_NOT_READY_MESSAGE)
        );
        assert_eq!(h.count("DETECTION_START"), 0);
    }

    #[test]
    fn test_live_frame_before_models_ready_is_silent() {
        let mut h = harness(true, Duration::ZERO);
        h.store.dispatch(Action::WebcamStart);
        h.store.dispatch(Action::WebcamStartSuccess);
        assert_eq!(h.submit(FrameOrigin::LiveVideo), Submission::ModelsNotReady);
        assert!(h.store.state().detection.error.is_none());
    }

    #[test]
    fn test_live_frame_requires_active_webcam() {
        let mut h = harness(true, Duration::ZERO);
        h.load();
        assert_eq!(h.submit(FrameOrigin::LiveVideo), Submission::CaptureInactive);
        assert_eq!(h.count("DETECTION_START"), 0);
    }

    #[test]
    fn test_busy_detection_drops_new_frames() {
        let mut h = harness(true, Duration::ZERO);
        h.load();

        assert_eq!(h.submit(FrameOrigin::StillImage), Submission::Submitted);
        assert!(h.store.state().detection.is_processing);
        assert_eq!(h.submit(FrameOrigin::StillImage), Submission::DroppedBusy);
        assert_eq!(h.count("DETECTION_START"), 1);

        h.results.send(Ok(vec![face(1.0)])).unwrap();
        h.wait_until(|s| !s.state().detection.is_processing);
        assert_eq!(h.store.state().detection.faces.len(), 1);
    }

    #[test]
    fn test_detection_failure_keeps_previous_faces() {
        let mut h = harness(true, Duration::ZERO);
        h.load();

        h.submit(FrameOrigin::StillImage);
        h.results.send(Ok(vec![face(1.0), face(2.0)])).unwrap();
        h.wait_until(|s| !s.state().detection.is_processing);

        h.submit(FrameOrigin::StillImage);
        h.results
            .send(Err(DetectionError::Inference("boom".into())))
            .unwrap();
        h.wait_until(|s| !s.state().detection.is_processing);

        let detection = &h.store.state().detection;
        assert_eq!(detection.faces.len(), 2);
        assert_eq!(detection.error.as_deref(), Some(IMAGE_DETECTION_FAILED_MESSAGE));
    }

    #[test]
    fn test_live_failure_uses_live_message() {
        let mut h = harness(true, Duration::ZERO);
        h.load();
        h.store.dispatch(Action::WebcamStart);
        h.store.dispatch(Action::WebcamStartSuccess);

        h.submit(FrameOrigin::LiveVideo);
        h.results
            .send(Err(DetectionError::Inference("boom".into())))
            .unwrap();
        h.wait_until(|s| !s.state().detection.is_processing);
        assert_eq!(
            h.store.state().detection.error.as_deref(),
            Some(LIVE_DETECTION_FAILED_MESSAGE)
        );
    }

    #[test]
    fn test_live_frames_are_throttled() {
        let mut h = harness(true, Duration::from_secs(60));
        h.load();
        h.store.dispatch(Action::WebcamStart);
        h.store.dispatch(Action::WebcamStartSuccess);

        assert_eq!(h.submit(FrameOrigin::LiveVideo), Submission::Submitted);
        h.results.send(Ok(Vec::new())).unwrap();
        h.wait_until(|s| !s.state().detection.is_processing);

        assert_eq!(h.submit(FrameOrigin::LiveVideo), Submission::Throttled);
        // Still images are never throttled.
        assert_eq!(h.submit(FrameOrigin::StillImage), Submission::Submitted);
    }

    #[test]
    fn test_live_result_after_webcam_stop_is_discarded() {
        let mut h = harness(true, Duration::ZERO);
        h.load();
        h.store.dispatch(Action::WebcamStart);
        h.store.dispatch(Action::WebcamStartSuccess);

        h.submit(FrameOrigin::LiveVideo);
        h.store.dispatch(Action::WebcamStop);
        h.results.send(Ok(vec![face(1.0)])).unwrap();
        h.wait_until(|s| !s.state().detection.is_processing);

        assert!(h.store.state().detection.faces.is_empty());
        assert_eq!(h.count("DETECTION_SUCCESS"), 0);
        assert_eq!(h.count("DETECTION_CLEAR"), 1);
    }

    #[test]
    fn test_clear_discards_in_flight_result() {
        let mut h = harness(true, Duration::ZERO);
        h.load();

        h.submit(FrameOrigin::StillImage);
        h.orchestrator.clear(&mut h.store);
        assert!(!h.store.state().detection.is_processing);

        h.results.send(Ok(vec![face(1.0)])).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !h.orchestrator.poll(&mut h.store) {
            assert!(Instant::now() < deadline, "outcome never arrived");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(h.store.state().detection.faces.is_empty());
        assert_eq!(h.count("DETECTION_SUCCESS"), 0);
    }

    #[test]
    fn test_live_session_end_to_end() {
        let mut h = harness(true, Duration::ZERO);
        h.load();
        h.store.dispatch(Action::WebcamStart);
        h.store.dispatch(Action::WebcamStartSuccess);

        assert_eq!(h.submit(FrameOrigin::LiveVideo), Submission::Submitted);
        h.results.send(Ok(vec![face(5.0)])).unwrap();
        h.wait_until(|s| !s.state().detection.faces.is_empty());

        h.store.dispatch(Action::WebcamStop);
        assert!(!h.store.state().webcam.is_active);
        assert!(h.store.state().detection.faces.is_empty());
    }
}
