use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use facesight_core::capture::capture_controller::{CaptureConfig, CaptureController};
use facesight_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use facesight_core::capture::infrastructure::image_loader;
use facesight_core::detection::detection_orchestrator::{DetectionOrchestrator, FrameOrigin};
use facesight_core::detection::domain::face_detection::FaceDetection;
use facesight_core::detection::infrastructure::onnx_face_provider::OnnxFaceProvider;
use facesight_core::overlay::labels::{attribute_label, dominant_expression_label};
use facesight_core::overlay::overlay_geometry::{project_faces, MediaGeometry};
use facesight_core::shared::geometry::{Rect, Size};
use facesight_core::shared::settings::AnalysisSettings;
use facesight_core::state::action::Action;
use facesight_core::state::app_state::AppState;
use facesight_core::state::store::{Dispatch, Store};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Face detection and analysis for images, cameras and video files.
#[derive(Parser)]
#[command(name = "facesight", version)]
struct Cli {
    /// Settings file (JSON). Missing fields take their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model base: a directory or http(s) URL holding manifest.json.
    #[arg(long, global = true)]
    models: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect faces in a still image and describe them.
    Analyze {
        image: PathBuf,

        /// Width of the display the image is shown in; prints overlay boxes.
        #[arg(long, requires = "display_height")]
        display_width: Option<f64>,

        #[arg(long, requires = "display_width")]
        display_height: Option<f64>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run live detection on a camera or a replayed video file.
    Live {
        /// Capture device (e.g. /dev/video1). Defaults to the platform camera.
        #[arg(long, conflicts_with = "video")]
        device: Option<String>,

        /// Replay a video file instead of opening a camera.
        #[arg(long)]
        video: Option<PathBuf>,

        /// Stop after this many seconds.
        #[arg(long, default_value = "10")]
        seconds: u64,
    },
    /// Feed a JSON action log through the store and print the final state.
    Replay { actions: PathBuf },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => AnalysisSettings::load_from(path)?,
        None => AnalysisSettings::default(),
    };
    if let Some(models) = cli.models {
        settings.model_base = models;
    }

    match cli.command {
        Command::Analyze {
            image,
            display_width,
            display_height,
            json,
        } => {
            let display = display_width.zip(display_height).map(|(w, h)| Size::new(w, h));
            run_analyze(&settings, &image, display, json)
        }
        Command::Live {
            device,
            video,
            seconds,
        } => {
            if device.is_some() {
                settings.camera_device = device;
            }
            run_live(&settings, video, Duration::from_secs(seconds))
        }
        Command::Replay { actions } => run_replay(&actions),
    }
}

fn build_orchestrator(settings: &AnalysisSettings) -> DetectionOrchestrator {
    let provider =
        OnnxFaceProvider::from_settings(settings).with_download_progress(download_progress);
    DetectionOrchestrator::new(Box::new(provider), settings.detection_interval())
}

fn wait_for(
    orchestrator: &mut DetectionOrchestrator,
    store: &mut Store,
    done: impl Fn(&AppState) -> bool,
) {
    while !done(store.state()) {
        orchestrator.poll(store);
        thread::sleep(POLL_INTERVAL);
    }
}

fn load_models(
    orchestrator: &mut DetectionOrchestrator,
    store: &mut Store,
) -> Result<(), Box<dyn std::error::Error>> {
    orchestrator.ensure_models_loaded(store);
    wait_for(orchestrator, store, |s| !s.models.is_loading);
    if let Some(error) = &store.state().models.error {
        return Err(error.clone().into());
    }
    log::info!("Models loaded");
    Ok(())
}

fn run_analyze(
    settings: &AnalysisSettings,
    image: &Path,
    display: Option<Size>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !image.exists() {
        return Err(format!("Input file not found: {}", image.display()).into());
    }
    let frame = image_loader::load_image(image)?;
    let natural = Size::new(frame.width() as f64, frame.height() as f64);

    let mut store = Store::new();
    let mut orchestrator = build_orchestrator(settings);
    load_models(&mut orchestrator, &mut store)?;

    orchestrator.detect_once(&mut store, frame, FrameOrigin::StillImage);
    wait_for(&mut orchestrator, &mut store, |s| !s.detection.is_processing);

    let detection = &store.state().detection;
    if let Some(error) = &detection.error {
        return Err(error.clone().into());
    }

    let overlay = display.map(|size| {
        let geometry =
            MediaGeometry::contained(natural, Rect::new(0.0, 0.0, size.width, size.height));
        project_faces(&detection.faces, &geometry)
    });

    if json {
        let boxes: Option<Vec<Rect>> = overlay
            .as_ref()
            .map(|faces| faces.iter().map(|f| f.bounding_box).collect());
        let out = serde_json::json!({
            "image": image.display().to_string(),
            "width": natural.width,
            "height": natural.height,
            "faces": detection.faces,
            "overlay": boxes,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if detection.faces.is_empty() {
        println!("No faces detected in {}", image.display());
        return Ok(());
    }
    for (i, face) in detection.faces.iter().enumerate() {
        print_face(i, face);
        if let Some(screen) = overlay.as_ref().and_then(|o| o.get(i)) {
            let r = screen.bounding_box;
            println!(
                "  overlay: ({:.1}, {:.1}) {:.1}x{:.1}",
                r.x, r.y, r.width, r.height
            );
        }
    }
    Ok(())
}

fn print_face(index: usize, face: &FaceDetection) {
    let r = face.bounding_box;
    println!(
        "Face {}: ({:.0}, {:.0}) {:.0}x{:.0}, score {:.2}",
        index + 1,
        r.x,
        r.y,
        r.width,
        r.height,
        face.score
    );
    if let Some(attributes) = attribute_label(face) {
        println!("  {attributes}");
    }
    if let Some(expression) = dominant_expression_label(face) {
        println!("  {expression}");
    }
}

fn run_live(
    settings: &AnalysisSettings,
    video: Option<PathBuf>,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let camera = match video {
        Some(path) => {
            if !path.exists() {
                return Err(format!("Input file not found: {}", path.display()).into());
            }
            FfmpegCamera::video_file(path)
        }
        None => FfmpegCamera::device(),
    };

    let mut store = Store::new();
    let mut orchestrator = build_orchestrator(settings);
    load_models(&mut orchestrator, &mut store)?;

    let mut controller =
        CaptureController::new(Arc::new(camera), CaptureConfig::from_settings(settings));
    controller.start(&mut store);

    let deadline = Instant::now() + duration;
    let mut frames = 0usize;
    let mut detections = 0usize;
    while Instant::now() < deadline {
        if let Some(frame) = controller.poll(&mut store) {
            frames += 1;
            orchestrator.detect_once(&mut store, frame, FrameOrigin::LiveVideo);
        }
        if orchestrator.poll(&mut store) {
            let detection = &store.state().detection;
            if !detection.is_processing && detection.error.is_none() {
                detections += 1;
                log::info!("Detection {detections}: {} face(s)", detection.faces.len());
                for (i, face) in detection.faces.iter().enumerate() {
                    print_face(i, face);
                }
            }
        }

        let webcam = &store.state().webcam;
        if let Some(error) = &webcam.error {
            return Err(error.clone().into());
        }
        if !webcam.is_active && !webcam.is_loading {
            log::info!("Stream ended");
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    controller.stop(&mut store);
    eprintln!("{frames} frames, {detections} detections");
    Ok(())
}

fn run_replay(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    let actions: Vec<Action> = serde_json::from_str(&text)?;

    let mut store = Store::new();
    for action in actions {
        store.dispatch(action);
    }
    println!("{}", serde_json::to_string_pretty(store.state())?);
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face analysis models... {pct}%");
    } else {
        eprint!("\rDownloading face analysis models... {downloaded} bytes");
    }
}
