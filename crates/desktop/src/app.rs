use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use iced::widget::{column, container, image, row, scrollable, text, Space};
use iced::{Element, Length, Subscription, Task, Theme};

use facesight_core::capture::capture_controller::{CaptureConfig, CaptureController};
use facesight_core::capture::infrastructure::ffmpeg_camera::FfmpegCamera;
use facesight_core::capture::infrastructure::image_loader;
use facesight_core::detection::detection_orchestrator::{DetectionOrchestrator, FrameOrigin};
use facesight_core::detection::infrastructure::onnx_face_provider::OnnxFaceProvider;
use facesight_core::shared::constants::IMAGE_EXTENSIONS;
use facesight_core::shared::frame::Frame;
use facesight_core::shared::geometry;
use facesight_core::state::store::{Dispatch, Store};

use crate::panels;
use crate::settings::{Appearance, Settings};
use crate::theme;

/// Polling rate while anything is in flight.
const TICK_INTERVAL: Duration = Duration::from_millis(33);

#[derive(Debug, Clone)]
pub enum Message {
    Tick,
    RetryModels,
    ToggleWebcam,
    UploadImage,
    ImageSelected(Option<PathBuf>),
    ImageLoaded(PathBuf, Result<Frame, String>),
    AnalyzeImage,
    AppearanceChanged(Appearance),
    HighContrastChanged(bool),
    FontScaleChanged(f32),
}

/// A frame ready to display, with its native resolution for the overlay.
pub struct MediaFrame {
    pub handle: image::Handle,
    pub natural: geometry::Size,
}

impl MediaFrame {
    fn from_frame(frame: &Frame) -> Self {
        Self {
            handle: image::Handle::from_rgba(frame.width(), frame.height(), frame.to_rgba()),
            natural: geometry::Size::new(frame.width() as f64, frame.height() as f64),
        }
    }
}

pub struct UploadedImage {
    pub path: PathBuf,
    pub frame: Frame,
    pub media: MediaFrame,
}

pub struct App {
    pub settings: Settings,
    store: Store,
    capture: CaptureController,
    detection: DetectionOrchestrator,
    download: Arc<Mutex<(u64, u64)>>,
    live: Option<MediaFrame>,
    upload: Option<UploadedImage>,
    upload_error: Option<String>,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let settings = Settings::load();
        let analysis = &settings.analysis;

        let download = Arc::new(Mutex::new((0u64, 0u64)));
        let progress = download.clone();
        let provider = OnnxFaceProvider::from_settings(analysis).with_download_progress(
            move |done, total| {
                if let Ok(mut p) = progress.lock() {
                    *p = (done, total);
                }
            },
        );

        let detection =
            DetectionOrchestrator::new(Box::new(provider), analysis.detection_interval());
        let capture = CaptureController::new(
            Arc::new(FfmpegCamera::device()),
            CaptureConfig::from_settings(analysis),
        );

        let mut app = Self {
            settings,
            store: Store::new(),
            capture,
            detection,
            download,
            live: None,
            upload: None,
            upload_error: None,
        };
        app.detection.ensure_models_loaded(&mut app.store);
        (app, Task::none())
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Tick => self.poll_workers(),
            Message::RetryModels => {
                self.detection.ensure_models_loaded(&mut self.store);
            }
            Message::ToggleWebcam => {
                let webcam = &self.store.state().webcam;
                if webcam.is_active || self.capture.is_starting() {
                    self.capture.stop(&mut self.store);
                    self.live = None;
                } else {
                    self.capture.start(&mut self.store);
                }
            }
            Message::UploadImage => {
                return Task::perform(
                    async {
                        rfd::AsyncFileDialog::new()
                            .set_title("Select an image")
                            .add_filter("Images", IMAGE_EXTENSIONS)
                            .pick_file()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    Message::ImageSelected,
                );
            }
            Message::ImageSelected(Some(path)) => {
                return Task::perform(
                    async move {
                        let result = image_loader::load_image(&path).map_err(|e| e.to_string());
                        (path, result)
                    },
                    |(path, result)| Message::ImageLoaded(path, result),
                );
            }
            Message::ImageSelected(None) => {}
            Message::ImageLoaded(path, Ok(frame)) => {
                log::info!("Loaded {}", path.display());
                self.upload = Some(UploadedImage {
                    media: MediaFrame::from_frame(&frame),
                    path,
                    frame,
                });
                self.upload_error = None;
                self.detection.clear(&mut self.store);
            }
            Message::ImageLoaded(path, Err(e)) => {
                log::warn!("Could not open {}: {e}", path.display());
                self.upload_error = Some(format!("Could not open image: {e}"));
            }
            Message::AnalyzeImage => {
                if let Some(upload) = &self.upload {
                    self.detection.detect_once(
                        &mut self.store,
                        upload.frame.clone(),
                        FrameOrigin::StillImage,
                    );
                }
            }
            Message::AppearanceChanged(appearance) => {
                self.settings.appearance = appearance;
                self.settings.save();
            }
            Message::HighContrastChanged(enabled) => {
                self.settings.high_contrast = enabled;
                self.settings.save();
            }
            Message::FontScaleChanged(scale) => {
                self.settings.font_scale = scale;
                self.settings.save();
            }
        }
        Task::none()
    }

    fn poll_workers(&mut self) {
        if let Some(frame) = self.capture.poll(&mut self.store) {
            self.live = Some(MediaFrame::from_frame(&frame));
            self.detection.detect_once(&mut self.store, frame, FrameOrigin::LiveVideo);
        }
        self.detection.poll(&mut self.store);
        if !self.store.state().webcam.is_active {
            self.live = None;
        }
    }

    fn download_progress(&self) -> (u64, u64) {
        self.download.lock().map(|p| *p).unwrap_or((0, 0))
    }

    pub fn view(&self) -> Element<'_, Message> {
        let fs = self.settings.font_scale;
        let state = self.store.state();

        if !state.models.is_loaded {
            return panels::model_loader::view(fs, &state.models, self.download_progress());
        }

        let header = column![
            text("FaceSight").size(scaled(28.0, fs)),
            text("Real-time face detection with age, gender and emotion estimates")
                .size(scaled(14.0, fs))
                .style(|t: &Theme| text::Style {
                    color: Some(theme::muted_color(t)),
                }),
        ]
        .spacing(4)
        .align_x(iced::Alignment::Center)
        .width(Length::Fill);

        let live = panels::live_view::view(
            fs,
            &state.webcam,
            self.live.as_ref(),
            &state.detection.faces,
        );
        let details = panels::face_details::view(fs, state);

        let body = column![
            header,
            panels::controls::view(fs, &state.webcam),
            row![
                container(live).width(Length::FillPortion(1)),
                container(details).width(Length::FillPortion(1)),
            ]
            .spacing(16),
            panels::image_uploader::view(
                fs,
                self.upload.as_ref(),
                self.upload_error.as_deref(),
                &state.detection,
            ),
            Space::new().height(8),
            panels::appearance::view(&self.settings),
        ]
        .spacing(20)
        .padding(20);

        scrollable(body).height(Length::Fill).into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(self.settings.appearance, self.settings.high_contrast)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let state = self.store.state();
        let busy = state.models.is_loading
            || state.webcam.is_loading
            || state.webcam.is_active
            || state.detection.is_processing
            || self.capture.is_starting();
        if busy {
            iced::time::every(TICK_INTERVAL).map(|_| Message::Tick)
        } else if self.settings.appearance == Appearance::System {
            // Theme is resolved fresh in theme() on every render.
            iced::time::every(Duration::from_secs(2)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }
}

/// Scale a base font size by the user's font_scale setting.
pub fn scaled(base: f32, font_scale: f32) -> f32 {
    (base * font_scale).round()
}
