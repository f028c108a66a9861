use iced::widget::{column, container, text};
use iced::{Element, Length, Theme};

use facesight_core::detection::domain::face_detection::FaceDetection;
use facesight_core::state::app_state::{WebcamPhase, WebcamState};

use crate::app::{scaled, MediaFrame, Message};
use crate::theme::{muted_color, surface_color};
use crate::widgets::face_overlay::media_with_overlay;

pub const PANEL_HEIGHT: f32 = 480.0;

pub fn view<'a>(
    fs: f32,
    webcam: &'a WebcamState,
    frame: Option<&MediaFrame>,
    faces: &'a [FaceDetection],
) -> Element<'a, Message> {
    if let (WebcamPhase::Active, Some(frame)) = (webcam.phase(), frame) {
        return media_with_overlay(frame.handle.clone(), frame.natural, faces, PANEL_HEIGHT);
    }

    let (title, detail) = match webcam.phase() {
        WebcamPhase::Loading => ("Starting camera...", String::new()),
        WebcamPhase::Active => ("Waiting for the first frame...", String::new()),
        WebcamPhase::Failed => (
            "Camera unavailable",
            webcam.error.clone().unwrap_or_default(),
        ),
        WebcamPhase::Idle => ("Camera is off", "Press Start Webcam to begin".to_string()),
    };
    let failed = webcam.phase() == WebcamPhase::Failed;

    let content = column![
        text(title).size(scaled(17.0, fs)).style(move |theme: &Theme| {
            if failed {
                text::danger(theme)
            } else {
                text::Style::default()
            }
        }),
        text(detail)
            .size(scaled(13.0, fs))
            .style(|theme: &Theme| text::Style {
                color: Some(muted_color(theme)),
            }),
    ]
    .spacing(6)
    .align_x(iced::Alignment::Center);

    container(content)
        .width(Length::Fill)
        .height(PANEL_HEIGHT)
        .center_x(Length::Fill)
        .center_y(PANEL_HEIGHT)
        .padding(16)
        .style(|theme: &Theme| container::Style {
            background: Some(surface_color(theme).into()),
            border: iced::border::Border {
                radius: 12.0.into(),
                ..iced::border::Border::default()
            },
            ..container::Style::default()
        })
        .into()
}
