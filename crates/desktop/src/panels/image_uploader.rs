use iced::widget::{button, column, container, row, text, Column};
use iced::{Element, Length, Theme};

use facesight_core::state::app_state::DetectionState;

use crate::app::{scaled, Message, UploadedImage};
use crate::theme::muted_color;
use crate::widgets::face_overlay::media_with_overlay;

const IMAGE_HEIGHT: f32 = 520.0;

pub fn view<'a>(
    fs: f32,
    upload: Option<&UploadedImage>,
    upload_error: Option<&'a str>,
    detection: &'a DetectionState,
) -> Element<'a, Message> {
    let mut buttons = row![button(text("Upload Image").size(scaled(15.0, fs)))
        .on_press(Message::UploadImage)
        .padding([10, 20])]
    .spacing(12);

    if upload.is_some() {
        let label = if detection.is_processing {
            "Analyzing..."
        } else {
            "Analyze Faces"
        };
        let mut analyze = button(text(label).size(scaled(15.0, fs)))
            .padding([10, 20])
            .style(button::secondary);
        if !detection.is_processing {
            analyze = analyze.on_press(Message::AnalyzeImage);
        }
        buttons = buttons.push(analyze);
    }

    let mut col = Column::new()
        .spacing(12)
        .push(text("Image Analysis").size(scaled(20.0, fs)))
        .push(buttons);

    if let Some(error) = upload_error.or(detection.error.as_deref()) {
        col = col.push(error_banner(fs, error));
    }

    if let Some(upload) = upload {
        let name = upload
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        col = col
            .push(
                text(name)
                    .size(scaled(12.0, fs))
                    .style(|theme: &Theme| text::Style {
                        color: Some(muted_color(theme)),
                    }),
            )
            .push(media_with_overlay(
                upload.media.handle.clone(),
                upload.media.natural,
                &detection.faces,
                IMAGE_HEIGHT,
            ));
    }

    col.into()
}

fn error_banner<'a>(fs: f32, message: &'a str) -> Element<'a, Message> {
    container(column![text(message).size(scaled(14.0, fs))])
        .width(Length::Fill)
        .padding(12)
        .style(|theme: &Theme| {
            let danger = theme.palette().danger;
            container::Style {
                background: Some(iced::Color { a: 0.12, ..danger }.into()),
                text_color: Some(danger),
                border: iced::border::Border {
                    color: danger,
                    width: 1.0,
                    radius: 6.0.into(),
                },
                ..container::Style::default()
            }
        })
        .into()
}
