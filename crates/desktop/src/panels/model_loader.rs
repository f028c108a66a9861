use iced::widget::{button, column, container, progress_bar, text, Space};
use iced::{Element, Length, Theme};

use facesight_core::state::app_state::ModelsState;

use crate::app::{scaled, Message};
use crate::theme::muted_color;

/// Full-window screen shown until the models are loaded.
pub fn view<'a>(fs: f32, models: &ModelsState, download: (u64, u64)) -> Element<'a, Message> {
    let content = match &models.error {
        Some(error) => column![
            text("\u{26A0}").size(scaled(48.0, fs)).style(text::danger),
            Space::new().height(12),
            text("Model Loading Error")
                .size(scaled(20.0, fs))
                .style(text::danger),
            Space::new().height(8),
            text(error.clone()).size(scaled(14.0, fs)),
            Space::new().height(20),
            button(text("Retry").size(scaled(14.0, fs)))
                .on_press(Message::RetryModels)
                .padding([10, 24]),
        ],
        None => {
            let mut col = column![
                text("Loading Face Recognition Models").size(scaled(20.0, fs)),
                Space::new().height(8),
                text(
                    "Please wait while the face detection models load. This may take a moment..."
                )
                .size(scaled(14.0, fs))
                .style(|theme: &Theme| text::Style {
                    color: Some(muted_color(theme)),
                }),
            ];
            let (downloaded, total) = download;
            if total > 0 {
                let pct = downloaded as f32 / total as f32 * 100.0;
                col = col
                    .push(Space::new().height(16))
                    .push(progress_bar(0.0..=100.0, pct))
                    .push(text(format!("Downloading models... {pct:.0}%")).size(scaled(12.0, fs)));
            }
            col
        }
    };

    container(content.align_x(iced::Alignment::Center).max_width(420))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}
