use iced::widget::{column, container, progress_bar, row, scrollable, text, Column, Space};
use iced::{Element, Length, Theme};

use facesight_core::detection::domain::face_detection::FaceDetection;
use facesight_core::state::app_state::AppState;

use crate::app::{scaled, Message};
use crate::panels::live_view::PANEL_HEIGHT;
use crate::theme::{muted_color, surface_color};

pub fn view<'a>(fs: f32, state: &'a AppState) -> Element<'a, Message> {
    let faces = &state.detection.faces;

    if !state.webcam.is_active {
        return placeholder(fs, "No Face Data", "Start the webcam to detect faces");
    }
    if faces.is_empty() {
        return placeholder(
            fs,
            "Looking for faces...",
            "Position yourself in front of the camera",
        );
    }

    let mut list = Column::new()
        .spacing(12)
        .push(text(format!("Detected Faces: {}", faces.len())).size(scaled(20.0, fs)));
    for face in faces {
        list = list.push(face_card(fs, face));
    }

    container(scrollable(list).height(Length::Fill))
        .width(Length::Fill)
        .height(PANEL_HEIGHT)
        .into()
}

fn placeholder<'a>(fs: f32, title: &'a str, detail: &'a str) -> Element<'a, Message> {
    card(
        column![
            text("\u{263A}").size(scaled(48.0, fs)).style(|theme: &Theme| text::Style {
                color: Some(muted_color(theme)),
            }),
            Space::new().height(12),
            text(title).size(scaled(18.0, fs)),
            Space::new().height(6),
            text(detail)
                .size(scaled(13.0, fs))
                .style(|theme: &Theme| text::Style {
                    color: Some(muted_color(theme)),
                }),
        ]
        .align_x(iced::Alignment::Center)
        .into(),
        PANEL_HEIGHT,
    )
}

fn face_card<'a>(fs: f32, face: &'a FaceDetection) -> Element<'a, Message> {
    let mut col = Column::new().spacing(8);

    if let (Some(gender), Some(age)) = (face.gender, face.age) {
        col = col.push(
            text(format!("{} \u{2022} {} years", gender.gender, age.round() as i64))
                .size(scaled(17.0, fs)),
        );
    }

    if let Some(expressions) = &face.expressions {
        col = col.push(text("Emotions:").size(scaled(14.0, fs)));
        let bars: Vec<Element<'a, Message>> = expressions
            .iter()
            .map(|(expression, value)| {
                column![
                    row![
                        text(capitalized(expression.label())).size(scaled(12.0, fs)),
                        Space::new().width(Length::Fill),
                        text(format!("{}%", (value * 100.0).round() as i64))
                            .size(scaled(12.0, fs)),
                    ],
                    progress_bar(0.0..=100.0, (value * 100.0) as f32),
                ]
                .spacing(2)
                .width(Length::Fill)
                .into()
            })
            .collect();
        let mut grid = Column::new().spacing(6);
        let mut bars = bars.into_iter();
        while let Some(left) = bars.next() {
            let right: Element<'a, Message> = match bars.next() {
                Some(right) => right,
                None => Space::new().width(Length::Fill).into(),
            };
            grid = grid.push(row![left, right].spacing(12));
        }
        col = col.push(grid);
    }

    let b = face.bounding_box;
    col = col.push(
        row![
            column![
                text("Position").size(scaled(14.0, fs)),
                text(format!("X: {}", b.x.round() as i64)).size(scaled(12.0, fs)),
                text(format!("Y: {}", b.y.round() as i64)).size(scaled(12.0, fs)),
            ]
            .width(Length::Fill),
            column![
                text("Size").size(scaled(14.0, fs)),
                text(format!("Width: {}px", b.width.round() as i64)).size(scaled(12.0, fs)),
                text(format!("Height: {}px", b.height.round() as i64)).size(scaled(12.0, fs)),
            ]
            .width(Length::Fill),
        ]
        .spacing(12),
    );

    card(col.into(), 0.0)
}

fn capitalized(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rounded surface around `content`; `height` of 0 shrinks to fit.
fn card<'a>(content: Element<'a, Message>, height: f32) -> Element<'a, Message> {
    let mut c = container(content)
        .width(Length::Fill)
        .padding(16)
        .style(|theme: &Theme| container::Style {
            background: Some(surface_color(theme).into()),
            border: iced::border::Border {
                radius: 12.0.into(),
                ..iced::border::Border::default()
            },
            ..container::Style::default()
        });
    if height > 0.0 {
        c = c.height(height).center_x(Length::Fill).center_y(height);
    }
    c.into()
}
