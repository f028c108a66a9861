use iced::widget::{button, container, row, text};
use iced::{Element, Length};

use facesight_core::state::app_state::{WebcamPhase, WebcamState};

use crate::app::{scaled, Message};

pub fn view<'a>(fs: f32, webcam: &WebcamState) -> Element<'a, Message> {
    let phase = webcam.phase();
    let label = match phase {
        WebcamPhase::Loading => "Starting...",
        WebcamPhase::Active => "Stop Webcam",
        WebcamPhase::Idle | WebcamPhase::Failed => "Start Webcam",
    };

    let mut toggle = button(
        container(text(label).size(scaled(16.0, fs)))
            .width(Length::Fill)
            .center_x(Length::Fill),
    )
    .padding([12, 24])
    .width(Length::Fill);
    if phase != WebcamPhase::Loading {
        toggle = toggle.on_press(Message::ToggleWebcam);
    }
    if phase == WebcamPhase::Active {
        toggle = toggle.style(button::danger);
    }

    row![toggle].width(Length::Fill).into()
}
