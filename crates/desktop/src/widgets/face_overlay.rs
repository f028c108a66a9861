use iced::mouse;
use iced::widget::canvas::{self, Frame, Path, Stroke, Text};
use iced::widget::{canvas as canvas_widget, container, image, stack};
use iced::{Color, ContentFit, Element, Length, Pixels, Point, Rectangle, Renderer, Size, Theme};

use facesight_core::detection::domain::face_detection::FaceDetection;
use facesight_core::overlay::overlay_geometry::{project_faces, MediaGeometry, ScreenFace};
use facesight_core::shared::geometry;

use crate::theme::{landmark_color, overlay_color};

const BOX_WIDTH: f32 = 2.0;
const LANDMARK_RADIUS: f32 = 1.5;
const LABEL_SIZE: f32 = 12.0;
const LABEL_LINE_HEIGHT: f32 = 16.0;
const LABEL_PADDING: f32 = 4.0;
const LABEL_MIN_WIDTH: f32 = 120.0;

/// Draws face boxes, landmarks and labels over media shown "contain"-fitted
/// in the same bounds.
struct FaceOverlay<'a> {
    faces: &'a [FaceDetection],
    natural: geometry::Size,
}

impl<Message> canvas::Program<Message> for FaceOverlay<'_> {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let container = geometry::Rect::new(0.0, 0.0, bounds.width as f64, bounds.height as f64);
        let media = MediaGeometry::contained(self.natural, container);

        for face in project_faces(self.faces, &media) {
            draw_face(&mut frame, &face, theme);
        }
        vec![frame.into_geometry()]
    }
}

fn draw_face(frame: &mut Frame, face: &ScreenFace, theme: &Theme) {
    let accent = overlay_color(theme);
    let b = face.bounding_box;
    frame.stroke(
        &Path::rectangle(
            Point::new(b.x as f32, b.y as f32),
            Size::new(b.width as f32, b.height as f32),
        ),
        Stroke::default().with_color(accent).with_width(BOX_WIDTH),
    );

    let dot = landmark_color(theme);
    for p in &face.landmarks {
        frame.fill(
            &Path::circle(Point::new(p.x as f32, p.y as f32), LANDMARK_RADIUS),
            dot,
        );
    }

    let lines: Vec<&str> = [&face.attribute_label, &face.expression_label]
        .into_iter()
        .filter_map(|l| l.as_deref())
        .collect();
    if lines.is_empty() {
        return;
    }
    let origin = label_origin(&face.bounding_box, lines.len());
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let width = (longest as f32 * LABEL_SIZE * 0.6 + LABEL_PADDING * 2.0).max(LABEL_MIN_WIDTH);
    let height = lines.len() as f32 * LABEL_LINE_HEIGHT + LABEL_PADDING;
    frame.fill_rectangle(origin, Size::new(width, height), accent);

    for (i, line) in lines.iter().enumerate() {
        frame.fill_text(Text {
            content: (*line).to_string(),
            position: Point::new(
                origin.x + LABEL_PADDING,
                origin.y + LABEL_PADDING / 2.0 + i as f32 * LABEL_LINE_HEIGHT,
            ),
            color: Color::WHITE,
            size: Pixels(LABEL_SIZE),
            ..Text::default()
        });
    }
}

/// Top-left corner of a label block of `lines` lines sitting above `bbox`,
/// pushed inside the overlay when the box touches the top edge.
fn label_origin(bbox: &geometry::Rect, lines: usize) -> Point {
    let height = lines as f32 * LABEL_LINE_HEIGHT + LABEL_PADDING;
    Point::new(
        (bbox.x as f32).max(0.0),
        (bbox.y as f32 - height).max(0.0),
    )
}

/// Media image with the face overlay stacked on top.
pub fn media_with_overlay<'a, Message: 'a>(
    handle: image::Handle,
    natural: geometry::Size,
    faces: &'a [FaceDetection],
    height: f32,
) -> Element<'a, Message> {
    let picture = image(handle)
        .content_fit(ContentFit::Contain)
        .width(Length::Fill)
        .height(Length::Fill);
    let overlay = canvas_widget(FaceOverlay { faces, natural })
        .width(Length::Fill)
        .height(Length::Fill);

    container(stack![picture, overlay])
        .width(Length::Fill)
        .height(height)
        .style(|_theme: &Theme| container::Style {
            background: Some(Color::from_rgb(0.07, 0.07, 0.09).into()),
            ..container::Style::default()
        })
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_sits_above_box() {
        let origin = label_origin(&geometry::Rect::new(50.0, 100.0, 40.0, 40.0), 2);
        assert_eq!(origin, Point::new(50.0, 100.0 - (2.0 * LABEL_LINE_HEIGHT + LABEL_PADDING)));
    }

    #[test]
    fn test_label_stays_inside_top_edge() {
        let origin = label_origin(&geometry::Rect::new(-5.0, 3.0, 40.0, 40.0), 1);
        assert_eq!(origin, Point::new(0.0, 0.0));
    }
}
