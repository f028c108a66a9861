//! Maps detections from native media pixels into the coordinate space of the
//! overlay container.
//!
//! The overlay covers a container; the media element is laid out somewhere
//! inside it, scaled uniformly from its natural resolution. Everything here is
//! pure and cheap, so callers recompute it on every layout pass.
use crate::detection::domain::face_detection::FaceDetection;
use crate::overlay::labels::{attribute_label, dominant_expression_label};
use crate::shared::geometry::{Point, Rect, Size};

/// Layout of the media being annotated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaGeometry {
    /// Intrinsic resolution of the frame or image.
    pub natural: Size,
    /// Where the media is drawn, in window coordinates.
    pub element: Rect,
    /// Where the overlay is drawn, in window coordinates.
    pub container: Rect,
}

impl MediaGeometry {
    /// Geometry for media shown "contain"-fitted inside `container`.
    pub fn contained(natural: Size, container: Rect) -> Self {
        Self {
            natural,
            element: fit_contain(natural, container),
            container,
        }
    }
}

/// Largest rect with the aspect ratio of `natural` that fits in `container`,
/// centered.
pub fn fit_contain(natural: Size, container: Rect) -> Rect {
    if natural.is_empty() || container.size().is_empty() {
        return Rect::new(container.x, container.y, 0.0, 0.0);
    }
    let scale = (container.width / natural.width).min(container.height / natural.height);
    let width = natural.width * scale;
    let height = natural.height * scale;
    Rect::new(
        container.x + (container.width - width) / 2.0,
        container.y + (container.height - height) / 2.0,
        width,
        height,
    )
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayTransform {
    pub scale: f64,
    pub offset: Point,
}

impl OverlayTransform {
    pub fn from_geometry(geometry: &MediaGeometry) -> Self {
        let scale = if geometry.natural.width > 0.0 {
            geometry.element.width / geometry.natural.width
        } else {
            0.0
        };
        Self {
            scale,
            offset: Point::new(
                geometry.element.x - geometry.container.x,
                geometry.element.y - geometry.container.y,
            ),
        }
    }

    pub fn point(&self, p: Point) -> Point {
        Point::new(
            p.x * self.scale + self.offset.x,
            p.y * self.scale + self.offset.y,
        )
    }

    pub fn rect(&self, r: Rect) -> Rect {
        Rect::new(
            r.x * self.scale + self.offset.x,
            r.y * self.scale + self.offset.y,
            r.width * self.scale,
            r.height * self.scale,
        )
    }
}

/// A detection ready to draw: coordinates relative to the overlay container.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenFace {
    pub bounding_box: Rect,
    pub landmarks: Vec<Point>,
    pub attribute_label: Option<String>,
    pub expression_label: Option<String>,
}

pub fn project_faces(faces: &[FaceDetection], geometry: &MediaGeometry) -> Vec<ScreenFace> {
    let transform = OverlayTransform::from_geometry(geometry);
    faces
        .iter()
        .map(|face| ScreenFace {
            bounding_box: transform.rect(face.bounding_box),
            landmarks: face
                .landmarks
                .as_ref()
                .map(|l| l.positions.iter().map(|&p| transform.point(p)).collect())
                .unwrap_or_default(),
            attribute_label: attribute_label(face),
            expression_label: dominant_expression_label(face),
        })
        .collect()
}
