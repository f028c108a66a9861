use serde::{Deserialize, Serialize};

/// A 2D point. Whether it is in native or screen pixels depends on context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from corner coordinates `(x1, y1, x2, y2)`.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Clips the rectangle to `[0, max_width] x [0, max_height]`.
    pub fn clamp_to(&self, max_width: f64, max_height: f64) -> Rect {
        let x1 = self.x.clamp(0.0, max_width);
        let y1 = self.y.clamp(0.0, max_height);
        let x2 = (self.x + self.width).clamp(0.0, max_width);
        let y2 = (self.y + self.height).clamp(0.0, max_height);
        Rect::from_corners(x1, y1, x2, y2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_corners() {
        let r = Rect::from_corners(10.0, 20.0, 50.0, 80.0);
        assert_eq!(r, Rect::new(10.0, 20.0, 40.0, 60.0));
    }

    #[test]
    fn test_area_ignores_negative_extent() {
        assert_relative_eq!(Rect::new(0.0, 0.0, 4.0, 5.0).area(), 20.0);
        assert_relative_eq!(Rect::new(0.0, 0.0, -4.0, 5.0).area(), 0.0);
    }

    #[test]
    fn test_clamp_to_frame() {
        let r = Rect::new(-10.0, 5.0, 50.0, 200.0).clamp_to(100.0, 100.0);
        assert_eq!(r, Rect::new(0.0, 5.0, 40.0, 95.0));
    }

    #[test]
    fn test_empty_size() {
        assert!(Size::new(0.0, 10.0).is_empty());
        assert!(!Size::new(1.0, 1.0).is_empty());
    }
}
