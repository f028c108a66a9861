use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::geometry::{Point, Rect};

/// Number of points in the 68-point landmark layout.
pub const LANDMARK_68_COUNT: usize = 68;

/// Points 0..=16 of the 68-point layout trace the jaw.
const JAW_OUTLINE_LEN: usize = 17;

/// One face found by a detection call.
///
/// Produced fresh by every call and never mutated afterwards. Coordinates
/// are in the source media's native pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Unique within one result set only.
    pub id: Uuid,
    pub bounding_box: Rect,
    pub score: f64,
    pub landmarks: Option<FaceLandmarks>,
    pub age: Option<f64>,
    pub gender: Option<GenderEstimate>,
    pub expressions: Option<Expressions>,
    /// L2-normalised recognition embedding.
    pub descriptor: Option<Vec<f32>>,
}

impl FaceDetection {
    pub fn new(bounding_box: Rect, score: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            bounding_box,
            score,
            landmarks: None,
            age: None,
            gender: None,
            expressions: None,
            descriptor: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub positions: Vec<Point>,
    pub jaw_outline: Vec<Point>,
}

impl FaceLandmarks {
    /// Builds landmarks and derives the jaw outline when the layout has one.
    pub fn from_positions(positions: Vec<Point>) -> Self {
        let jaw_outline = if positions.len() == LANDMARK_68_COUNT {
            positions[..JAW_OUTLINE_LEN].to_vec()
        } else {
            Vec::new()
        };
        Self {
            positions,
            jaw_outline,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenderEstimate {
    pub gender: Gender,
    /// Probability of `gender`, in [0, 1].
    pub probability: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Expression {
    pub const ALL: [Expression; 7] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Fearful,
        Expression::Disgusted,
        Expression::Surprised,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
            Expression::Surprised => "surprised",
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Probability per expression label, each clamped to [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expressions {
    pub neutral: f64,
    pub happy: f64,
    pub sad: f64,
    pub angry: f64,
    pub fearful: f64,
    pub disgusted: f64,
    pub surprised: f64,
}

impl Expressions {
    /// Builds from probabilities ordered as [`Expression::ALL`].
    pub fn from_probabilities(p: [f64; 7]) -> Self {
        let c = |v: f64| v.clamp(0.0, 1.0);
        Self {
            neutral: c(p[0]),
            happy: c(p[1]),
            sad: c(p[2]),
            angry: c(p[3]),
            fearful: c(p[4]),
            disgusted: c(p[5]),
            surprised: c(p[6]),
        }
    }

    pub fn get(&self, expression: Expression) -> f64 {
        match expression {
            Expression::Neutral => self.neutral,
            Expression::Happy => self.happy,
            Expression::Sad => self.sad,
            Expression::Angry => self.angry,
            Expression::Fearful => self.fearful,
            Expression::Disgusted => self.disgusted,
            Expression::Surprised => self.surprised,
        }
    }

    /// Labels with their probabilities, in [`Expression::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Expression, f64)> + '_ {
        Expression::ALL.iter().map(move |&e| (e, self.get(e)))
    }

    /// Most probable expression. Ties go to the earlier label; `None` when
    /// every probability is zero.
    pub fn dominant(&self) -> Option<(Expression, f64)> {
        self.iter().fold(None, |best, (e, p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ if p > 0.0 => Some((e, p)),
            _ => best,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: usize) -> Vec<Point> {
        (0..n).map(|i| Point::new(i as f64, i as f64 * 2.0)).collect()
    }

    #[test]
    fn test_jaw_outline_derived_for_68_points() {
        let landmarks = FaceLandmarks::from_positions(points(68));
        assert_eq!(landmarks.jaw_outline.len(), 17);
        assert_eq!(landmarks.jaw_outline[16], Point::new(16.0, 32.0));
    }

    #[test]
    fn test_jaw_outline_empty_for_other_layouts() {
        let landmarks = FaceLandmarks::from_positions(points(5));
        assert_eq!(landmarks.positions.len(), 5);
        assert!(landmarks.jaw_outline.is_empty());
    }

    #[test]
    fn test_new_detections_get_distinct_ids() {
        let a = FaceDetection::new(Rect::new(0.0, 0.0, 10.0, 10.0), 0.9);
        let b = FaceDetection::new(Rect::new(0.0, 0.0, 10.0, 10.0), 0.9);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_dominant_expression() {
        let e = Expressions::from_probabilities([0.1, 0.7, 0.05, 0.05, 0.05, 0.03, 0.02]);
        assert_eq!(e.dominant(), Some((Expression::Happy, 0.7)));
    }

    #[test]
    fn test_dominant_tie_prefers_first_label() {
        let e = Expressions::from_probabilities([0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(e.dominant().map(|(e, _)| e), Some(Expression::Neutral));
    }

    #[test]
    fn test_dominant_all_zero_is_none() {
        let e = Expressions::from_probabilities([0.0; 7]);
        assert!(e.dominant().is_none());
    }

    #[test]
    fn test_probabilities_are_clamped() {
        let e = Expressions::from_probabilities([1.5, -0.2, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(e.neutral, 1.0);
        assert_eq!(e.happy, 0.0);
    }

    #[test]
    fn test_expression_serializes_lowercase() {
        let json = serde_json::to_string(&Expression::Surprised).unwrap();
        assert_eq!(json, "\"surprised\"");
    }
}
