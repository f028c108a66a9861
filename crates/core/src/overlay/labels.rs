use crate::detection::domain::face_detection::{Expression, FaceDetection};

fn percent(probability: f64) -> i64 {
    (probability * 100.0).round() as i64
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Gender and age line, e.g. `male (93%), 28 years`. `None` when neither
/// attribute was estimated.
pub fn attribute_label(face: &FaceDetection) -> Option<String> {
    let gender = face
        .gender
        .map(|g| format!("{} ({}%)", g.gender, percent(g.probability)));
    let age = face.age.map(|a| format!("{} years", a.round() as i64));
    match (gender, age) {
        (Some(g), Some(a)) => Some(format!("{g}, {a}")),
        (Some(g), None) => Some(g),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

/// One expression with its probability, e.g. `Happy (87%)`.
pub fn expression_label(expression: Expression, probability: f64) -> String {
    format!("{} ({}%)", capitalize(expression.label()), percent(probability))
}

/// Label for the most probable expression of `face`.
pub fn dominant_expression_label(face: &FaceDetection) -> Option<String> {
    let (expression, probability) = face.expressions?.dominant()?;
    Some(expression_label(expression, probability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detection::{Expressions, Gender, GenderEstimate};
    use crate::shared::geometry::Rect;
    use rstest::rstest;

    fn face() -> FaceDetection {
        FaceDetection::new(Rect::new(0.0, 0.0, 10.0, 10.0), 0.9)
    }

    #[test]
    fn test_attribute_label_full() {
        let mut f = face();
        f.gender = Some(GenderEstimate {
            gender: Gender::Male,
            probability: 0.934,
        });
        f.age = Some(28.0);
        assert_eq!(attribute_label(&f).as_deref(), Some("male (93%), 28 years"));
    }

    #[test]
    fn test_attribute_label_partial() {
        let mut f = face();
        assert_eq!(attribute_label(&f), None);
        f.age = Some(41.4);
        assert_eq!(attribute_label(&f).as_deref(), Some("41 years"));
        f.age = None;
        f.gender = Some(GenderEstimate {
            gender: Gender::Female,
            probability: 0.5,
        });
        assert_eq!(attribute_label(&f).as_deref(), Some("female (50%)"));
    }

    #[rstest]
    #[case(Expression::Happy, 0.87, "Happy (87%)")]
    #[case(Expression::Neutral, 1.0, "Neutral (100%)")]
    #[case(Expression::Surprised, 0.004, "Surprised (0%)")]
    fn test_expression_label(#[case] e: Expression, #[case] p: f64, #[case] expected: &str) {
        assert_eq!(expression_label(e, p), expected);
    }

    #[test]
    fn test_dominant_expression_label() {
        let mut f = face();
        assert_eq!(dominant_expression_label(&f), None);
        f.expressions = Some(Expressions::from_probabilities([
            0.05, 0.87, 0.02, 0.01, 0.01, 0.01, 0.03,
        ]));
        assert_eq!(dominant_expression_label(&f).as_deref(), Some("Happy (87%)"));
    }
}
