use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradeError {
    #[error("grade `{0}` is not defined for this college")]
    UnknownLetter(String),
    #[error("grade point {point} is outside 0 to {max_point}")]
    OutOfScale { point: f64, max_point: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeLetter {
    pub letter: String,
    pub points: f64,
}

/// A college's grading table. Letters are kept sorted by points, highest
/// first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeScale {
    pub max_point: f64,
    letters: Vec<GradeLetter>,
}

impl GradeScale {
    pub fn new(max_point: f64, letters: Vec<GradeLetter>) -> Self {
        let mut letters = letters;
        letters.sort_by(|a, b| {
            b.points
                .partial_cmp(&a.points)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self { max_point, letters }
    }

    pub fn ten_point() -> Self {
        Self::from_pairs(
            10.0,
            &[
                ("O", 10.0),
                ("A+", 9.0),
                ("A", 8.0),
                ("B+", 7.0),
                ("B", 6.0),
                ("C", 5.0),
                ("P", 4.0),
                ("F", 0.0),
            ],
        )
    }

    pub fn four_point() -> Self {
        Self::from_pairs(
            4.0,
            &[
                ("A", 4.0),
                ("A-", 3.7),
                ("B+", 3.3),
                ("B", 3.0),
                ("B-", 2.7),
                ("C+", 2.3),
                ("C", 2.0),
                ("D", 1.0),
                ("F", 0.0),
            ],
        )
    }

    fn from_pairs(max_point: f64, pairs: &[(&str, f64)]) -> Self {
        Self::new(
            max_point,
            pairs
                .iter()
                .map(|(letter, points)| GradeLetter {
                    letter: letter.to_string(),
                    points: *points,
                })
                .collect(),
        )
    }

    pub fn letters(&self) -> &[GradeLetter] {
        &self.letters
    }

    pub fn point_for(&self, letter: &str) -> Result<f64, GradeError> {
        let wanted = letter.trim();
        self.letters
            .iter()
            .find(|grade| grade.letter.eq_ignore_ascii_case(wanted))
            .map(|grade| grade.points)
            .ok_or_else(|| GradeError::UnknownLetter(wanted.to_string()))
    }

    /// Accepts either a numeric grade point or a letter from this scale and
    /// returns the point plus the letter to store, if one was given.
    pub fn resolve(&self, raw: &str) -> Result<(f64, Option<String>), GradeError> {
        let raw = raw.trim();
        if let Ok(point) = raw.parse::<f64>() {
            if !(0.0..=self.max_point).contains(&point) {
                return Err(GradeError::OutOfScale {
                    point,
                    max_point: self.max_point,
                });
            }
            return Ok((point, None));
        }

        let point = self.point_for(raw)?;
        let letter = self
            .letters
            .iter()
            .find(|grade| grade.letter.eq_ignore_ascii_case(raw))
            .map(|grade| grade.letter.clone());
        Ok((point, letter))
    }

    /// Highest letter whose points do not exceed `point`.
    pub fn letter_for(&self, point: f64) -> Option<&str> {
        self.letters
            .iter()
            .find(|grade| grade.points <= point)
            .map(|grade| grade.letter.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_points_case_insensitively() {
        let scale = GradeScale::ten_point();
        assert_eq!(scale.point_for("a+"), Ok(9.0));
        assert_eq!(scale.point_for(" O "), Ok(10.0));
        assert_eq!(
            scale.point_for("Z"),
            Err(GradeError::UnknownLetter("Z".to_string()))
        );
    }

    #[test]
    fn maps_points_back_to_letters() {
        let scale = GradeScale::four_point();
        assert_eq!(scale.letter_for(4.0), Some("A"));
        assert_eq!(scale.letter_for(3.5), Some("B+"));
        assert_eq!(scale.letter_for(0.0), Some("F"));
        assert_eq!(scale.letter_for(-1.0), None);
    }

    #[test]
    fn resolves_numbers_and_letters() {
        let scale = GradeScale::ten_point();
        assert_eq!(scale.resolve("8.5"), Ok((8.5, None)));
        assert_eq!(scale.resolve("a+"), Ok((9.0, Some("A+".to_string()))));
        assert!(matches!(
            scale.resolve("11"),
            Err(GradeError::OutOfScale { .. })
        ));
        assert!(matches!(scale.resolve("Q"), Err(GradeError::UnknownLetter(_))));
    }

    #[test]
    fn keeps_letters_sorted_by_points() {
        let scale = GradeScale::new(
            10.0,
            vec![
                GradeLetter {
                    letter: "F".to_string(),
                    points: 0.0,
                },
                GradeLetter {
                    letter: "O".to_string(),
                    points: 10.0,
                },
            ],
        );
        assert_eq!(scale.letters()[0].letter, "O");
        assert_eq!(scale.max_point, 10.0);
    }
}
