use std::collections::HashSet;

use thiserror::Error;

use crate::models::AssessmentComponent;

pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComponentError {
    #[error("a subject needs at least one assessment component")]
    Empty,
    #[error("component {name} has weight {weight}, expected 0 to 100")]
    WeightOutOfRange { name: String, weight: f64 },
    #[error("component {name} needs a positive max score, got {max_score}")]
    NonPositiveMaxScore { name: String, max_score: f64 },
    #[error("component {0} is defined more than once")]
    DuplicateName(String),
    #[error("component weights sum to {total:.2}, expected 100")]
    WeightSum { total: f64 },
    #[error("score {score} for {name} is outside 0 to {max_score}")]
    ScoreOutOfRange {
        name: String,
        score: f64,
        max_score: f64,
    },
    #[error("malformed component `{0}`, expected name:weight:max")]
    Malformed(String),
}

/// Checks a component set before it is stored. Weights must sum to 100
/// within [`WEIGHT_SUM_TOLERANCE`]; nothing is rescaled.
pub fn validate_components(components: &[AssessmentComponent]) -> Result<(), ComponentError> {
    if components.is_empty() {
        return Err(ComponentError::Empty);
    }

    let mut seen = HashSet::new();
    let mut total = 0.0;

    for component in components {
        if !(0.0..=100.0).contains(&component.weight_percent) {
            return Err(ComponentError::WeightOutOfRange {
                name: component.name.clone(),
                weight: component.weight_percent,
            });
        }
        if !(component.max_score.is_finite() && component.max_score > 0.0) {
            return Err(ComponentError::NonPositiveMaxScore {
                name: component.name.clone(),
                max_score: component.max_score,
            });
        }
        if !seen.insert(component.name.trim().to_lowercase()) {
            return Err(ComponentError::DuplicateName(component.name.clone()));
        }
        total += component.weight_percent;
    }

    if (total - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ComponentError::WeightSum { total });
    }

    Ok(())
}

pub fn validate_score(component: &AssessmentComponent, score: f64) -> Result<(), ComponentError> {
    if !(0.0..=component.max_score).contains(&score) {
        return Err(ComponentError::ScoreOutOfRange {
            name: component.name.clone(),
            score,
            max_score: component.max_score,
        });
    }
    Ok(())
}

/// Parsed form of a `name:weight:max` command-line argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    pub name: String,
    pub weight_percent: f64,
    pub max_score: f64,
}

pub fn parse_component_spec(raw: &str) -> Result<ComponentSpec, ComponentError> {
    let malformed = || ComponentError::Malformed(raw.to_string());
    let mut parts = raw.rsplitn(3, ':');

    let number = |value: &str| value.trim().parse::<f64>().ok().filter(|v| v.is_finite());
    let max_score = parts.next().and_then(number);
    let weight = parts.next().and_then(number);
    let name = parts.next().map(str::trim).filter(|name| !name.is_empty());

    match (name, weight, max_score) {
        (Some(name), Some(weight_percent), Some(max_score)) => Ok(ComponentSpec {
            name: name.to_string(),
            weight_percent,
            max_score,
        }),
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn component(name: &str, weight_percent: f64, max_score: f64) -> AssessmentComponent {
        AssessmentComponent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            weight_percent,
            max_score,
        }
    }

    #[test]
    fn accepts_weights_summing_to_hundred() {
        let components = vec![
            component("Quiz", 33.33, 10.0),
            component("Midterm", 33.33, 50.0),
            component("Final", 33.34, 100.0),
        ];
        assert_eq!(validate_components(&components), Ok(()));
    }

    #[test]
    fn tolerates_small_rounding_drift() {
        let components = vec![component("Midterm", 49.995, 50.0), component("Final", 50.0, 100.0)];
        assert_eq!(validate_components(&components), Ok(()));
    }

    #[test]
    fn rejects_wrong_weight_sum() {
        let components = vec![component("Midterm", 40.0, 50.0), component("Final", 50.0, 100.0)];
        match validate_components(&components) {
            Err(ComponentError::WeightSum { total }) => assert!((total - 90.0).abs() < 1e-9),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_components() {
        assert_eq!(validate_components(&[]), Err(ComponentError::Empty));
        assert!(matches!(
            validate_components(&[component("Final", 120.0, 100.0)]),
            Err(ComponentError::WeightOutOfRange { .. })
        ));
        assert!(matches!(
            validate_components(&[component("Final", 100.0, 0.0)]),
            Err(ComponentError::NonPositiveMaxScore { .. })
        ));
        assert!(matches!(
            validate_components(&[component("Final", 100.0, f64::NAN)]),
            Err(ComponentError::NonPositiveMaxScore { .. })
        ));
        assert_eq!(
            validate_components(&[component("Final", 50.0, 10.0), component("final ", 50.0, 10.0)]),
            Err(ComponentError::DuplicateName("final ".to_string()))
        );
    }

    #[test]
    fn score_must_fit_component() {
        let midterm = component("Midterm", 50.0, 50.0);
        assert_eq!(validate_score(&midterm, 50.0), Ok(()));
        assert_eq!(validate_score(&midterm, 0.0), Ok(()));
        assert!(validate_score(&midterm, 51.0).is_err());
        assert!(validate_score(&midterm, -1.0).is_err());
    }

    #[test]
    fn parses_component_arguments() {
        assert_eq!(
            parse_component_spec("Lab: Part 1:20:50"),
            Ok(ComponentSpec {
                name: "Lab: Part 1".to_string(),
                weight_percent: 20.0,
                max_score: 50.0,
            })
        );
        assert!(parse_component_spec("Final:abc:100").is_err());
        assert!(parse_component_spec(":50:100").is_err());
        assert!(parse_component_spec("Final").is_err());
        assert!(parse_component_spec("Final:NaN:100").is_err());
        assert!(parse_component_spec("Final:100:inf").is_err());
    }
}
