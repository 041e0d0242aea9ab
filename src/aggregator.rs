//! Grade-point aggregation and target projection.
//!
//! Everything here is a pure function over its arguments. Results are never
//! rounded; display rounding lives in [`crate::report::format_points`].

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AssessmentComponent, AssessmentScore};

/// One subject: a credit weight and, once graded, a grade point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradedItem {
    pub credit_weight: f64,
    pub grade_point: Option<f64>,
}

impl GradedItem {
    pub fn graded(credit_weight: f64, grade_point: f64) -> Self {
        Self {
            credit_weight,
            grade_point: Some(grade_point),
        }
    }

    pub fn pending(credit_weight: f64) -> Self {
        Self {
            credit_weight,
            grade_point: None,
        }
    }
}

/// The subjects of one semester.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GradeGroup {
    pub label: String,
    pub items: Vec<GradedItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SemesterSummary {
    pub sgpa: f64,
    /// Credits of graded items only.
    pub total_credits: f64,
    pub graded_count: usize,
    pub total_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CumulativeSummary {
    pub cgpa: f64,
    pub total_credits: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentTarget {
    pub component_id: Uuid,
    pub name: String,
    pub required_percent: f64,
    pub recommended_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentProjection {
    /// Weighted percentage points already secured by scored components.
    pub earned_weighted: f64,
    pub remaining_weight: f64,
    pub required_percent_remaining: f64,
    pub per_component: Vec<ComponentTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// Nothing left to earn, so no requirement can be computed.
    #[error("no remaining credit or component weight can affect this target")]
    NoRemainingCapacity,
}

fn graded_totals<'a>(items: impl IntoIterator<Item = &'a GradedItem>) -> (f64, f64, usize) {
    let mut weighted = 0.0;
    let mut credits = 0.0;
    let mut count = 0usize;

    for item in items {
        if let Some(point) = item.grade_point {
            weighted += point * item.credit_weight;
            credits += item.credit_weight;
            count += 1;
        }
    }

    (weighted, credits, count)
}

fn average(weighted: f64, credits: f64) -> f64 {
    if credits > 0.0 {
        weighted / credits
    } else {
        0.0
    }
}

/// Credit-weighted mean of the graded items. Returns `0.0` when nothing is
/// graded; pair it with a graded count to tell that apart from a real zero.
pub fn weighted_average(items: &[GradedItem]) -> f64 {
    let (weighted, credits, _) = graded_totals(items);
    average(weighted, credits)
}

pub fn semester_sgpa(group: &GradeGroup) -> SemesterSummary {
    let (weighted, credits, graded_count) = graded_totals(&group.items);
    SemesterSummary {
        sgpa: average(weighted, credits),
        total_credits: credits,
        graded_count,
        total_count: group.items.len(),
    }
}

pub fn cumulative_cgpa(groups: &[GradeGroup]) -> CumulativeSummary {
    let (weighted, credits, _) = graded_totals(groups.iter().flat_map(|group| &group.items));
    CumulativeSummary {
        cgpa: average(weighted, credits),
        total_credits: credits,
    }
}

/// Average grade point needed over `remaining_credit_weight` to bring the
/// overall average to `target`.
///
/// The result is not clamped: a value above the scale maximum means the
/// target is out of reach, a negative value means it is already secured.
/// Classifying the number is left to the caller (see [`crate::goals`]).
pub fn required_average_for_target(
    target: f64,
    completed: &[GradedItem],
    remaining_credit_weight: f64,
) -> Result<f64, ProjectionError> {
    if remaining_credit_weight <= 0.0 {
        return Err(ProjectionError::NoRemainingCapacity);
    }

    let (earned, completed_weight, _) = graded_totals(completed);
    let total_weight = completed_weight + remaining_credit_weight;
    Ok((target * total_weight - earned) / remaining_credit_weight)
}

/// Percentage every pending component must reach for the subject to finish
/// at `target` percent overall.
///
/// All pending components are asked for the same percentage; there is no
/// attempt to shift load between them. The component weights are expected
/// to sum to 100, which [`crate::components::validate_components`] enforces
/// when the set is defined.
pub fn required_component_score(
    target: f64,
    components: &[AssessmentComponent],
    scores: &[AssessmentScore],
) -> Result<ComponentProjection, ProjectionError> {
    let mut earned_weighted = 0.0;
    let mut remaining_weight = 0.0;
    let mut pending = Vec::new();

    for component in components {
        let score = scores
            .iter()
            .find(|score| score.component_id == component.id);

        match score {
            Some(score) if score.max_score > 0.0 => {
                earned_weighted +=
                    score.score_obtained / score.max_score * component.weight_percent;
            }
            Some(_) => {}
            None => {
                remaining_weight += component.weight_percent;
                pending.push(component);
            }
        }
    }

    if remaining_weight <= 0.0 {
        return Err(ProjectionError::NoRemainingCapacity);
    }

    let required_percent = (target - earned_weighted) / remaining_weight * 100.0;
    let per_component = pending
        .into_iter()
        .map(|component| ComponentTarget {
            component_id: component.id,
            name: component.name.clone(),
            required_percent,
            recommended_score: required_percent / 100.0 * component.max_score,
        })
        .collect();

    Ok(ComponentProjection {
        earned_weighted,
        remaining_weight,
        required_percent_remaining: required_percent,
        per_component,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(label: &str, items: Vec<GradedItem>) -> GradeGroup {
        GradeGroup {
            label: label.to_string(),
            items,
        }
    }

    fn component(name: &str, weight_percent: f64, max_score: f64) -> AssessmentComponent {
        AssessmentComponent {
            id: Uuid::new_v4(),
            name: name.to_string(),
            weight_percent,
            max_score,
        }
    }

    fn scored(component: &AssessmentComponent, score_obtained: f64) -> AssessmentScore {
        AssessmentScore {
            component_id: component.id,
            score_obtained,
            max_score: component.max_score,
        }
    }

    #[test]
    fn weighted_average_uses_credits() {
        let items = vec![GradedItem::graded(4.0, 8.0), GradedItem::graded(3.0, 9.0)];
        let expected = (4.0 * 8.0 + 3.0 * 9.0) / 7.0;
        assert!((weighted_average(&items) - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_inputs_yield_zero() {
        assert_eq!(weighted_average(&[]), 0.0);

        let summary = semester_sgpa(&group("Sem 1", vec![GradedItem::pending(4.0)]));
        assert_eq!(summary.sgpa, 0.0);
        assert_eq!(summary.graded_count, 0);
        assert_eq!(summary.total_count, 1);
        assert!(!summary.sgpa.is_nan());

        let cumulative = cumulative_cgpa(&[]);
        assert_eq!(cumulative.cgpa, 0.0);
        assert_eq!(cumulative.total_credits, 0.0);
    }

    #[test]
    fn pending_items_are_excluded() {
        let summary = semester_sgpa(&group(
            "Sem 1",
            vec![GradedItem::graded(4.0, 8.0), GradedItem::pending(3.0)],
        ));
        assert_eq!(summary.sgpa, 8.0);
        assert_eq!(summary.total_credits, 4.0);
        assert_eq!(summary.graded_count, 1);
        assert_eq!(summary.total_count, 2);
    }

    #[test]
    fn cgpa_ignores_group_order() {
        let a = group(
            "Sem 1",
            vec![GradedItem::graded(4.0, 7.0), GradedItem::graded(2.0, 10.0)],
        );
        let b = group(
            "Sem 2",
            vec![GradedItem::graded(3.0, 6.0), GradedItem::pending(4.0)],
        );

        let forward = cumulative_cgpa(&[a.clone(), b.clone()]);
        let backward = cumulative_cgpa(&[b, a]);
        assert!((forward.cgpa - backward.cgpa).abs() < 1e-12);
        assert_eq!(forward.total_credits, backward.total_credits);
        assert_eq!(forward.total_credits, 9.0);
    }

    #[test]
    fn cgpa_weights_by_subject_not_by_semester() {
        let a = group("Sem 1", vec![GradedItem::graded(20.0, 8.0)]);
        let b = group("Sem 2", vec![GradedItem::graded(5.0, 10.0)]);
        let summary = cumulative_cgpa(&[a, b]);
        assert!((summary.cgpa - (160.0 + 50.0) / 25.0).abs() < 1e-12);
    }

    #[test]
    fn projection_at_scale_max() {
        let completed = vec![GradedItem::graded(20.0, 8.0)];
        let required = required_average_for_target(9.0, &completed, 20.0).unwrap();
        assert!((required - 10.0).abs() < 1e-12);
    }

    #[test]
    fn projection_above_scale_is_not_clamped() {
        let completed = vec![GradedItem::graded(20.0, 8.0)];
        let required = required_average_for_target(9.5, &completed, 20.0).unwrap();
        assert!((required - 11.0).abs() < 1e-12);
    }

    #[test]
    fn projection_can_be_negative() {
        let completed = vec![GradedItem::graded(40.0, 9.5)];
        let required = required_average_for_target(5.0, &completed, 4.0).unwrap();
        assert!(required < 0.0);
    }

    #[test]
    fn projection_without_remaining_weight_is_signalled() {
        let completed = vec![GradedItem::graded(20.0, 8.0)];
        assert_eq!(
            required_average_for_target(9.0, &completed, 0.0),
            Err(ProjectionError::NoRemainingCapacity)
        );
        assert_eq!(
            required_average_for_target(9.0, &completed, -3.0),
            Err(ProjectionError::NoRemainingCapacity)
        );
    }

    #[test]
    fn projection_skips_ungraded_completed_items() {
        let completed = vec![GradedItem::graded(20.0, 8.0), GradedItem::pending(10.0)];
        let required = required_average_for_target(9.0, &completed, 20.0).unwrap();
        assert!((required - 10.0).abs() < 1e-12);
    }

    #[test]
    fn component_projection_single_pending() {
        let a = component("Final", 50.0, 100.0);
        let b = component("Midterm", 50.0, 50.0);
        let scores = vec![scored(&b, 40.0)];

        let projection = required_component_score(85.0, &[a.clone(), b], &scores).unwrap();
        assert!((projection.earned_weighted - 40.0).abs() < 1e-12);
        assert_eq!(projection.remaining_weight, 50.0);
        assert!((projection.required_percent_remaining - 90.0).abs() < 1e-12);
        assert_eq!(projection.per_component.len(), 1);
        assert_eq!(projection.per_component[0].component_id, a.id);
        assert!((projection.per_component[0].recommended_score - 90.0).abs() < 1e-12);
    }

    #[test]
    fn component_projection_distributes_uniformly() {
        let done = component("Midterm", 40.0, 40.0);
        let quiz = component("Quiz", 10.0, 20.0);
        let lab = component("Lab", 20.0, 50.0);
        let exam = component("Final", 30.0, 100.0);
        let scores = vec![scored(&done, 30.0)];

        let components = vec![done, quiz, lab, exam];
        let projection = required_component_score(80.0, &components, &scores).unwrap();

        // 30/40 * 40 = 30 earned, 50 needed over 60 remaining weight.
        let expected = 50.0 / 60.0 * 100.0;
        assert!((projection.required_percent_remaining - expected).abs() < 1e-9);
        assert_eq!(projection.per_component.len(), 3);
        for target in &projection.per_component {
            assert!((target.required_percent - expected).abs() < 1e-9);
        }

        let lab_target = projection
            .per_component
            .iter()
            .find(|target| target.name == "Lab")
            .unwrap();
        assert!((lab_target.recommended_score - expected / 100.0 * 50.0).abs() < 1e-9);
    }

    #[test]
    fn component_projection_with_nothing_pending_is_signalled() {
        let a = component("Midterm", 50.0, 50.0);
        let b = component("Final", 50.0, 100.0);
        let scores = vec![scored(&a, 45.0), scored(&b, 70.0)];
        assert_eq!(
            required_component_score(80.0, &[a, b], &scores),
            Err(ProjectionError::NoRemainingCapacity)
        );
    }

    #[test]
    fn component_projection_ignores_foreign_scores() {
        let a = component("Final", 100.0, 100.0);
        let stray = AssessmentScore {
            component_id: Uuid::new_v4(),
            score_obtained: 10.0,
            max_score: 10.0,
        };
        let projection = required_component_score(70.0, &[a], &[stray]).unwrap();
        assert_eq!(projection.earned_weighted, 0.0);
        assert!((projection.required_percent_remaining - 70.0).abs() < 1e-12);
    }
}
