//! Interpreting projections against a college's grading scale.

use serde::Serialize;

use crate::aggregator::{self, ComponentProjection, GradeGroup, GradedItem, ProjectionError};
use crate::models::{AssessmentComponent, AssessmentScore};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievability {
    AlreadyAchieved,
    Achievable,
    RequiresPerfect,
    NotAchievable,
    NoRemainingCapacity,
}

impl Achievability {
    pub fn describe(self) -> &'static str {
        match self {
            Achievability::AlreadyAchieved => "already achieved",
            Achievability::Achievable => "achievable",
            Achievability::RequiresPerfect => "achievable only with a perfect score",
            Achievability::NotAchievable => "not achievable",
            Achievability::NoRemainingCapacity => "nothing left to earn that could change this",
        }
    }
}

pub fn classify(required: f64, scale_max: f64) -> Achievability {
    if !required.is_finite() {
        Achievability::NotAchievable
    } else if required <= 0.0 {
        Achievability::AlreadyAchieved
    } else if (required - scale_max).abs() <= EPSILON {
        Achievability::RequiresPerfect
    } else if required > scale_max {
        Achievability::NotAchievable
    } else {
        Achievability::Achievable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalPlan {
    pub target: f64,
    pub current_cgpa: f64,
    pub completed_credits: f64,
    pub remaining_credits: f64,
    pub required_average: Option<f64>,
    pub achievability: Achievability,
}

pub fn plan_cgpa_goal(
    groups: &[GradeGroup],
    target: f64,
    remaining_credits: f64,
    scale_max: f64,
) -> GoalPlan {
    let completed: Vec<GradedItem> = groups
        .iter()
        .flat_map(|group| group.items.iter().copied())
        .collect();
    let current = aggregator::cumulative_cgpa(groups);

    let (required_average, achievability) =
        match aggregator::required_average_for_target(target, &completed, remaining_credits) {
            Ok(required) => (Some(required), classify(required, scale_max)),
            Err(ProjectionError::NoRemainingCapacity) => {
                (None, Achievability::NoRemainingCapacity)
            }
        };

    GoalPlan {
        target,
        current_cgpa: current.cgpa,
        completed_credits: current.total_credits,
        remaining_credits,
        required_average,
        achievability,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentPlan {
    pub target_percent: f64,
    pub projection: Option<ComponentProjection>,
    pub achievability: Achievability,
}

pub fn plan_component_goal(
    target_percent: f64,
    components: &[AssessmentComponent],
    scores: &[AssessmentScore],
) -> ComponentPlan {
    match aggregator::required_component_score(target_percent, components, scores) {
        Ok(projection) => {
            let achievability = classify(projection.required_percent_remaining, 100.0);
            ComponentPlan {
                target_percent,
                projection: Some(projection),
                achievability,
            }
        }
        Err(ProjectionError::NoRemainingCapacity) => ComponentPlan {
            target_percent,
            projection: None,
            achievability: Achievability::NoRemainingCapacity,
        },
    }
}
