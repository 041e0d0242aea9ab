use serde::Serialize;

use crate::aggregator::{self, GradeGroup};
use crate::grading::GradeScale;
use crate::models::SemesterRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemesterTrend {
    pub label: String,
    pub sgpa: f64,
    pub credits: f64,
    /// Change from the previous graded semester.
    pub delta: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeCount {
    pub letter: String,
    pub count: usize,
}

pub fn sgpa_trend(groups: &[GradeGroup]) -> Vec<SemesterTrend> {
    let mut trend: Vec<SemesterTrend> = Vec::new();

    for group in groups {
        let summary = aggregator::semester_sgpa(group);
        if summary.graded_count == 0 {
            continue;
        }

        let delta = trend.last().map(|previous| summary.sgpa - previous.sgpa);
        trend.push(SemesterTrend {
            label: group.label.clone(),
            sgpa: summary.sgpa,
            credits: summary.total_credits,
            delta,
        });
    }

    trend
}

fn by_sgpa(a: &&SemesterTrend, b: &&SemesterTrend) -> std::cmp::Ordering {
    a.sgpa
        .partial_cmp(&b.sgpa)
        .unwrap_or(std::cmp::Ordering::Equal)
}

pub fn best_semester(trend: &[SemesterTrend]) -> Option<&SemesterTrend> {
    trend.iter().max_by(by_sgpa)
}

pub fn worst_semester(trend: &[SemesterTrend]) -> Option<&SemesterTrend> {
    trend.iter().min_by(by_sgpa)
}

/// Counts graded subjects per letter, in scale order. A stored letter wins
/// over one derived from the grade point.
pub fn grade_distribution(semesters: &[SemesterRecord], scale: &GradeScale) -> Vec<GradeCount> {
    let mut counts: Vec<GradeCount> = scale
        .letters()
        .iter()
        .map(|grade| GradeCount {
            letter: grade.letter.clone(),
            count: 0,
        })
        .collect();

    let subjects = semesters.iter().flat_map(|semester| &semester.subjects);
    for subject in subjects {
        let Some(point) = subject.grade_point else {
            continue;
        };

        let letter = subject
            .grade_letter
            .as_deref()
            .or_else(|| scale.letter_for(point));

        if let Some(letter) = letter {
            if let Some(entry) = counts
                .iter_mut()
                .find(|entry| entry.letter.eq_ignore_ascii_case(letter))
            {
                entry.count += 1;
            } else {
                counts.push(GradeCount {
                    letter: letter.to_string(),
                    count: 1,
                });
            }
        }
    }

    counts
}
