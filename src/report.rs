use std::fmt::Write;

use chrono::NaiveDate;

use crate::aggregator;
use crate::analytics;
use crate::grading::GradeScale;
use crate::models::{self, SemesterRecord, StudentProfile};

/// Display rounding shared by every printed or exported grade value.
pub fn format_points(value: f64) -> String {
    format!("{value:.2}")
}

pub fn build_report(
    profile: &StudentProfile,
    semesters: &[SemesterRecord],
    scale: &GradeScale,
    generated_on: NaiveDate,
) -> String {
    let groups = models::grade_groups(semesters);
    let cumulative = aggregator::cumulative_cgpa(&groups);
    let trend = analytics::sgpa_trend(&groups);
    let distribution = analytics::grade_distribution(semesters, scale);

    let mut output = String::new();

    let _ = writeln!(output, "# CGPA Progress Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}, {}) on {}",
        profile.full_name, profile.email, profile.college_name, generated_on
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if trend.is_empty() {
        let _ = writeln!(output, "No graded subjects yet.");
    } else {
        let _ = writeln!(
            output,
            "- CGPA {} / {} across {} graded credits",
            format_points(cumulative.cgpa),
            format_points(scale.max_point),
            format_points(cumulative.total_credits)
        );
        if let Some(best) = analytics::best_semester(&trend) {
            let _ = writeln!(
                output,
                "- Best semester: {} (SGPA {})",
                best.label,
                format_points(best.sgpa)
            );
        }
        if let Some(worst) = analytics::worst_semester(&trend) {
            let _ = writeln!(
                output,
                "- Lowest semester: {} (SGPA {})",
                worst.label,
                format_points(worst.sgpa)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Semesters");

    if groups.is_empty() {
        let _ = writeln!(output, "No semesters recorded.");
    } else {
        let _ = writeln!(output, "| Semester | SGPA | Graded credits | Subjects graded |");
        let _ = writeln!(output, "|---|---|---|---|");
        for group in &groups {
            let summary = aggregator::semester_sgpa(group);
            let sgpa = if summary.graded_count == 0 {
                "-".to_string()
            } else {
                format_points(summary.sgpa)
            };
            let _ = writeln!(
                output,
                "| {} | {} | {} | {}/{} |",
                group.label,
                sgpa,
                format_points(summary.total_credits),
                summary.graded_count,
                summary.total_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## SGPA Trend");

    if trend.is_empty() {
        let _ = writeln!(output, "Not enough graded semesters for a trend.");
    } else {
        for point in &trend {
            match point.delta {
                Some(delta) => {
                    let _ = writeln!(
                        output,
                        "- {}: {} ({}{})",
                        point.label,
                        format_points(point.sgpa),
                        if delta >= 0.0 { "+" } else { "" },
                        format_points(delta)
                    );
                }
                None => {
                    let _ = writeln!(output, "- {}: {}", point.label, format_points(point.sgpa));
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grade Distribution");

    let graded: Vec<_> = distribution.iter().filter(|entry| entry.count > 0).collect();
    if graded.is_empty() {
        let _ = writeln!(output, "No graded subjects yet.");
    } else {
        for entry in graded {
            let _ = writeln!(output, "- {}: {}", entry.letter, entry.count);
        }
    }

    output
}
