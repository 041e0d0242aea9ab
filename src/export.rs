use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::aggregator::{self, GradeGroup};
use crate::models::SemesterRecord;
use crate::report::format_points;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    semester: &'a str,
    subject: &'a str,
    credits: f64,
    grade_letter: Option<&'a str>,
    grade_point: Option<f64>,
    semester_sgpa: String,
}

pub fn write_rows<W: Write>(writer: W, semesters: &[SemesterRecord]) -> anyhow::Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut written = 0usize;

    for semester in semesters {
        let summary = aggregator::semester_sgpa(&GradeGroup::from(semester));
        let semester_sgpa = if summary.graded_count == 0 {
            String::new()
        } else {
            format_points(summary.sgpa)
        };

        for subject in &semester.subjects {
            csv_writer.serialize(ExportRow {
                semester: &semester.label,
                subject: &subject.name,
                credits: subject.credits,
                grade_letter: subject.grade_letter.as_deref(),
                grade_point: subject.grade_point,
                semester_sgpa: semester_sgpa.clone(),
            })?;
            written += 1;
        }
    }

    csv_writer.flush()?;
    Ok(written)
}

pub fn write_csv(path: &Path, semesters: &[SemesterRecord]) -> anyhow::Result<usize> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_rows(file, semesters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubjectRecord;
    use uuid::Uuid;

    fn semesters() -> Vec<SemesterRecord> {
        vec![SemesterRecord {
            id: Uuid::new_v4(),
            label: "Sem 1".to_string(),
            position: 1,
            subjects: vec![
                SubjectRecord {
                    id: Uuid::new_v4(),
                    name: "Physics".to_string(),
                    credits: 4.0,
                    grade_point: Some(8.0),
                    grade_letter: Some("A".to_string()),
                },
                SubjectRecord {
                    id: Uuid::new_v4(),
                    name: "Maths".to_string(),
                    credits: 3.0,
                    grade_point: None,
                    grade_letter: None,
                },
            ],
        }]
    }

    #[test]
    fn writes_one_row_per_subject() {
        let mut buffer = Vec::new();
        let written = write_rows(&mut buffer, &semesters()).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "semester,subject,credits,grade_letter,grade_point,semester_sgpa"
        );
        assert_eq!(lines[1], "Sem 1,Physics,4.0,A,8.0,8.00");
        assert_eq!(lines[2], "Sem 1,Maths,3.0,,,8.00");
    }

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grades.csv");
        let written = write_csv(&path, &semesters()).unwrap();
        assert_eq!(written, 2);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 2);
    }
}
