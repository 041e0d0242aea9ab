use serde::Serialize;
use uuid::Uuid;

use crate::aggregator::{GradeGroup, GradedItem};

#[derive(Debug, Clone, Serialize)]
pub struct StudentProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub college_id: Uuid,
    pub college_name: String,
    pub scale_max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectRecord {
    pub id: Uuid,
    pub name: String,
    pub credits: f64,
    pub grade_point: Option<f64>,
    pub grade_letter: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SemesterRecord {
    pub id: Uuid,
    pub label: String,
    pub position: i32,
    pub subjects: Vec<SubjectRecord>,
}

impl SubjectRecord {
    pub fn graded_item(&self) -> GradedItem {
        match self.grade_point {
            Some(point) => GradedItem::graded(self.credits, point),
            None => GradedItem::pending(self.credits),
        }
    }
}

impl From<&SemesterRecord> for GradeGroup {
    fn from(semester: &SemesterRecord) -> Self {
        GradeGroup {
            label: semester.label.clone(),
            items: semester.subjects.iter().map(SubjectRecord::graded_item).collect(),
        }
    }
}

pub fn grade_groups(semesters: &[SemesterRecord]) -> Vec<GradeGroup> {
    semesters.iter().map(GradeGroup::from).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentComponent {
    pub id: Uuid,
    pub name: String,
    pub weight_percent: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentScore {
    pub component_id: Uuid,
    pub score_obtained: f64,
    pub max_score: f64,
}
