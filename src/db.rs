use std::collections::HashMap;

use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::components::{self, ComponentSpec};
use crate::grading::{GradeLetter, GradeScale};
use crate::models::{
    AssessmentComponent, AssessmentScore, SemesterRecord, StudentProfile, SubjectRecord,
};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn upsert_college(pool: &PgPool, name: &str, scale: &GradeScale) -> anyhow::Result<Uuid> {
    let college_id: Uuid = sqlx::query(
        r#"
        INSERT INTO cgpa_tracker.colleges (id, name, scale_max)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET scale_max = EXCLUDED.scale_max
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(scale.max_point)
    .fetch_one(pool)
    .await?
    .get("id");

    for grade in scale.letters() {
        sqlx::query(
            r#"
            INSERT INTO cgpa_tracker.grade_letters (college_id, letter, points)
            VALUES ($1, $2, $3)
            ON CONFLICT (college_id, letter) DO UPDATE SET points = EXCLUDED.points
            "#,
        )
        .bind(college_id)
        .bind(&grade.letter)
        .bind(grade.points)
        .execute(pool)
        .await?;
    }

    Ok(college_id)
}

async fn upsert_user(
    pool: &PgPool,
    full_name: &str,
    email: &str,
    college_id: Uuid,
) -> anyhow::Result<Uuid> {
    let user_id = sqlx::query(
        r#"
        INSERT INTO cgpa_tracker.users (id, full_name, email, college_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name, college_id = EXCLUDED.college_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(email)
    .bind(college_id)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(user_id)
}

async fn upsert_semester(pool: &PgPool, user_id: Uuid, label: &str) -> anyhow::Result<Uuid> {
    let semester_id = sqlx::query(
        r#"
        INSERT INTO cgpa_tracker.semesters (id, user_id, label, position)
        VALUES (
            $1, $2, $3,
            COALESCE((SELECT MAX(position) FROM cgpa_tracker.semesters WHERE user_id = $2), 0) + 1
        )
        ON CONFLICT (user_id, label) DO UPDATE SET label = EXCLUDED.label
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(label)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(semester_id)
}

async fn insert_subject(
    pool: &PgPool,
    semester_id: Uuid,
    name: &str,
    credits: f64,
    grade: Option<(f64, Option<String>)>,
    source_key: &str,
) -> anyhow::Result<bool> {
    let (grade_point, grade_letter) = match grade {
        Some((point, letter)) => (Some(point), letter),
        None => (None, None),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO cgpa_tracker.subjects
        (id, semester_id, name, credits, grade_point, grade_letter, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(semester_id)
    .bind(name)
    .bind(credits)
    .bind(grade_point)
    .bind(grade_letter)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let scale = GradeScale::ten_point();
    let college_id = upsert_college(pool, "Riverside Institute of Technology", &scale).await?;
    upsert_college(pool, "Lakeshore State University", &GradeScale::four_point()).await?;

    let user_id = upsert_user(pool, "Avery Lee", "avery.lee@example.edu", college_id).await?;

    let subjects = vec![
        ("Semester 1", "Engineering Mathematics I", 4.0, Some("A")),
        ("Semester 1", "Engineering Physics", 3.0, Some("A+")),
        ("Semester 1", "Programming Fundamentals", 4.0, Some("O")),
        ("Semester 1", "Communication Skills", 2.0, Some("B+")),
        ("Semester 2", "Engineering Mathematics II", 4.0, Some("B+")),
        ("Semester 2", "Data Structures", 4.0, Some("A")),
        ("Semester 2", "Digital Logic", 3.0, Some("A+")),
        ("Semester 3", "Operating Systems", 4.0, Some("A")),
        ("Semester 3", "Database Systems", 4.0, None),
        ("Semester 3", "Discrete Mathematics", 3.0, None),
    ];

    for (index, (semester, subject, credits, letter)) in subjects.into_iter().enumerate() {
        let semester_id = upsert_semester(pool, user_id, semester).await?;
        let grade = match letter {
            Some(letter) => Some(scale.resolve(letter)?),
            None => None,
        };
        let source_key = format!("seed-{:03}", index + 1);
        insert_subject(pool, semester_id, subject, credits, grade, &source_key).await?;
    }

    let subject = find_subject(pool, user_id, "Semester 3", "Database Systems").await?;
    let existing = fetch_assessment(pool, subject.id).await?;
    if existing.0.is_empty() {
        let specs = vec![
            ComponentSpec {
                name: "Quizzes".to_string(),
                weight_percent: 15.0,
                max_score: 30.0,
            },
            ComponentSpec {
                name: "Midterm".to_string(),
                weight_percent: 35.0,
                max_score: 50.0,
            },
            ComponentSpec {
                name: "Final".to_string(),
                weight_percent: 50.0,
                max_score: 100.0,
            },
        ];
        replace_components(pool, subject.id, &specs).await?;
        record_score(pool, subject.id, "Quizzes", 24.0).await?;
        record_score(pool, subject.id, "Midterm", 41.0).await?;
    }

    tracing::info!(%user_id, "seed data ready");
    Ok(())
}

pub async fn fetch_profile(pool: &PgPool, email: &str) -> anyhow::Result<StudentProfile> {
    let row = sqlx::query(
        r#"
        SELECT u.id AS user_id, u.full_name, u.email, c.id AS college_id,
               c.name AS college_name, c.scale_max
        FROM cgpa_tracker.users u
        JOIN cgpa_tracker.colleges c ON c.id = u.college_id
        WHERE u.email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no student registered with email {email}"))?;

    Ok(StudentProfile {
        user_id: row.get("user_id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        college_id: row.get("college_id"),
        college_name: row.get("college_name"),
        scale_max: row.get("scale_max"),
    })
}

pub async fn fetch_grade_scale(pool: &PgPool, college_id: Uuid) -> anyhow::Result<GradeScale> {
    let scale_max: f64 = sqlx::query("SELECT scale_max FROM cgpa_tracker.colleges WHERE id = $1")
        .bind(college_id)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("college {college_id} not found"))?
        .get("scale_max");

    let rows = sqlx::query(
        "SELECT letter, points FROM cgpa_tracker.grade_letters WHERE college_id = $1",
    )
    .bind(college_id)
    .fetch_all(pool)
    .await?;

    let letters = rows
        .into_iter()
        .map(|row| GradeLetter {
            letter: row.get("letter"),
            points: row.get("points"),
        })
        .collect();

    Ok(GradeScale::new(scale_max, letters))
}

async fn fetch_college_by_name(pool: &PgPool, name: &str) -> anyhow::Result<(Uuid, GradeScale)> {
    let college_id: Uuid = sqlx::query("SELECT id FROM cgpa_tracker.colleges WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("college {name} is not registered"))?
        .get("id");

    let scale = fetch_grade_scale(pool, college_id).await?;
    Ok((college_id, scale))
}

pub async fn fetch_semesters(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<SemesterRecord>> {
    let semester_rows = sqlx::query(
        r#"
        SELECT id, label, position
        FROM cgpa_tracker.semesters
        WHERE user_id = $1
        ORDER BY position, label
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let subject_rows = sqlx::query(
        r#"
        SELECT sub.id, sub.semester_id, sub.name, sub.credits, sub.grade_point, sub.grade_letter
        FROM cgpa_tracker.subjects sub
        JOIN cgpa_tracker.semesters sem ON sem.id = sub.semester_id
        WHERE sem.user_id = $1
        ORDER BY sub.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut subjects: HashMap<Uuid, Vec<SubjectRecord>> = HashMap::new();
    for row in subject_rows {
        subjects
            .entry(row.get("semester_id"))
            .or_default()
            .push(SubjectRecord {
                id: row.get("id"),
                name: row.get("name"),
                credits: row.get("credits"),
                grade_point: row.get("grade_point"),
                grade_letter: row.get("grade_letter"),
            });
    }

    let semesters = semester_rows
        .into_iter()
        .map(|row| {
            let id: Uuid = row.get("id");
            SemesterRecord {
                id,
                label: row.get("label"),
                position: row.get("position"),
                subjects: subjects.remove(&id).unwrap_or_default(),
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(%user_id, semesters = semesters.len(), "loaded semesters");
    Ok(semesters)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        college: String,
        semester: String,
        subject: String,
        credits: f64,
        grade: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut colleges: HashMap<String, (Uuid, GradeScale)> = HashMap::new();
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        if row.credits <= 0.0 {
            anyhow::bail!("row {}: {} needs positive credits", line + 1, row.subject);
        }

        if !colleges.contains_key(&row.college) {
            let college = fetch_college_by_name(pool, &row.college).await?;
            colleges.insert(row.college.clone(), college);
        }
        let (college_id, scale) = &colleges[&row.college];

        let grade = match row.grade.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(
                scale
                    .resolve(raw)
                    .with_context(|| format!("row {}: {}", line + 1, row.subject))?,
            ),
            _ => None,
        };

        let user_id = upsert_user(pool, &row.full_name, &row.email, *college_id).await?;
        let semester_id = upsert_semester(pool, user_id, &row.semester).await?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_subject(pool, semester_id, &row.subject, row.credits, grade, &source_key).await? {
            inserted += 1;
        } else {
            tracing::debug!(%source_key, subject = %row.subject, "subject already present");
        }
    }

    tracing::info!(inserted, path = %csv_path.display(), "csv import finished");
    Ok(inserted)
}

pub async fn find_subject(
    pool: &PgPool,
    user_id: Uuid,
    semester: &str,
    subject: &str,
) -> anyhow::Result<SubjectRecord> {
    let row = sqlx::query(
        r#"
        SELECT sub.id, sub.name, sub.credits, sub.grade_point, sub.grade_letter
        FROM cgpa_tracker.subjects sub
        JOIN cgpa_tracker.semesters sem ON sem.id = sub.semester_id
        WHERE sem.user_id = $1 AND sem.label = $2 AND sub.name = $3
        "#,
    )
    .bind(user_id)
    .bind(semester)
    .bind(subject)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no subject {subject} in {semester}"))?;

    Ok(SubjectRecord {
        id: row.get("id"),
        name: row.get("name"),
        credits: row.get("credits"),
        grade_point: row.get("grade_point"),
        grade_letter: row.get("grade_letter"),
    })
}

pub async fn set_grade(
    pool: &PgPool,
    subject_id: Uuid,
    grade: Option<(f64, Option<String>)>,
) -> anyhow::Result<()> {
    let (grade_point, grade_letter) = match grade {
        Some((point, letter)) => (Some(point), letter),
        None => (None, None),
    };

    sqlx::query(
        "UPDATE cgpa_tracker.subjects SET grade_point = $2, grade_letter = $3 WHERE id = $1",
    )
    .bind(subject_id)
    .bind(grade_point)
    .bind(grade_letter)
    .execute(pool)
    .await?;

    tracing::info!(%subject_id, ?grade_point, "grade updated");
    Ok(())
}

/// Creates the semester on first use. Returns `false` when the subject
/// already exists in that semester.
pub async fn add_subject(
    pool: &PgPool,
    user_id: Uuid,
    semester: &str,
    subject: &str,
    credits: f64,
    grade: Option<(f64, Option<String>)>,
) -> anyhow::Result<bool> {
    let semester_id = upsert_semester(pool, user_id, semester).await?;
    let source_key = format!("manual-{}", Uuid::new_v4());
    let inserted = insert_subject(pool, semester_id, subject, credits, grade, &source_key).await?;

    tracing::info!(%user_id, %semester, %subject, inserted, "add subject");
    Ok(inserted)
}

pub async fn set_credits(pool: &PgPool, subject_id: Uuid, credits: f64) -> anyhow::Result<()> {
    if !credits.is_finite() || credits <= 0.0 {
        anyhow::bail!("credits must be a positive number, got {credits}");
    }

    sqlx::query("UPDATE cgpa_tracker.subjects SET credits = $2 WHERE id = $1")
        .bind(subject_id)
        .bind(credits)
        .execute(pool)
        .await?;

    tracing::info!(%subject_id, credits, "credits updated");
    Ok(())
}

pub async fn delete_semester(pool: &PgPool, user_id: Uuid, label: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM cgpa_tracker.semesters WHERE user_id = $1 AND label = $2")
        .bind(user_id)
        .bind(label)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_subject(
    pool: &PgPool,
    user_id: Uuid,
    semester: &str,
    subject: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM cgpa_tracker.subjects sub
        USING cgpa_tracker.semesters sem
        WHERE sem.id = sub.semester_id
          AND sem.user_id = $1 AND sem.label = $2 AND sub.name = $3
        "#,
    )
    .bind(user_id)
    .bind(semester)
    .bind(subject)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Validates the new set first, then swaps it in atomically. Existing
/// scores are dropped with the old components.
pub async fn replace_components(
    pool: &PgPool,
    subject_id: Uuid,
    specs: &[ComponentSpec],
) -> anyhow::Result<Vec<AssessmentComponent>> {
    let components: Vec<AssessmentComponent> = specs
        .iter()
        .map(|spec| AssessmentComponent {
            id: Uuid::new_v4(),
            name: spec.name.clone(),
            weight_percent: spec.weight_percent,
            max_score: spec.max_score,
        })
        .collect();

    components::validate_components(&components)?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM cgpa_tracker.assessment_components WHERE subject_id = $1")
        .bind(subject_id)
        .execute(&mut *tx)
        .await?;

    for component in &components {
        sqlx::query(
            r#"
            INSERT INTO cgpa_tracker.assessment_components
            (id, subject_id, name, weight_percent, max_score)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(component.id)
        .bind(subject_id)
        .bind(&component.name)
        .bind(component.weight_percent)
        .bind(component.max_score)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(%subject_id, count = components.len(), "assessment components replaced");
    Ok(components)
}

pub async fn fetch_assessment(
    pool: &PgPool,
    subject_id: Uuid,
) -> anyhow::Result<(Vec<AssessmentComponent>, Vec<AssessmentScore>)> {
    let rows = sqlx::query(
        r#"
        SELECT c.id, c.name, c.weight_percent, c.max_score, s.score_obtained
        FROM cgpa_tracker.assessment_components c
        LEFT JOIN cgpa_tracker.assessment_scores s ON s.component_id = c.id
        WHERE c.subject_id = $1
        ORDER BY c.name
        "#,
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    let mut components = Vec::new();
    let mut scores = Vec::new();

    for row in rows {
        let component = AssessmentComponent {
            id: row.get("id"),
            name: row.get("name"),
            weight_percent: row.get("weight_percent"),
            max_score: row.get("max_score"),
        };
        let score: Option<f64> = row.get("score_obtained");
        if let Some(score_obtained) = score {
            scores.push(AssessmentScore {
                component_id: component.id,
                score_obtained,
                max_score: component.max_score,
            });
        }
        components.push(component);
    }

    Ok((components, scores))
}

pub async fn record_score(
    pool: &PgPool,
    subject_id: Uuid,
    component_name: &str,
    score: f64,
) -> anyhow::Result<()> {
    let (components, _) = fetch_assessment(pool, subject_id).await?;
    let component = components
        .iter()
        .find(|component| component.name.eq_ignore_ascii_case(component_name.trim()))
        .with_context(|| format!("no assessment component named {component_name}"))?;

    components::validate_score(component, score)?;

    sqlx::query(
        r#"
        INSERT INTO cgpa_tracker.assessment_scores (component_id, score_obtained)
        VALUES ($1, $2)
        ON CONFLICT (component_id) DO UPDATE
        SET score_obtained = EXCLUDED.score_obtained, recorded_at = now()
        "#,
    )
    .bind(component.id)
    .bind(score)
    .execute(pool)
    .await?;

    tracing::info!(component = %component.name, score, "score recorded");
    Ok(())
}
