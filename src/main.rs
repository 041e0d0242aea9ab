use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;

mod aggregator;
mod analytics;
mod components;
mod db;
mod export;
mod goals;
mod grading;
mod models;
mod report;

use report::format_points;

#[derive(Parser)]
#[command(name = "cgpa-tracker")]
#[command(about = "Track semesters, grades and CGPA goals", long_about = None)]
struct Cli {
    /// Log debug output (overridden by CGPA_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Size of the Postgres connection pool
    #[arg(long, global = true, default_value_t = 5)]
    max_connections: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample college, student and semesters
    Seed,
    /// Import subjects from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show SGPA per semester and the overall CGPA
    Summary {
        #[arg(long)]
        email: String,
        #[arg(long)]
        json: bool,
    },
    /// Set or clear the grade of a subject
    #[command(group(
        ArgGroup::new("value")
            .args(["grade", "clear"])
            .required(true)
            .multiple(false)
    ))]
    Grade {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        subject: String,
        /// Letter grade or numeric grade point
        #[arg(long)]
        grade: Option<String>,
        #[arg(long)]
        clear: bool,
    },
    /// Add a subject, creating the semester if needed
    AddSubject {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        subject: String,
        #[arg(long, value_parser = parse_credits)]
        credits: f64,
        /// Letter grade or numeric grade point; omit for a pending subject
        #[arg(long)]
        grade: Option<String>,
    },
    /// Change the credit weight of a subject
    Credits {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        subject: String,
        #[arg(long, value_parser = parse_credits)]
        credits: f64,
    },
    /// Delete a semester and all of its subjects
    DeleteSemester {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: String,
    },
    /// Delete a single subject
    DeleteSubject {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        subject: String,
    },
    /// Average grade point needed over the remaining credits to reach a CGPA
    Goal {
        #[arg(long)]
        email: String,
        #[arg(long, value_parser = parse_finite)]
        target: f64,
        #[arg(long, value_parser = parse_finite)]
        remaining_credits: f64,
        #[arg(long)]
        json: bool,
    },
    /// Define the assessment components of a subject
    Components {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        subject: String,
        /// Component as name:weight:max, repeat for each component
        #[arg(long = "component", required = true, value_parser = parse_component)]
        components: Vec<components::ComponentSpec>,
    },
    /// Record the score obtained in one assessment component
    Score {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        component: String,
        #[arg(long, value_parser = parse_finite)]
        value: f64,
    },
    /// Percentage needed on pending components to finish a subject at a target
    Predict {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: String,
        #[arg(long)]
        subject: String,
        /// Overall target percentage for the subject
        #[arg(long, value_parser = parse_finite)]
        target: f64,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown progress report
    Report {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export subjects and semester SGPA as CSV
    Export {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "grades.csv")]
        out: PathBuf,
    },
}

fn parse_component(raw: &str) -> Result<components::ComponentSpec, String> {
    components::parse_component_spec(raw).map_err(|error| error.to_string())
}

fn parse_finite(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if !value.is_finite() {
        return Err(format!("`{raw}` must be a finite number"));
    }
    Ok(value)
}

fn parse_credits(raw: &str) -> Result<f64, String> {
    let credits = parse_finite(raw)?;
    if credits <= 0.0 {
        return Err(format!("credits must be positive, got {raw}"));
    }
    Ok(credits)
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("CGPA_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    profile: &'a models::StudentProfile,
    semesters: Vec<SemesterOutput>,
    cumulative: aggregator::CumulativeSummary,
}

#[derive(Serialize)]
struct SemesterOutput {
    label: String,
    #[serde(flatten)]
    summary: aggregator::SemesterSummary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    tracing::debug!(max_connections = cli.max_connections, "connected to Postgres");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} subjects from {}.", csv.display());
        }
        Commands::Summary { email, json } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let semesters = db::fetch_semesters(&pool, profile.user_id).await?;
            let groups = models::grade_groups(&semesters);
            let cumulative = aggregator::cumulative_cgpa(&groups);

            if json {
                let semesters = groups
                    .iter()
                    .map(|group| SemesterOutput {
                        label: group.label.clone(),
                        summary: aggregator::semester_sgpa(group),
                    })
                    .collect();
                return print_json(&SummaryOutput {
                    profile: &profile,
                    semesters,
                    cumulative,
                });
            }

            println!("{} ({}, {})", profile.full_name, profile.email, profile.college_name);
            if groups.is_empty() {
                println!("No semesters recorded yet.");
                return Ok(());
            }

            for group in &groups {
                let summary = aggregator::semester_sgpa(group);
                if summary.graded_count == 0 {
                    println!(
                        "- {}: no grades yet ({} subjects pending)",
                        group.label, summary.total_count
                    );
                } else {
                    println!(
                        "- {}: SGPA {} over {} credits ({}/{} graded)",
                        group.label,
                        format_points(summary.sgpa),
                        format_points(summary.total_credits),
                        summary.graded_count,
                        summary.total_count
                    );
                }
            }
            if cumulative.total_credits > 0.0 {
                println!(
                    "CGPA {} / {} over {} credits",
                    format_points(cumulative.cgpa),
                    format_points(profile.scale_max),
                    format_points(cumulative.total_credits)
                );
            } else {
                println!("CGPA not available until a subject is graded.");
            }
        }
        Commands::Grade {
            email,
            semester,
            subject,
            grade,
            clear: _,
        } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let record = db::find_subject(&pool, profile.user_id, &semester, &subject).await?;
            let resolved = match grade {
                Some(raw) => {
                    let scale = db::fetch_grade_scale(&pool, profile.college_id).await?;
                    Some(scale.resolve(&raw)?)
                }
                None => None,
            };
            let point = resolved.as_ref().map(|(point, _)| *point);
            db::set_grade(&pool, record.id, resolved).await?;
            match point {
                Some(point) => println!("{subject} graded at {}.", format_points(point)),
                None => println!("{subject} marked as pending."),
            }
        }
        Commands::AddSubject {
            email,
            semester,
            subject,
            credits,
            grade,
        } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let resolved = match grade {
                Some(raw) => {
                    let scale = db::fetch_grade_scale(&pool, profile.college_id).await?;
                    Some(scale.resolve(&raw)?)
                }
                None => None,
            };
            let state = if resolved.is_some() { "graded" } else { "pending" };
            let inserted =
                db::add_subject(&pool, profile.user_id, &semester, &subject, credits, resolved)
                    .await?;
            if inserted {
                println!(
                    "Added {subject} ({} credits, {state}) to {semester}.",
                    format_points(credits)
                );
            } else {
                println!("{subject} already exists in {semester}.");
            }
        }
        Commands::Credits {
            email,
            semester,
            subject,
            credits,
        } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let record = db::find_subject(&pool, profile.user_id, &semester, &subject).await?;
            db::set_credits(&pool, record.id, credits).await?;
            println!("{subject} now carries {} credits.", format_points(credits));
        }
        Commands::DeleteSemester { email, semester } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            if db::delete_semester(&pool, profile.user_id, &semester).await? {
                println!("Deleted {semester} and its subjects.");
            } else {
                println!("No semester named {semester}.");
            }
        }
        Commands::DeleteSubject {
            email,
            semester,
            subject,
        } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            if db::delete_subject(&pool, profile.user_id, &semester, &subject).await? {
                println!("Deleted {subject} from {semester}.");
            } else {
                println!("No subject {subject} in {semester}.");
            }
        }
        Commands::Goal {
            email,
            target,
            remaining_credits,
            json,
        } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let semesters = db::fetch_semesters(&pool, profile.user_id).await?;
            let groups = models::grade_groups(&semesters);
            let plan = goals::plan_cgpa_goal(&groups, target, remaining_credits, profile.scale_max);

            if json {
                return print_json(&plan);
            }

            println!(
                "Current CGPA {} over {} credits, target {}.",
                format_points(plan.current_cgpa),
                format_points(plan.completed_credits),
                format_points(plan.target)
            );
            match plan.required_average {
                Some(required) => println!(
                    "Need an average of {} over the remaining {} credits: {}.",
                    format_points(required),
                    format_points(plan.remaining_credits),
                    plan.achievability.describe()
                ),
                None => println!("Target {}.", plan.achievability.describe()),
            }
        }
        Commands::Components {
            email,
            semester,
            subject,
            components,
        } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let record = db::find_subject(&pool, profile.user_id, &semester, &subject).await?;
            let stored = db::replace_components(&pool, record.id, &components).await?;
            println!("Defined {} components for {subject}.", stored.len());
        }
        Commands::Score {
            email,
            semester,
            subject,
            component,
            value,
        } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let record = db::find_subject(&pool, profile.user_id, &semester, &subject).await?;
            db::record_score(&pool, record.id, &component, value).await?;
            println!("Recorded {value} for {component} in {subject}.");
        }
        Commands::Predict {
            email,
            semester,
            subject,
            target,
            json,
        } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let record = db::find_subject(&pool, profile.user_id, &semester, &subject).await?;
            let (components, scores) = db::fetch_assessment(&pool, record.id).await?;
            if components.is_empty() {
                anyhow::bail!("{subject} has no assessment components defined");
            }
            let plan = goals::plan_component_goal(target, &components, &scores);

            if json {
                return print_json(&plan);
            }

            match &plan.projection {
                Some(projection) => {
                    println!(
                        "Secured {}% so far; need {}% on the remaining {}% weight: {}.",
                        format_points(projection.earned_weighted),
                        format_points(projection.required_percent_remaining),
                        format_points(projection.remaining_weight),
                        plan.achievability.describe()
                    );
                    for target in &projection.per_component {
                        println!(
                            "- {}: aim for {} ({}%)",
                            target.name,
                            format_points(target.recommended_score),
                            format_points(target.required_percent)
                        );
                    }
                }
                None => println!("All components are scored; {}.", plan.achievability.describe()),
            }
        }
        Commands::Report { email, out } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let semesters = db::fetch_semesters(&pool, profile.user_id).await?;
            let scale = db::fetch_grade_scale(&pool, profile.college_id).await?;
            let report = report::build_report(
                &profile,
                &semesters,
                &scale,
                chrono::Utc::now().date_naive(),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { email, out } => {
            let profile = db::fetch_profile(&pool, &email).await?;
            let semesters = db::fetch_semesters(&pool, profile.user_id).await?;
            let written = export::write_csv(&out, &semesters)?;
            println!("Exported {written} subjects to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_parser_rejects_nan_and_infinity() {
        assert_eq!(parse_finite("8.5"), Ok(8.5));
        assert_eq!(parse_finite(" -2 "), Ok(-2.0));
        assert!(parse_finite("NaN").is_err());
        assert!(parse_finite("inf").is_err());
        assert!(parse_finite("-infinity").is_err());
        assert!(parse_finite("nine").is_err());
    }

    #[test]
    fn credits_must_be_positive() {
        assert_eq!(parse_credits("4"), Ok(4.0));
        assert!(parse_credits("0").is_err());
        assert!(parse_credits("-3").is_err());
        assert!(parse_credits("inf").is_err());
    }

    #[test]
    fn goal_rejects_non_finite_arguments() {
        let parsed = Cli::try_parse_from([
            "cgpa-tracker",
            "goal",
            "--email",
            "avery.lee@example.edu",
            "--target",
            "NaN",
            "--remaining-credits",
            "20",
        ]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from([
            "cgpa-tracker",
            "goal",
            "--email",
            "avery.lee@example.edu",
            "--target",
            "9",
            "--remaining-credits",
            "inf",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn score_and_predict_reject_non_finite_values() {
        let score = Cli::try_parse_from([
            "cgpa-tracker",
            "score",
            "--email",
            "avery.lee@example.edu",
            "--semester",
            "Semester 3",
            "--subject",
            "Database Systems",
            "--component",
            "Final",
            "--value",
            "NaN",
        ]);
        assert!(score.is_err());

        let predict = Cli::try_parse_from([
            "cgpa-tracker",
            "predict",
            "--email",
            "avery.lee@example.edu",
            "--semester",
            "Semester 3",
            "--subject",
            "Database Systems",
            "--target",
            "inf",
        ]);
        assert!(predict.is_err());
    }

    #[test]
    fn add_subject_accepts_pending_subjects() {
        let cli = Cli::try_parse_from([
            "cgpa-tracker",
            "add-subject",
            "--email",
            "avery.lee@example.edu",
            "--semester",
            "Semester 4",
            "--subject",
            "Compilers",
            "--credits",
            "4",
        ])
        .unwrap();

        match cli.command {
            Commands::AddSubject {
                subject,
                credits,
                grade,
                ..
            } => {
                assert_eq!(subject, "Compilers");
                assert_eq!(credits, 4.0);
                assert_eq!(grade, None);
            }
            _ => panic!("expected add-subject"),
        }

        let zero_credits = Cli::try_parse_from([
            "cgpa-tracker",
            "add-subject",
            "--email",
            "avery.lee@example.edu",
            "--semester",
            "Semester 4",
            "--subject",
            "Compilers",
            "--credits",
            "0",
        ]);
        assert!(zero_credits.is_err());
    }

    #[test]
    fn credits_command_parses() {
        let cli = Cli::try_parse_from([
            "cgpa-tracker",
            "credits",
            "--email",
            "avery.lee@example.edu",
            "--semester",
            "Semester 1",
            "--subject",
            "Engineering Physics",
            "--credits",
            "3.5",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Credits { credits, .. } if credits == 3.5));
    }
}
