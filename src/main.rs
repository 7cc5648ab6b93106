use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

mod config;
mod db;
mod deadlines;
mod error;
mod gpa;
mod grades;
mod lifecycle;
mod models;
mod report;
mod store;

use config::Config;
use db::PgStore;
use error::AcademicError;
use models::{AcademicStats, CgpaMethod, Season, Semester, SemesterSubmission};

#[derive(Parser)]
#[command(name = "academic-stats")]
#[command(about = "Semester GPA and CGPA tracking for the student hub", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where a semester's courses come from.
#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["csv", "json"])
        .required(true)
        .multiple(false)
))]
struct CourseSource {
    /// CSV with course_code,course_name,credit_hours,grade columns
    #[arg(long, requires_all = ["semester", "year"])]
    csv: Option<PathBuf>,
    /// JSON body with semester, year and courses
    #[arg(long)]
    json: Option<PathBuf>,
    #[arg(long, value_enum)]
    semester: Option<Season>,
    #[arg(long)]
    year: Option<i32>,
}

impl CourseSource {
    fn load(&self) -> anyhow::Result<SemesterSubmission> {
        if let Some(path) = &self.json {
            return db::read_submission_json(path);
        }
        let path = self.csv.as_deref().context("either --csv or --json is required")?;
        Ok(SemesterSubmission {
            semester: self.semester.context("--semester is required with --csv")?,
            year: self.year.context("--year is required with --csv")?,
            courses: db::read_courses_csv(path)?,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo students and semesters
    Seed,
    /// Register a student or update their details
    AddStudent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        program: String,
    },
    /// Record a new semester and recompute the student's stats
    Submit {
        #[arg(long)]
        email: String,
        #[command(flatten)]
        source: CourseSource,
        #[arg(long, value_enum)]
        method: Option<CgpaMethod>,
    },
    /// Replace the courses of a recorded semester
    Update {
        #[arg(long)]
        id: Uuid,
        #[command(flatten)]
        source: CourseSource,
        #[arg(long, value_enum)]
        method: Option<CgpaMethod>,
    },
    /// Delete a semester and recompute the student's stats
    Delete {
        #[arg(long)]
        id: Uuid,
        #[arg(long, value_enum)]
        method: Option<CgpaMethod>,
    },
    /// Show a student's academic stats
    Stats {
        #[arg(long)]
        email: String,
        /// Print the stats record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompute stats for one student or everyone
    #[command(group(
        ArgGroup::new("scope")
            .args(["email", "all"])
            .required(true)
            .multiple(false)
    ))]
    Recalculate {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        all: bool,
        #[arg(long, value_enum)]
        method: Option<CgpaMethod>,
    },
    /// Generate a markdown transcript
    Report {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "transcript.md")]
        out: PathBuf,
    },
    /// Show countdowns for coursework deadlines
    Deadlines {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn print_semester(semester: &Semester) {
    println!(
        "{} ({}): GPA {:.2} over {} credits, {} courses",
        semester.label(),
        semester.id,
        semester.semester_gpa,
        semester.total_credits,
        semester.courses.len()
    );
}

fn print_stats(stats: &AcademicStats) {
    println!(
        "CGPA {:.2} over {} credits across {} semesters (current semester {:.2}, {} method)",
        stats.cumulative_cgpa,
        stats.total_credits,
        stats.total_semesters,
        stats.current_semester_gpa,
        stats.method
    );
}

fn print_deadlines(csv: &Path, limit: usize) -> anyhow::Result<()> {
    let deadlines = deadlines::load_csv(csv)?;
    let schedule = deadlines::schedule(&deadlines, Utc::now());

    if schedule.is_empty() {
        println!("No deadlines found in {}.", csv.display());
        return Ok(());
    }

    for (deadline, countdown) in schedule.iter().take(limit) {
        println!(
            "- [{}] {} ({}) due {}: {}",
            countdown.urgency,
            deadline.title,
            deadline.course_code,
            deadline.due_at.format("%Y-%m-%d %H:%M"),
            countdown
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Deadlines { csv, limit } = &cli.command {
        return print_deadlines(csv, *limit);
    }

    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let semesters = db::seed(&pool).await?;
            for (email, submission) in semesters {
                match lifecycle::submit_semester(&store, email, submission, config.cgpa_method)
                    .await
                {
                    Ok(_) | Err(AcademicError::DuplicateSemester { .. }) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            println!("Seed data inserted.");
        }
        Commands::AddStudent {
            name,
            email,
            program,
        } => {
            let id = db::upsert_student(&pool, &name, &email, &program).await?;
            println!("Student {email} registered as {id}.");
        }
        Commands::Submit {
            email,
            source,
            method,
        } => {
            let submission = source.load()?;
            let (semester, stats) = lifecycle::submit_semester(
                &store,
                &email,
                submission,
                method.unwrap_or(config.cgpa_method),
            )
            .await?;
            print_semester(&semester);
            print_stats(&stats);
        }
        Commands::Update { id, source, method } => {
            let submission = source.load()?;
            let (semester, stats) = lifecycle::update_semester(
                &store,
                id,
                submission,
                method.unwrap_or(config.cgpa_method),
            )
            .await?;
            print_semester(&semester);
            print_stats(&stats);
        }
        Commands::Delete { id, method } => {
            let stats =
                lifecycle::delete_semester(&store, id, method.unwrap_or(config.cgpa_method))
                    .await?;
            println!("Semester {id} deleted.");
            print_stats(&stats);
        }
        Commands::Stats { email, json } => {
            let view = lifecycle::stats(&store, &email).await?;

            if json {
                if view.freshness == models::Freshness::Stale {
                    warn!(student = %view.student.email, "stats are stale");
                }
                let stats = lifecycle::published_stats(&view, config.cgpa_method)?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }

            println!("{} ({})", view.student.full_name, view.student.email);
            match &view.stats {
                Some(stats) => print_stats(stats),
                None => println!("No stats recorded yet."),
            }
            if view.freshness == models::Freshness::Stale {
                warn!(student = %view.student.email, "stats are stale");
                println!("Stats are stale; run recalculate.");
            }
            for semester in gpa::chronological(&view.semesters) {
                print_semester(semester);
            }
        }
        Commands::Recalculate { email, all, method } => {
            let method = method.unwrap_or(config.cgpa_method);
            if all {
                let summary = lifecycle::recalculate_all(&store, method).await?;
                println!(
                    "Recalculated {} students ({} failed).",
                    summary.recalculated, summary.failed
                );
            } else if let Some(email) = email {
                let stats = lifecycle::recalculate_student(&store, &email, method).await?;
                print_stats(&stats);
            }
        }
        Commands::Report { email, out } => {
            let view = lifecycle::stats(&store, &email).await?;
            let report = report::build_transcript(&view)?;
            std::fs::write(&out, report)?;
            println!("Transcript written to {}.", out.display());
        }
        Commands::Deadlines { csv, limit } => print_deadlines(&csv, limit)?,
    }

    Ok(())
}
