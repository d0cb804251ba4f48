use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cache;
mod config;
mod db;
mod entry;
mod error;
mod identity;
mod models;
mod normalize;
mod query;
mod recovery;
mod report;
mod schema;
mod session;
mod sheet;
mod table;
mod upsert;
mod window;

use crate::config::GradebookConfig;
use crate::db::PgSheet;
use crate::entry::{EntryRequest, NOTHING_ENTERED};
use crate::error::GradebookError;
use crate::models::EvaluationType;
use crate::query::{QueryOutcome, QueryRequest};
use crate::schema::columns;
use crate::session::GradebookSession;

#[derive(Parser)]
#[command(name = "gradebook")]
#[command(about = "Grade lookup and entry over a shared grade sheet", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SheetKind {
    Grades,
    Windows,
}

#[derive(Args)]
struct TeacherArgs {
    #[arg(long)]
    teacher_name: String,
    #[arg(long)]
    teacher_registration: String,
}

#[derive(Args)]
struct EntryArgs {
    #[command(flatten)]
    teacher: TeacherArgs,
    #[arg(long)]
    class: String,
    #[arg(long)]
    subject: String,
    #[arg(long)]
    period: String,
    #[arg(long, value_parser = parse_evaluation)]
    evaluation: EvaluationType,
    /// Overrides today's date (dd/mm/yyyy) for the release window check
    #[arg(long, value_parser = parse_today)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo workbook
    Seed,
    /// Import rows from a CSV file into a worksheet
    Import {
        #[arg(long, value_enum)]
        sheet: SheetKind,
        #[arg(long)]
        csv: PathBuf,
    },
    /// List release windows
    Windows,
    /// List classes
    Classes,
    /// List the students of a class
    Students {
        #[arg(long)]
        class: String,
    },
    /// List the periods available to a student
    Periods {
        #[arg(long)]
        class: String,
        #[arg(long)]
        name: String,
    },
    /// Show a student's report card for one period
    Query {
        #[arg(long)]
        class: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        registration: String,
        #[arg(long)]
        period: String,
        /// Write the matching grade rows as CSV
        #[arg(long)]
        export: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// List the classes and subjects a teacher grades
    Scope {
        #[command(flatten)]
        teacher: TeacherArgs,
    },
    /// Show the roster with current grades for one entry
    Roster {
        #[command(flatten)]
        entry: EntryArgs,
    },
    /// Enter grades for one class, subject, period and evaluation
    Enter {
        #[command(flatten)]
        entry: EntryArgs,
        /// REGISTRATION=SCORE, repeatable
        #[arg(long = "score", value_parser = parse_score_pair)]
        scores: Vec<(String, String)>,
        /// CSV file with `Matrícula` and `Nota` columns
        #[arg(long = "scores")]
        scores_csv: Option<PathBuf>,
        /// Replace grades that already exist
        #[arg(long)]
        overwrite: bool,
    },
}

fn parse_evaluation(value: &str) -> Result<EvaluationType, String> {
    value.parse().map_err(|e: GradebookError| e.to_string())
}

fn parse_today(value: &str) -> Result<NaiveDate, String> {
    window::parse_date(value).map_err(|e| e.to_string())
}

fn parse_score_pair(value: &str) -> Result<(String, String), String> {
    value
        .split_once('=')
        .map(|(registration, score)| (registration.trim().to_string(), score.to_string()))
        .filter(|(registration, _)| !registration.is_empty())
        .ok_or_else(|| format!("expected REGISTRATION=SCORE, got {value:?}"))
}

fn init_tracing(config: &GradebookConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.filter.as_str()));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<GradebookError>() {
            Some(domain) if domain.is_recoverable() => {
                eprintln!("{domain}");
                ExitCode::from(2)
            }
            _ => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = GradebookConfig::load(cli.config.as_deref())?;
    init_tracing(&config);

    let database_url = config.database_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.store.max_connections)
        .connect(database_url)
        .await
        .map_err(|e| GradebookError::Auth(e.to_string()))
        .context("failed to connect to Postgres")?;

    let grades = PgSheet::new(pool.clone(), config.workbook.grades_sheet.as_str());
    let windows = PgSheet::new(pool.clone(), config.workbook.windows_sheet.as_str());

    match &cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
            return Ok(());
        }
        Commands::Seed => {
            db::seed(&grades, &windows).await?;
            println!("Seed data inserted.");
            return Ok(());
        }
        Commands::Import { sheet, csv } => {
            let (target, required): (&PgSheet, &[&str]) = match sheet {
                SheetKind::Grades => (&grades, &columns::QUERY[..]),
                SheetKind::Windows => (&windows, &columns::RELEASE_WINDOW[..]),
            };
            let imported = db::import_csv(target, csv, required).await?;
            println!("Imported {imported} rows from {}.", csv.display());
            return Ok(());
        }
        _ => {}
    }

    let mut session = GradebookSession::new(
        Arc::new(grades),
        Arc::new(windows),
        config.cache.ttl(),
    );

    match cli.command {
        Commands::Windows => {
            let windows = session.release_windows().await?;
            if windows.is_empty() {
                println!("No release windows configured.");
            }
            for window in windows {
                println!(
                    "- {}: {} to {}",
                    window.period, window.start_date, window.end_date
                );
            }
        }
        Commands::Classes => {
            let table = session.grade_table(&columns::QUERY).await?;
            for class in table.classes() {
                println!("{class}");
            }
        }
        Commands::Students { class } => {
            let table = session.grade_table(&columns::QUERY).await?;
            for student in table.students_in_class(&class) {
                println!("{}", student.name);
            }
        }
        Commands::Periods { class, name } => {
            let table = session.grade_table(&columns::QUERY).await?;
            for period in query::selectable_periods(&table, &class, &name) {
                println!("{period}");
            }
        }
        Commands::Query {
            class,
            name,
            registration,
            period,
            export,
            json,
        } => {
            let table = session.grade_table(&columns::QUERY).await?;
            let request = QueryRequest {
                class_label: class,
                student_name: name,
                registration_id: registration,
                period,
            };
            let outcome = query::consult(&table, &request)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
            match outcome {
                QueryOutcome::NoGrades => {
                    if !json {
                        println!("No grades recorded for this period.");
                    }
                }
                QueryOutcome::Bulletin(bulletin) => {
                    if !json {
                        print!("{}", report::render_bulletin(&bulletin));
                    }
                    if let Some(path) = export {
                        std::fs::write(&path, report::export_csv(&bulletin.records)?)
                            .with_context(|| format!("failed to write {}", path.display()))?;
                        eprintln!("Report card written to {}.", path.display());
                    }
                }
            }
        }
        Commands::Scope { teacher } => {
            let table = session.grade_table(&columns::ENTRY).await?;
            let identity = identity::authenticate_teacher(
                &teacher.teacher_name,
                &teacher.teacher_registration,
                &table,
            )?;
            for (class, subjects) in entry::teacher_scope(&table, &identity)? {
                println!("{class}: {}", subjects.join(", "));
            }
        }
        Commands::Roster { entry: args } => {
            let (identity, request, today) = entry_setup(&mut session, &args).await?;
            let roster = entry::open_roster(&mut session, &identity, &request, today).await?;
            for line in roster {
                println!(
                    "{} ({}) {:.2}",
                    line.student.name, line.student.registration_id, line.existing_score
                );
            }
        }
        Commands::Enter {
            entry: args,
            scores,
            scores_csv,
            overwrite,
        } => {
            let (identity, request, today) = entry_setup(&mut session, &args).await?;
            let mut pairs = scores;
            if let Some(path) = scores_csv {
                pairs.extend(read_score_csv(&path)?);
            }
            let scores: HashMap<String, f64> = pairs
                .into_iter()
                .map(|(registration, raw)| (registration, normalize::normalize_grade(Some(&raw))))
                .collect();

            let report =
                entry::submit(&mut session, &identity, &request, &scores, overwrite, today)
                    .await?;

            if report.appended > 0 {
                println!("{} grades entered.", report.appended);
            }
            for line in report.updated.iter() {
                println!("{line}");
            }
            for line in report.notices.iter() {
                println!("{line}");
            }
            for line in report.errors.iter() {
                eprintln!("{line}");
            }
            if report.nothing_entered() {
                println!("{NOTHING_ENTERED}");
            }
        }
        Commands::InitDb | Commands::Seed | Commands::Import { .. } => {}
    }

    Ok(())
}

async fn entry_setup(
    session: &mut GradebookSession,
    args: &EntryArgs,
) -> anyhow::Result<(models::TeacherIdentity, EntryRequest, NaiveDate)> {
    let table = session.grade_table(&columns::ENTRY).await?;
    let identity = identity::authenticate_teacher(
        &args.teacher.teacher_name,
        &args.teacher.teacher_registration,
        &table,
    )?;
    let request = EntryRequest {
        class_label: args.class.clone(),
        subject: args.subject.clone(),
        period: args.period.clone(),
        evaluation_type: args.evaluation,
    };
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    Ok((identity, request, today))
}

fn read_score_csv(path: &Path) -> anyhow::Result<Vec<(String, String)>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        #[serde(rename = "Matrícula")]
        registration: String,
        #[serde(rename = "Nota", default)]
        score: String,
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut pairs = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        pairs.push((row.registration.trim().to_string(), row.score));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_an_entry_submission() {
        let cli = Cli::try_parse_from([
            "gradebook",
            "enter",
            "--teacher-name",
            "Carla Souza",
            "--teacher-registration",
            "P01",
            "--class",
            "5A",
            "--subject",
            "Matemática",
            "--period",
            "1º",
            "--evaluation",
            "bimestral",
            "--today",
            "10/03/2026",
            "--score",
            "123=7,5",
            "--score",
            "456=8",
            "--overwrite",
        ])
        .expect("parse");
        let Commands::Enter {
            entry,
            scores,
            overwrite,
            ..
        } = cli.command
        else {
            panic!("expected enter");
        };
        assert_eq!(entry.evaluation, EvaluationType::Bimonthly);
        assert_eq!(entry.today, NaiveDate::from_ymd_opt(2026, 3, 10));
        assert_eq!(scores[0], ("123".to_string(), "7,5".to_string()));
        assert!(overwrite);
    }

    #[test]
    fn rejects_malformed_score_pairs() {
        assert!(parse_score_pair("7.5").is_err());
        assert!(parse_score_pair("=7.5").is_err());
        assert!(parse_evaluation("PROVA").is_err());
        assert!(parse_today("2026-03-10").is_err());
    }

    #[test]
    fn reads_scores_from_csv() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scores.csv");
        std::fs::write(&path, "Matrícula,Nota\n 123 ,\"7,5\"\n456,\n").expect("write");
        let pairs = read_score_csv(&path).expect("read");
        assert_eq!(
            pairs,
            vec![
                ("123".to_string(), "7,5".to_string()),
                ("456".to_string(), String::new())
            ]
        );
    }
}
