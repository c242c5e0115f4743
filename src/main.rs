use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use college_attendance::models::{
    AttendanceBand, AttendanceRecord, AttendanceStatus, NewAttendanceRecord, RecordFilter,
};
use college_attendance::{
    db, fixtures, import, report, AttendanceAggregator, AttendanceStore, Backend,
    DEFAULT_LOW_ATTENDANCE_THRESHOLD,
};

#[derive(Parser)]
#[command(name = "college-attendance")]
#[command(about = "Attendance tracking and low-attendance alerts for college courses", long_about = None)]
struct Cli {
    /// Postgres connection string; without it commands run against in-memory demo data
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    /// CSV used to fill the in-memory store instead of the built-in demo data
    #[arg(long, env = "ATTENDANCE_FIXTURES", global = true)]
    fixtures: Option<PathBuf>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the demo attendance records into the database
    Seed,
    /// Import attendance records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one session for a course
    Take {
        #[arg(long)]
        course: i64,
        #[arg(long)]
        semester: String,
        /// Session date, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_delimiter = ',')]
        present: Vec<i64>,
        #[arg(long, value_delimiter = ',')]
        absent: Vec<i64>,
    },
    /// Flip a record between present and absent
    Toggle { id: i64 },
    /// Remove a record
    Delete { id: i64 },
    /// List records, optionally filtered
    List {
        #[arg(long)]
        student: Option<i64>,
        #[arg(long)]
        course: Option<i64>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        status: Option<AttendanceStatus>,
    },
    /// Attendance percentage for a student
    Percentage {
        #[arg(long)]
        student: i64,
        #[arg(long)]
        course: Option<i64>,
    },
    /// Present/absent counts for a student across all courses
    Summary {
        #[arg(long)]
        student: i64,
    },
    /// Students below the attendance threshold
    Low {
        #[arg(
            long,
            env = "ATTENDANCE_THRESHOLD",
            default_value_t = DEFAULT_LOW_ATTENDANCE_THRESHOLD,
            value_parser = clap::value_parser!(u8).range(0..=100)
        )]
        threshold: u8,
    },
    /// Attendance statistics for one course
    CourseStats {
        #[arg(long)]
        course: i64,
    },
    /// Attendance statistics for every course with records
    Courses,
    /// Generate a markdown report
    Report {
        #[arg(
            long,
            env = "ATTENDANCE_THRESHOLD",
            default_value_t = DEFAULT_LOW_ATTENDANCE_THRESHOLD,
            value_parser = clap::value_parser!(u8).range(0..=100)
        )]
        threshold: u8,
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let log_json = std::env::var("ATTENDANCE_LOG_JSON")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn open_backend(cli: &Cli) -> anyhow::Result<Backend> {
    if let Some(database_url) = &cli.database_url {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")?;
        return Ok(Backend::Postgres(pool));
    }

    let store = match &cli.fixtures {
        Some(path) => {
            let mut store = AttendanceStore::new();
            store.create_bulk(import::read_csv(path)?)?;
            store
        }
        None => AttendanceStore::with_records(fixtures::seed_records()?)?,
    };
    Ok(Backend::Memory(store))
}

fn require_pool<'a>(backend: &'a Backend, command: &str) -> anyhow::Result<&'a PgPool> {
    match backend {
        Backend::Postgres(pool) => Ok(pool),
        Backend::Memory(_) => {
            anyhow::bail!("{command} needs a database; set --database-url or DATABASE_URL")
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_records(records: &[AttendanceRecord], as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No attendance records found.");
        return Ok(());
    }
    for record in records {
        println!(
            "#{} {} student {} course {} {} ({})",
            record.id,
            record.date,
            record.student_id,
            record.course_id,
            record.status,
            record.semester
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let as_json = cli.json;
    let mut backend = open_backend(&cli).await?;
    info!(backend = backend.name(), "attendance backend ready");

    match cli.command {
        Commands::InitDb => {
            db::init_db(require_pool(&backend, "init-db")?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(require_pool(&backend, "seed")?).await?;
            println!("Seeded {inserted} attendance records.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(require_pool(&backend, "import")?, &csv).await?;
            println!("Inserted {inserted} attendance records from {}.", csv.display());
        }
        Commands::Take {
            course,
            semester,
            date,
            present,
            absent,
        } => {
            if present.is_empty() && absent.is_empty() {
                anyhow::bail!("take needs at least one --present or --absent student");
            }
            let marks = present
                .into_iter()
                .map(|student| (student, AttendanceStatus::Present))
                .chain(
                    absent
                        .into_iter()
                        .map(|student| (student, AttendanceStatus::Absent)),
                );
            let records: Vec<NewAttendanceRecord> = marks
                .map(|(student_id, status)| NewAttendanceRecord {
                    student_id,
                    course_id: course,
                    date,
                    status,
                    semester: semester.clone(),
                })
                .collect();

            let created = backend.create_bulk(records).await?;
            if as_json {
                print_json(&created)?;
            } else {
                println!("Attendance recorded for {} students.", created.len());
                print_records(&created, false)?;
            }
        }
        Commands::Toggle { id } => {
            let updated = backend.toggle_status(id).await?;
            print_records(&[updated], as_json)?;
        }
        Commands::Delete { id } => {
            let removed = backend.delete(id).await?;
            if as_json {
                print_json(&removed)?;
            } else {
                println!("Deleted attendance record #{}.", removed.id);
            }
        }
        Commands::List {
            student,
            course,
            date,
            semester,
            status,
        } => {
            let filter = RecordFilter {
                student_id: student,
                course_id: course,
                date,
                semester,
                status,
            };
            let records = backend.find(&filter).await?;
            print_records(&records, as_json)?;
        }
        Commands::Percentage { student, course } => {
            let records = backend.snapshot().await?;
            let percentage =
                AttendanceAggregator::new(&records).attendance_percentage(student, course);
            let band = AttendanceBand::from_percentage(percentage);

            if as_json {
                print_json(&json!({
                    "studentId": student,
                    "courseId": course,
                    "percentage": percentage,
                    "band": band,
                }))?;
            } else {
                match course {
                    Some(course) => println!(
                        "Student {student} in course {course}: {percentage}% ({})",
                        band.label()
                    ),
                    None => println!("Student {student}: {percentage}% ({})", band.label()),
                }
            }
        }
        Commands::Summary { student } => {
            let records = backend.snapshot().await?;
            let summary = AttendanceAggregator::new(&records).student_summary(student);

            if as_json {
                print_json(&summary)?;
            } else {
                println!(
                    "Student {student}: {}% across {} classes ({} present, {} absent)",
                    summary.percentage,
                    summary.total_classes,
                    summary.present_count,
                    summary.absent_count
                );
            }
        }
        Commands::Low { threshold } => {
            let records = backend.snapshot().await?;
            let flagged = AttendanceAggregator::new(&records).low_attendance_students(threshold);

            if as_json {
                print_json(&flagged)?;
            } else if flagged.is_empty() {
                println!("No students have attendance below {threshold}%.");
            } else {
                println!("{} student(s) below {threshold}%:", flagged.len());
                for entry in flagged.iter() {
                    println!(
                        "- Student {}: {}% ({} of {} classes missed)",
                        entry.student_id,
                        entry.summary.percentage,
                        entry.summary.absent_count,
                        entry.summary.total_classes
                    );
                }
            }
        }
        Commands::CourseStats { course } => {
            let records = backend.snapshot().await?;
            let stats = AttendanceAggregator::new(&records).course_stats(course);

            if as_json {
                print_json(&stats)?;
            } else {
                println!(
                    "Course {course}: {}% average across {} classes, {} students",
                    stats.average_attendance, stats.total_classes, stats.student_count
                );
            }
        }
        Commands::Courses => {
            let records = backend.snapshot().await?;
            let overview = AttendanceAggregator::new(&records).course_overview();

            if as_json {
                let rows: Vec<_> = overview
                    .iter()
                    .map(|(course_id, stats)| json!({ "courseId": course_id, "stats": stats }))
                    .collect();
                print_json(&rows)?;
            } else if overview.is_empty() {
                println!("No attendance recorded yet.");
            } else {
                for (course_id, stats) in overview.iter() {
                    println!(
                        "- Course {course_id}: {}% average across {} classes, {} students",
                        stats.average_attendance, stats.total_classes, stats.student_count
                    );
                }
            }
        }
        Commands::Report { threshold, out } => {
            let records = backend.snapshot().await?;
            let report = report::build_report(threshold, &records);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn take_accepts_comma_separated_students() {
        let cli = Cli::try_parse_from([
            "college-attendance",
            "take",
            "--course",
            "2",
            "--semester",
            "Fall 2024",
            "--date",
            "2024-09-12",
            "--present",
            "1,5",
            "--absent",
            "6",
        ])
        .unwrap();

        match cli.command {
            Commands::Take {
                course,
                date,
                present,
                absent,
                ..
            } => {
                assert_eq!(course, 2);
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 9, 12));
                assert_eq!(present, vec![1, 5]);
                assert_eq!(absent, vec![6]);
            }
            _ => panic!("expected take"),
        }
    }

    #[test]
    fn threshold_is_bounded() {
        assert!(Cli::try_parse_from(["college-attendance", "low", "--threshold", "101"]).is_err());
        let cli = Cli::try_parse_from(["college-attendance", "low", "--threshold", "0"]).unwrap();
        assert!(matches!(cli.command, Commands::Low { threshold: 0 }));
    }

    #[test]
    fn list_parses_status_filter() {
        let cli =
            Cli::try_parse_from(["college-attendance", "list", "--status", "absent"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                status: Some(AttendanceStatus::Absent),
                ..
            }
        ));
    }

    #[test]
    fn database_commands_refuse_memory_backend() {
        let backend = Backend::Memory(AttendanceStore::new());
        let err = require_pool(&backend, "seed").unwrap_err();
        assert!(err.to_string().starts_with("seed needs a database"));
    }
}
