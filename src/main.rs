use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod band;
mod cells;
mod columns;
mod config;
mod db;
mod due_date;
mod error;
mod ingest;
mod models;
mod records;
mod report;
mod sheet_name;
mod stats;
mod workbook;

use config::AnalysisConfig;
use due_date::DueWindow;
use stats::Analysis;

#[derive(Parser)]
#[command(name = "weekly-completion")]
#[command(
    about = "Weekly assessment completion bands from LMS workbook exports",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RunArgs {
    /// LMS export (.xlsx, .xls or .ods); repeat to combine several weeks
    #[arg(long = "workbook", required = true)]
    workbooks: Vec<PathBuf>,
    /// Reference date; assessments due after it are not counted (defaults to today)
    #[arg(long)]
    today: Option<NaiveDate>,
    /// Ignore assessments due before this date
    #[arg(long)]
    since: Option<NaiveDate>,
    /// TOML file overriding sheet layout and header keywords
    #[arg(long)]
    config: Option<PathBuf>,
    /// Label for the run, defaults to the first workbook's file name
    #[arg(long)]
    week: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a workbook and write reports
    Analyze {
        #[command(flatten)]
        run: RunArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Also write the full analysis as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Also write one CSV row per student record
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Create or upgrade the snapshot schema
    InitDb,
    /// Analyze a workbook and store its weekly snapshot
    Record {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Show week-over-week completion
    History {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, default_value_t = 12)]
        limit: i64,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init();
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn source_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn week_label(run: &RunArgs) -> String {
    run.week.clone().unwrap_or_else(|| {
        run.workbooks
            .first()
            .map(|path| source_label(path))
            .unwrap_or_else(|| "week".to_string())
    })
}

fn run_analysis(run: &RunArgs) -> anyhow::Result<Analysis> {
    let config = match &run.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    // The only place the clock is read; the engine takes the date as input.
    let reference_date = run.today.unwrap_or_else(|| chrono::Local::now().date_naive());
    let window = match run.since {
        Some(start) => DueWindow::between(start, reference_date),
        None => DueWindow::until(reference_date),
    };

    let mut loaded = Vec::with_capacity(run.workbooks.len());
    for path in &run.workbooks {
        loaded.push((source_label(path), workbook::load_workbook(path)?));
    }
    let ingestion = ingest::ingest_workbooks(
        loaded.iter().map(|(source, workbook)| (source.as_str(), workbook)),
        &config,
        window,
    )
    .context("cannot analyze the given workbooks")?;
    info!(
        workbooks = ingestion.sources.len(),
        sheets = ingestion.sheets.len(),
        skipped = ingestion.skipped.len(),
        %reference_date,
        "workbook ingested"
    );

    Ok(stats::analyze(ingestion, reference_date, run.since))
}

fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> anyhow::Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { run, out, json, csv } => {
            let analysis = run_analysis(&run)?;
            let label = week_label(&run);

            write_file(&out, report::build_report(&analysis, Some(&label)))?;
            println!("Report written to {}.", out.display());

            if let Some(path) = json {
                write_file(&path, serde_json::to_vec_pretty(&analysis)?)?;
                println!("Analysis written to {}.", path.display());
            }
            if let Some(path) = csv {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                let rows = report::write_student_csv(&analysis, file)?;
                println!("Wrote {rows} student records to {}.", path.display());
            }

            println!(
                "School completion: {} ({})",
                report::format_rate(analysis.school.average_completion),
                analysis.school.band.label()
            );
        }
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Record { run } => {
            let analysis = run_analysis(&run)?;
            let label = week_label(&run);
            let pool = connect().await?;
            let run_id = db::record_snapshot(&pool, &analysis, &label).await?;
            println!(
                "Recorded {} ({} classes) as run {run_id}.",
                label, analysis.school.class_count
            );
        }
        Commands::History { subject, limit } => {
            let pool = connect().await?;
            let trends = db::fetch_trends(&pool, subject.as_deref(), limit).await?;

            if trends.is_empty() {
                println!("No snapshots recorded yet.");
                return Ok(());
            }

            println!("Completion by week ({}):", subject.as_deref().unwrap_or("whole school"));
            for trend in trends {
                let band = band::Band::from_percentage(trend.average_completion);
                println!(
                    "- {} ({}): {} {} across {} classes, {} records",
                    trend.week_label,
                    trend.reference_date,
                    report::format_rate(trend.average_completion),
                    band.label(),
                    trend.class_count,
                    trend.eligible_records
                );
            }
        }
    }

    Ok(())
}
