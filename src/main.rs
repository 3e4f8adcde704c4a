use health_analytics::audit::AuditReport;
use health_analytics::config::AppConfig;
use health_analytics::evaluation::Evaluator;
use health_analytics::generator::{
    generate_activity, generate_patients, seeded_rng, write_csv, DEFAULT_ACTIVITY_ROWS, DEFAULT_PATIENTS,
    DEFAULT_SEED,
};
use health_analytics::ingestion::SourceMode;
use health_analytics::pipeline::{load_clean_datasets, HealthAnalytics, PipelineResult, QueryMode};
use health_analytics::store::LocalStore;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "health-analytics")]
#[command(about = "Ask questions about the health datasets in plain English")]
#[command(version)]
struct Args {
    /// Data sources to consider: auto (database, then files) or files
    #[arg(long, global = true, default_value = "auto")]
    source: SourceMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Query {
        /// The question in natural language
        question: String,

        /// Request Python query generation (falls back to SQL)
        #[arg(long)]
        python: bool,
    },
    /// Answer questions read from stdin until exit, quit or q
    Interactive,
    /// Run the evaluation battery and write a JSON report
    Evaluate {
        #[arg(long, default_value = "reports/evaluation_report.json")]
        report: PathBuf,
    },
    /// Load, clean and store the datasets without contacting the model
    Setup,
    /// Write synthetic datasets as CSV
    Generate {
        #[arg(long, default_value_t = DEFAULT_PATIENTS)]
        patients: usize,

        #[arg(long, default_value_t = DEFAULT_ACTIVITY_ROWS)]
        activity_rows: usize,

        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        #[arg(long, default_value = "data")]
        out_dir: PathBuf,
    },
    /// Write a data quality report for the cleaned datasets
    Audit {
        #[arg(long, default_value = "reports/data_audit_report.txt")]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Query { question, python } => run_query(args.source, question, python).await,
        Commands::Interactive => run_interactive(args.source).await,
        Commands::Evaluate { report } => run_evaluation(args.source, report).await,
        Commands::Setup => run_setup(args.source).await,
        Commands::Generate {
            patients,
            activity_rows,
            seed,
            out_dir,
        } => run_generate(patients, activity_rows, seed, out_dir),
        Commands::Audit { output } => run_audit(args.source, output).await,
    }
}

fn print_result(result: &PipelineResult) {
    for notice in &result.notices {
        println!("Note: {}", notice);
    }
    if let Some(sql) = &result.sql_query {
        println!("\n=== Generated SQL ===\n{}", sql);
    }
    if let Some(rows) = &result.query_results {
        println!("\n=== Query Results ({} rows) ===", rows.len());
        println!("{}", rows.head(20).render());
        if rows.len() > 20 {
            println!("... ({} more rows)", rows.len() - 20);
        }
    }
    if let Some(insights) = &result.insights {
        println!("\n=== Insights ===\n{}", insights);
    }
    if let Some(err) = &result.error {
        println!("\nError: {}", err);
    }
}

async fn run_query(source: SourceMode, question: String, python: bool) -> Result<()> {
    let config = AppConfig::from_env()?;
    let analytics = HealthAnalytics::bootstrap(&config, source).await?;

    let mode = if python { QueryMode::Python } else { QueryMode::Sql };
    let result = analytics.process_query(&question, mode).await;
    print_result(&result);

    match result.error {
        Some(err) => bail!(err),
        None => Ok(()),
    }
}

async fn run_interactive(source: SourceMode) -> Result<()> {
    let config = AppConfig::from_env()?;
    let analytics = HealthAnalytics::bootstrap(&config, source).await?;

    println!("Healthcare analytics assistant. Type 'exit', 'quit' or 'q' to leave.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nQuestion: ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let question = line?;
        let question = question.trim();
        if matches!(question.to_lowercase().as_str(), "exit" | "quit" | "q") {
            break;
        }
        if question.is_empty() {
            continue;
        }

        let result = analytics.process_query(question, QueryMode::Sql).await;
        print_result(&result);
    }

    info!("Interactive session ended");
    Ok(())
}

async fn run_evaluation(source: SourceMode, report_path: PathBuf) -> Result<()> {
    let config = AppConfig::from_env()?;
    let analytics = HealthAnalytics::bootstrap(&config, source).await?;

    println!("Running evaluation suite...");
    let report = Evaluator::new(&analytics).run_suite(None).await;
    println!("\n{}", report.render_summary());
    report.save(&report_path)?;
    println!("\nEvaluation report saved to {}", report_path.display());
    Ok(())
}

async fn run_setup(source: SourceMode) -> Result<()> {
    let config = AppConfig::from_env()?;
    let (patients, activity) = load_clean_datasets(&config, source).await?;

    let mut store = LocalStore::open(&config.paths.database_path)?;
    store.materialize(&patients, &activity)?;
    if !store.has_expected_schema()? {
        error!("Store schema does not match the expected columns");
        bail!("Store schema mismatch in {}", config.paths.database_path.display());
    }

    println!("Database ready at {}", config.paths.database_path.display());
    for (table, columns) in store.schema_info()? {
        println!("  {} ({} columns)", table, columns.len());
    }
    println!("  {} patients, {} activity records", store.patient_count()?, activity.len());
    Ok(())
}

fn run_generate(patients: usize, activity_rows: usize, seed: u64, out_dir: PathBuf) -> Result<()> {
    let mut rng = seeded_rng(seed);

    println!("Generating Health Dataset 1 (N={})...", patients);
    let patient_rows = generate_patients(patients, &mut rng)?;
    let path_1 = out_dir.join("health_dataset_1.csv");
    write_csv(&path_1, &patient_rows)?;
    println!("Generated {} records -> {}", patient_rows.len(), path_1.display());

    println!("Generating Health Dataset 2 (N={})...", activity_rows);
    let ids: Vec<String> = patient_rows.iter().map(|p| p.patient_number.clone()).collect();
    let activity = generate_activity(&ids, activity_rows, &mut rng)?;
    let path_2 = out_dir.join("health_dataset_2.csv");
    write_csv(&path_2, &activity)?;
    println!("Generated {} records -> {}", activity.len(), path_2.display());
    Ok(())
}

async fn run_audit(source: SourceMode, output: PathBuf) -> Result<()> {
    let config = AppConfig::from_env()?;
    let (patients, activity) = load_clean_datasets(&config, source).await?;

    let report = AuditReport::build(&patients, &activity);
    println!("{}", report.render());
    report.save(&output)?;
    println!("\nAudit report saved to {}", output.display());
    Ok(())
}
