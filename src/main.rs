// Entry point: the HTTP dashboard server plus offline helper commands.
//
// - `serve` (default) loads the active dataset and starts the server.
// - `summary` prints metrics, distributions and detected problems.
// - `sample` writes a seeded synthetic dataset in the canonical schema.
// - `analyze` runs the upload pipeline on a local file.
use anyhow::{Context, Result};
use chrono::Utc;
use citizen_reports::api::{build_context, create_app};
use citizen_reports::config::{AppConfig, ConfigOverrides};
use citizen_reports::loader::{self, DataSource, SAMPLE_ROWS, SAMPLE_SEED};
use citizen_reports::problems::{analyze_problems, problem_rows};
use citizen_reports::{output, pipeline, reports, util};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "citizen-reports")]
#[command(about = "Citizen report dashboard with heuristic prioritization and upload analysis")]
#[command(version)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve(ServeArgs),
    /// Print dashboard aggregates and detected problems
    Summary {
        /// Dataset file(s) to try, first existing wins
        #[arg(long = "dataset", value_name = "PATH")]
        datasets: Vec<PathBuf>,
        /// Also write the full summary as JSON
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,
    },
    /// Write a synthetic dataset CSV
    Sample {
        #[arg(long, value_name = "PATH")]
        out: PathBuf,
        #[arg(long, default_value_t = SAMPLE_ROWS)]
        rows: usize,
        #[arg(long, default_value_t = SAMPLE_SEED)]
        seed: u64,
    },
    /// Analyze a CSV/Excel file and print the result as JSON
    Analyze {
        file: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Bind address, e.g. 127.0.0.1:8080
    #[arg(long, value_name = "HOST:PORT")]
    addr: Option<String>,
    /// Port on 0.0.0.0, ignored when --addr is given
    #[arg(short, long)]
    port: Option<u16>,
    /// Dataset file(s) to try, first existing wins
    #[arg(long = "dataset", value_name = "PATH")]
    datasets: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    match args.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Summary { datasets, json } => summary(datasets, json),
        Command::Sample { out, rows, seed } => sample(out, rows, seed),
        Command::Analyze { file } => analyze(file),
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = AppConfig::from_env(ConfigOverrides {
        bind_address: args.addr,
        port: args.port,
        datasets: args.datasets,
    })
    .context("invalid configuration")?;

    let outcome = loader::load_active(&config.dataset_paths).context("failed to load dataset")?;
    if let DataSource::Sample { rows, seed } = &outcome.source {
        info!(rows, seed, "serving generated sample data");
    }

    let state = build_context(&config, outcome.dataset);
    let app = create_app(state, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!(addr = %config.bind_address, "dashboard available at http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            // An error here only means the signal handler could not be installed.
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn summary(datasets: Vec<PathBuf>, json: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::from_env(ConfigOverrides { datasets, ..Default::default() })
        .context("invalid configuration")?;
    let outcome = loader::load_active(&config.dataset_paths)?;
    let data = &outcome.dataset;

    match &outcome.source {
        DataSource::File(path) => println!(
            "Dataset: {} ({} rows loaded, {} skipped)",
            path.display(),
            util::format_int(outcome.report.loaded_rows),
            util::format_int(outcome.report.parse_errors + outcome.report.invalid_dates)
        ),
        DataSource::Sample { rows, seed } => {
            println!("Dataset: generated sample ({} rows, seed {})", util::format_int(*rows), seed)
        }
    }

    let stats = reports::generate_summary(data);
    output::print_table("Metrics", None, &reports::metric_rows(&stats.metrics), usize::MAX);
    output::print_table("Categories", None, &reports::distribution_rows(&stats.categories), 20);
    output::print_table("Urgency", None, &reports::distribution_rows(&stats.urgency), 20);

    let problems = analyze_problems(data, Utc::now());
    let note = format!("{} detected, {} critical", problems.total_problems, problems.critical_problems);
    output::print_table("Problems", Some(&note), &problem_rows(&problems), usize::MAX);

    if let Some(path) = json {
        let body = serde_json::json!({ "summary": stats, "problems": problems });
        output::write_json(&path, &body)?;
        println!("(Full summary exported to {})", path.display());
    }
    Ok(())
}

fn sample(out: PathBuf, rows: usize, seed: u64) -> Result<()> {
    let dataset = loader::generate_sample(rows, seed);
    output::write_dataset_csv(&out, &dataset)?;
    println!("Wrote {} sample rows to {}", util::format_int(rows), out.display());
    Ok(())
}

fn analyze(file: PathBuf) -> Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("file name is not valid UTF-8")?;
    let analysis_id = uuid::Uuid::new_v4().to_string();
    let stored = pipeline::process_upload(&analysis_id, file_name, &bytes, None)?;
    println!("{}", serde_json::to_string_pretty(&stored.result)?);
    Ok(())
}
