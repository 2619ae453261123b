//! Trawl main entry point
//!
//! This is the command-line interface for the Trawl structural scraper.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use trawl::config::{load_config, Config, LogConfig};
use trawl::crawler::Coordinator;
use trawl::logging::{job_log_path, RotatingFile};
use trawl::output::{build_sink, RecordSink, StdoutSink};
use trawl::schema::{load_job, JobDefinition};
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Layer writing to the per-job log file, attached once the job is known
type FileLayer = fmt::Layer<Registry, DefaultFields, Format, Mutex<RotatingFile>>;
type FileLayerHandle = reload::Handle<Option<FileLayer>, Registry>;

/// Trawl: a declarative structural scraper
///
/// Trawl fetches the job's base URL, applies the job's schema tree to every
/// fetched document, follows list and pagination links, and writes each
/// record once all of its required fields have been found.
#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(version = "1.0.0")]
#[command(about = "A declarative structural scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Identifier of the job definition to run
    #[arg(short, long, value_name = "JOB_ID")]
    job: String,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Load the config and job, print the schema tree and exit
    #[arg(long, conflicts_with = "preview")]
    dry_run: bool,

    /// Print the first completed record to stdout and stop
    #[arg(long)]
    preview: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_layer = setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    let job = load_job(&config.job, &cli.job)
        .await
        .with_context(|| format!("failed to load job '{}'", cli.job))?;
    tracing::info!("Job '{}' loaded (digest: {})", job.job_id, job.digest);

    if cli.dry_run {
        handle_dry_run(&config, &job);
        return Ok(());
    }

    attach_job_log(&file_layer, &config.log, &job)?;

    handle_run(config, job, cli.preview).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Returns the handle used to attach the per-job log file later.
fn setup_logging(verbose: u8, quiet: bool) -> FileLayerHandle {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("trawl=info,warn"),
            1 => EnvFilter::new("trawl=debug,info"),
            2 => EnvFilter::new("trawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let (file_layer, handle) = reload::Layer::new(None::<FileLayer>);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_writer(std::io::stderr),
        )
        .init();

    handle
}

/// Starts mirroring log lines into `{directory}/{host}/{job-id}/log.log`
fn attach_job_log(
    handle: &FileLayerHandle,
    config: &LogConfig,
    job: &JobDefinition,
) -> anyhow::Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let path = job_log_path(Path::new(&config.directory), &job.base_url, &job.job_id);
    let file = RotatingFile::open(&path, config.max_file_size, config.max_files)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file));
    handle
        .reload(Some(layer))
        .context("failed to attach the job log file")?;

    tracing::info!("Logging to {}", path.display());
    Ok(())
}

/// Handles the --dry-run mode: shows what would be extracted
fn handle_dry_run(config: &Config, job: &JobDefinition) {
    println!("=== Trawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!(
        "  Retries: {} ({}ms apart)",
        config.crawler.max_retries, config.crawler.retry_delay
    );
    println!("  Proxies: {}", config.crawler.proxies.len());
    println!("  Incomplete records: {:?}", config.crawler.on_incomplete);

    println!("\nOutput:");
    println!("  Destination: {:?}", config.output.destination);
    if let Some(file) = &config.output.file {
        println!("  File: {}", file);
    }
    if config.log.enabled {
        println!("  Log directory: {}", config.log.directory);
    }

    println!("\nJob '{}':", job.job_id);
    println!("  Base URL: {}", job.base_url);
    println!("  Cookies: {}", job.cookies.len());
    println!("\nSchema:");
    print!("{}", job.schema);

    println!("\n✓ Configuration and schema are valid");
}

/// Handles the main run
async fn handle_run(config: Config, job: JobDefinition, preview: bool) -> anyhow::Result<()> {
    let sink: Box<dyn RecordSink> = if preview {
        Box::new(StdoutSink::new())
    } else {
        build_sink(&config.output).context("failed to open output")?
    };

    let mut coordinator = Coordinator::new(config, job, sink)?;
    if preview {
        coordinator = coordinator.with_max_records(1);
    }

    match coordinator.run().await {
        Ok(snapshot) => {
            tracing::info!(
                "Run completed successfully: {} records",
                snapshot.records_emitted
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
