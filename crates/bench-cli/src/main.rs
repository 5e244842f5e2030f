//! haystack-bench - resource-aware inference benchmark runner

use anyhow::{Context, Result};
use bench_core::config::CONFIG_ENV_VAR;
use bench_core::{BenchConfig, LoggingConfig, ModelId, TelemetryBackend};
use bench_runner::{corpus, summarize, BatchSizer, BenchmarkDriver, GradioPredictor};
use bench_telemetry::{create_probe, DeviceProbe, SamplerHandle, TelemetrySampler};
use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

mod display;
mod output;
mod progress;

use output::OutputFormat;
use progress::BarProgress;

/// Exit status reported when the run failed
const EXIT_FAILURE: u8 = 1;

/// Exit status reported when the run was interrupted
const EXIT_INTERRUPTED: u8 = 130;

/// Benchmark inference models across image resolutions while sampling GPU telemetry
#[derive(Debug, Parser)]
#[command(name = "haystack-bench")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Corpus root with one folder per resolution class
    #[arg(long, value_name = "DIR")]
    corpus: Option<PathBuf>,

    /// Models to benchmark (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    models: Option<Vec<String>>,

    /// Predictor endpoint URL
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Telemetry backend (nvml, host, mock)
    #[arg(long)]
    backend: Option<TelemetryBackend>,

    /// Telemetry sampling interval in seconds
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Fraction of free GPU memory a batch may plan to use
    #[arg(long)]
    memory_fraction: Option<f64>,

    /// Dispatch the images of a batch concurrently
    #[arg(long)]
    parallel: bool,

    /// Do not print live resource stats
    #[arg(long)]
    no_display: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Write every result row to FILE as JSON
    #[arg(long, value_name = "FILE")]
    save: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    fn apply(&self, config: &mut BenchConfig) {
        if let Some(root) = &self.corpus {
            config.corpus.root = root.clone();
        }
        if let Some(models) = &self.models {
            config.models = models.iter().map(|m| ModelId::new(m.trim())).collect();
        }
        if let Some(endpoint) = &self.endpoint {
            config.predictor.endpoint = endpoint.clone();
        }
        if let Some(backend) = self.backend {
            config.telemetry.backend = backend;
        }
        if let Some(interval) = self.interval {
            config.telemetry.interval_secs = interval;
        }
        if let Some(fraction) = self.memory_fraction {
            config.batching.memory_fraction = fraction;
        }
        if self.parallel {
            config.batching.parallel_dispatch = true;
        }
        if self.no_display || !self.output.is_interactive() {
            config.telemetry.display = false;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }

    /// Explicit path, then the environment, then the per-user config file if present
    fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }
        if std::env::var_os(CONFIG_ENV_VAR).is_some() {
            return None;
        }
        dirs::config_dir()
            .map(|dir| dir.join("haystack-bench").join("config.yaml"))
            .filter(|path| path.is_file())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Completed,
    Interrupted,
}

/// Process exit status for the outcome of a run
fn exit_status(result: &Result<RunStatus>) -> u8 {
    match result {
        Ok(RunStatus::Completed) => 0,
        Ok(RunStatus::Interrupted) => EXIT_INTERRUPTED,
        Err(_) => EXIT_FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(e) = &result {
        error!("{:#}", e);
        eprintln!("{} {:#}", "Error:".red().bold(), e);
    }
    ExitCode::from(exit_status(&result))
}

async fn run(cli: Cli) -> Result<RunStatus> {
    let mut config = load_config(cli.config_path().as_deref())?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging)?;
    debug!("Starting haystack-bench with {:?}", cli);

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_interrupt(cancel.clone()));
    let result = run_with(&cli, &config, &cancel).await;
    interrupt.abort();
    result
}

/// Run the benchmark under `cancel`, stopping at the first startup stage that sees it cancelled
async fn run_with(cli: &Cli, config: &BenchConfig, cancel: &CancellationToken) -> Result<RunStatus> {
    if cli.output.is_interactive() {
        output::print_banner(&output::SystemSpecs::collect());
    }

    // corpus problems abort before any device or network handle is opened
    let folders = corpus::discover(&config.corpus)?;
    if cancel.is_cancelled() {
        warn!("Interrupted during corpus discovery");
        return Ok(RunStatus::Interrupted);
    }
    let predictor = Arc::new(GradioPredictor::new(&config.predictor)?);

    let probe = create_probe(&config.telemetry)?;
    let Some(sampler) = start_telemetry(probe, config.telemetry.interval(), cancel).await? else {
        return Ok(RunStatus::Interrupted);
    };

    let progress = Arc::new(BarProgress::new(cli.output.is_interactive()));
    let stop_display = CancellationToken::new();
    let display = config.telemetry.display.then(|| {
        display::spawn_stats_display(sampler.reader(), progress.bar(), stop_display.clone())
    });

    let driver = BenchmarkDriver::new(
        predictor,
        sampler.reader(),
        BatchSizer::new(&config.corpus.resolutions, &config.batching),
        config.predictor.task_prompt.clone(),
    )
    .with_parallel_dispatch(config.batching.parallel_dispatch)
    .with_progress(progress.clone());

    let outcome = driver.run(&config.models, &folders, cancel).await;

    stop_display.cancel();
    if let Some(display) = display {
        if let Err(e) = display.await {
            warn!("Stats display task failed: {}", e);
        }
    }
    sampler.shutdown().await;

    if outcome.interrupted {
        warn!("Benchmark interrupted, reporting {} collected rows", outcome.rows.len());
    }

    if let Some(path) = &cli.save {
        output::save_rows(path, &outcome.rows)?;
        info!("Saved {} rows to {}", outcome.rows.len(), path.display());
    }

    output::print_summary(&summarize(&outcome.rows), cli.output)?;

    Ok(if outcome.interrupted {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    })
}

/// Start the sampler, shutting it straight down if the run was interrupted meanwhile
async fn start_telemetry(
    probe: Box<dyn DeviceProbe>,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<Option<SamplerHandle>> {
    let sampler = TelemetrySampler::start(probe, interval, cancel).await?;
    if cancel.is_cancelled() {
        warn!("Interrupted while starting telemetry");
        sampler.shutdown().await;
        return Ok(None);
    }
    Ok(Some(sampler))
}

fn load_config(path: Option<&Path>) -> Result<BenchConfig> {
    let config = BenchConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;
    Ok(config)
}

/// Translate Ctrl+C into cancellation of the run
async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupt received, stopping benchmark");
            cancel.cancel();
        }
        Err(e) => error!("Failed to listen for interrupt signal: {}", e),
    }
}

/// Initialize logging on stderr so stdout carries only results
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(logging.show_target)
        .with_writer(std::io::stderr);

    let result = match logging.format.as_str() {
        "json" => subscriber.json().try_init(),
        _ => subscriber.try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
