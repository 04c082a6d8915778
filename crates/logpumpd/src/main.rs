//! logpumpd — the logpump daemon.
//!
//! Runs the full pipeline in one process:
//! - Producer (adaptive pacing)
//! - Bounded queue
//! - Worker pool + autoscaler
//! - Metrics reporter
//! - Console sink (JSON lines on stdout)
//!
//! Logs go to stderr so stdout carries only sink output.
//!
//! # Usage
//!
//! ```text
//! logpumpd run --config logpump.toml --max-workers 16
//! logpumpd config > logpump.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use logpump_core::config::parse_duration;
use logpump_core::{ConsoleSink, PipelineConfig, Severity};
use logpump_pipeline::PipelineBuilder;

#[derive(Parser)]
#[command(name = "logpumpd", about = "Synthetic log pipeline with an autoscaled worker pool")]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline until interrupted.
    Run {
        /// Path to a logpump.toml config file.
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Stop on its own after this long (e.g. "30s").
        #[arg(long, value_parser = duration_arg)]
        run_for: Option<Duration>,

        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the effective configuration as TOML.
    Config {
        #[arg(long, short)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Command-line overrides applied on top of the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    #[arg(long)]
    queue_capacity: Option<usize>,

    #[arg(long, value_parser = duration_arg)]
    produce_interval: Option<Duration>,

    #[arg(long)]
    severity: Option<Severity>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long, value_parser = duration_arg)]
    batch_timeout: Option<Duration>,

    #[arg(long)]
    initial_workers: Option<usize>,

    #[arg(long)]
    min_workers: Option<usize>,

    #[arg(long)]
    max_workers: Option<usize>,

    #[arg(long, value_parser = duration_arg)]
    scale_interval: Option<Duration>,

    #[arg(long, value_parser = duration_arg)]
    metrics_interval: Option<Duration>,

    #[arg(long, value_parser = duration_arg)]
    sink_latency: Option<Duration>,
}

impl Overrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = self.queue_capacity {
            config.queue.capacity = v;
        }
        if let Some(v) = self.produce_interval {
            config.producer.interval = v;
        }
        if let Some(v) = self.severity {
            config.producer.severity = v;
        }
        if let Some(v) = self.batch_size {
            config.workers.batch_size = v;
        }
        if let Some(v) = self.batch_timeout {
            config.workers.batch_timeout = v;
        }
        if let Some(v) = self.initial_workers {
            config.workers.initial = v;
        }
        if let Some(v) = self.min_workers {
            config.autoscale.min_workers = v;
        }
        if let Some(v) = self.max_workers {
            config.autoscale.max_workers = v;
        }
        if let Some(v) = self.scale_interval {
            config.autoscale.check_interval = v;
        }
        if let Some(v) = self.metrics_interval {
            config.metrics.report_interval = v;
        }
        if let Some(v) = self.sink_latency {
            config.sink.latency = v;
        }
    }
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

fn load_config(path: Option<&PathBuf>, overrides: &Overrides) -> anyhow::Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run {
            config,
            run_for,
            overrides,
        } => {
            let config = load_config(config.as_ref(), &overrides)?;
            run(config, run_for).await
        }
        Command::Config { config, overrides } => {
            let config = load_config(config.as_ref(), &overrides)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,logpump=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: PipelineConfig, run_for: Option<Duration>) -> anyhow::Result<()> {
    info!("logpump daemon starting");

    let sink = Arc::new(ConsoleSink::new(config.sink.latency));
    let pipeline = PipelineBuilder::new(config, sink).start().await?;

    match run_for {
        Some(limit) => {
            tokio::select! {
                _ = tokio::time::sleep(limit) => info!("run duration elapsed"),
                res = shutdown_signal() => {
                    res?;
                    info!("shutdown signal received");
                }
            }
        }
        None => {
            shutdown_signal().await?;
            info!("shutdown signal received");
        }
    }

    let report = pipeline.shutdown().await?;
    info!(
        produced = ?report.produced,
        flushed = report.items_flushed(),
        failed_flushes = report.failed_flushes(),
        "logpump daemon stopped"
    );
    Ok(())
}

/// Resolve on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("waiting for CTRL+C")?,
            _ = term.recv() => {}
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("waiting for CTRL+C")?;
        Ok(())
    }
}
