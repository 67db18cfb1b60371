use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use uploader::{CommandUploader, Runner, UploaderConfig};

/// A job failed; the queue was saved with it at the head
const EXIT_JOB_FAILED: u8 = 1;
/// The queue file could not be written back
const EXIT_NOT_SAVED: u8 = 2;
/// Config, queue or log could not be opened; nothing was uploaded
const EXIT_STARTUP: u8 = 3;
/// Stopped by SIGINT/SIGTERM after saving the queue
const EXIT_INTERRUPTED: u8 = 130;

/// Upload every queued (video, metadata) pair, resuming where the last run stopped
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Queue CSV file (overrides config)
    #[arg(short, long)]
    queue: Option<PathBuf>,

    /// Run log file (overrides config)
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// Uploader executable (overrides config)
    #[arg(short, long)]
    uploader: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, cfg: &mut UploaderConfig) {
        if let Some(queue) = &self.queue {
            cfg.queue_path = queue.clone();
        }
        if let Some(log_file) = &self.log_file {
            cfg.log_path = log_file.clone();
        }
        if let Some(bin) = &self.uploader {
            cfg.uploader_bin = bin.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // RUST_LOG wins; --verbose only raises the fallback level
    let mut logger = env_logger::Builder::new();
    logger
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let runner = match start(&args) {
        Ok(runner) => runner,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    // Losing the race drops the perform future, and the runner saves the queue on drop
    let outcome = tokio::select! {
        result = runner.perform() => result,
        signal = shutdown_signal() => {
            warn!("Received {}, queue saved with the interrupted job at the head", signal);
            return ExitCode::from(EXIT_INTERRUPTED);
        }
    };

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            error!("Queue state may not reflect this run: {}", e);
            return ExitCode::from(EXIT_NOT_SAVED);
        }
    };

    info!("Run finished: {} uploaded, {} remaining", summary.uploaded, summary.remaining);
    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_JOB_FAILED)
    }
}

fn start(args: &Args) -> Result<Runner<CommandUploader>> {
    let mut cfg = UploaderConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut cfg);

    info!("Bulk upload starting");
    info!("  Queue: {}", cfg.queue_path.display());
    info!("  Log: {}", cfg.log_path.display());
    info!("  Uploader: {}", cfg.uploader_bin.display());

    Runner::from_config(&cfg)
        .with_context(|| format!("Failed to start run for queue {}", cfg.queue_path.display()))
}

/// Resolves with the signal name once SIGINT (or SIGTERM on unix) arrives
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = interrupt() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            },
            Err(e) => {
                warn!("Could not listen for SIGTERM: {}", e);
                interrupt().await;
                "SIGINT"
            }
        }
    }
    #[cfg(not(unix))]
    {
        interrupt().await;
        "Ctrl-C"
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
