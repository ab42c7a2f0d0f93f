//! jumpmon entry point.
//!
//! Parses the command line, then runs one pinned busy-poll worker per
//! selected CPU and prints a line to stdout for every clock jump. Diagnostics
//! go to stderr.

mod cli;
mod signals;

use anyhow::{Context, Result};
use jump_common::config::MonitorConfig;
use jump_monitor::controller::{Monitor, RunSummary};
use jump_monitor::realtime::lock_memory;
use jump_monitor::sink::StdoutSink;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use crate::cli::Parsed;
use crate::signals::SignalHandler;

fn main() -> ExitCode {
    let args = match cli::parse(std::env::args_os()) {
        Parsed::Run(args) => args,
        Parsed::Help(text) => {
            print!("{text}");
            return ExitCode::SUCCESS;
        }
        Parsed::Invalid(text) => {
            eprint!("{text}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting jumpmon");

    let config = match cli::load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}\n");
            eprint!("{}", cli::usage());
            return ExitCode::FAILURE;
        }
    };

    info!(
        threshold_ms = config.threshold.as_millis(),
        cpus = %config.cpus,
        duration_s = config.duration.as_secs(),
        "Configuration loaded"
    );

    match run(&config) {
        Ok(summary) if summary.is_clean() => ExitCode::SUCCESS,
        Ok(summary) => {
            // Each failure was already logged by its worker
            error!(failed = summary.failures.len(), "Workers failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the specified log level.
///
/// Output goes to stderr so that stdout carries nothing but jump reports.
fn init_logging(level: &str) {
    let filter = format!("jumpmon={level},jump_monitor={level},jump_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Run the monitor until the duration elapses or a stop signal arrives.
fn run(config: &MonitorConfig) -> Result<RunSummary> {
    let signals = SignalHandler::install().context("Failed to set up signal handlers")?;

    if config.lock_memory {
        lock_memory().context("Failed to lock memory")?;
    }

    let mut monitor = Monitor::new(config.clone(), Arc::new(StdoutSink));
    let cpus = monitor.selected_cpus();

    let summary = monitor
        .run(&cpus, || signals.stop_requested())
        .context("Monitor run failed")?;

    info!(
        jumps = summary.total_jumps(),
        signals = signals.signal_count(),
        last_signal = ?signals.last_signal(),
        "jumpmon finished"
    );
    Ok(summary)
}
