//! freeze-ctl: drive the `system_freeze` kernel module from the shell.
//!
//! Needs root and a mounted debugfs. Used to check that `jumpmon` reports
//! an induced machine-wide stall.

use anyhow::{Context, Result};
use clap::Parser;
use freeze_ctl::{FreezeControl, DEFAULT_ROOT};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "freeze-ctl",
    about = "Configure and trigger a machine-wide freeze via the system_freeze module",
    version,
    after_help = "\
EXAMPLES:
    sudo freeze-ctl --duration-ms 500 --trigger    Halt every CPU for 500 ms
    sudo freeze-ctl --show                         Print the configured duration"
)]
struct Args {
    /// debugfs directory of the module.
    #[arg(long, value_name = "DIR", default_value = DEFAULT_ROOT)]
    root: PathBuf,

    /// Freeze duration in milliseconds (at most 10000).
    #[arg(long, short = 'd', value_name = "MS")]
    duration_ms: Option<u64>,

    /// Fire the one-shot trigger (only 1 is accepted).
    #[arg(long, short = 't', value_name = "VALUE", num_args = 0..=1, default_missing_value = "1")]
    trigger: Option<u64>,

    /// Print the configured duration.
    #[arg(long, short = 's')]
    show: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "freeze_ctl={}",
                    args.log_level
                ))
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let control = FreezeControl::new(&args.root);

    if let Some(ms) = args.duration_ms {
        control
            .set_duration_ms(ms)
            .with_context(|| format!("Failed to set freeze duration to {ms} ms"))?;
    }

    if let Some(value) = args.trigger {
        let duration_ms = control.duration_ms().context("Failed to read freeze duration")?;
        info!(duration_ms, "Freezing all CPUs");
        control
            .trigger(value)
            .with_context(|| format!("Failed to trigger freeze with value {value}"))?;
        info!("Freeze finished");
    }

    let nothing_requested = args.duration_ms.is_none() && args.trigger.is_none();
    if args.show || nothing_requested {
        let duration_ms = control.duration_ms().context("Failed to read freeze duration")?;
        println!("{duration_ms}");
    }

    Ok(())
}
