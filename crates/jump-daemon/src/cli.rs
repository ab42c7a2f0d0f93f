//! Command-line surface and configuration loading.
//!
//! Flags override values from an optional TOML file, which override the
//! built-in defaults. The merged configuration is validated once.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use jump_common::config::{threshold_from_millis, ConfigError, CpuSelection, MonitorConfig};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "JUMPMON_CONFIG";

/// jumpmon command-line arguments.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "jumpmon",
    about = "Detect monotonic clock jumps (stalls, SMIs, hypervisor pauses) on each CPU",
    version,
    long_about = None,
    after_help = "\
EXAMPLES:
    jumpmon                         Monitor every online CPU with a 100 ms threshold
    jumpmon -t 50 -c 0x5 -d 60      CPUs 0 and 2, 50 ms threshold, stop after a minute"
)]
pub struct Args {
    /// Threshold in milliseconds [default: 100]
    #[arg(long, short = 't', value_name = "MS", allow_negative_numbers = true)]
    pub threshold: Option<i64>,

    /// CPU mask in hex (CPUs 0-63) or 'all' [default: all]
    #[arg(long, short = 'c', value_name = "MASK|all")]
    pub cpus: Option<CpuSelection>,

    /// Test duration in seconds, 0 runs until interrupted [default: 0]
    #[arg(long, short = 'd', value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// Path to a TOML configuration file (also read from JUMPMON_CONFIG).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Lock all memory pages before starting workers.
    #[arg(long)]
    pub lock_memory: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    pub log_level: String,
}

/// Result of parsing the command line.
#[derive(Debug)]
pub enum Parsed {
    /// Arguments are well-formed; go on to load the configuration.
    Run(Args),
    /// Help or version requested: print to stdout and exit successfully.
    Help(String),
    /// Malformed arguments: print to stderr and exit with failure.
    Invalid(String),
}

/// Parse an argument vector (including the program name).
pub fn parse<I, T>(argv: I) -> Parsed
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(argv) {
        Ok(args) => Parsed::Run(args),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            Parsed::Help(e.render().to_string())
        }
        Err(e) => Parsed::Invalid(format!("{}\n{}", e.render(), usage())),
    }
}

/// Full usage text.
pub fn usage() -> String {
    Args::command().render_help().to_string()
}

impl Args {
    /// Configuration file to load, if any.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    }

    /// Overlay the flags that were given onto `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThreshold`] for a non-positive threshold.
    pub fn apply(&self, config: &mut MonitorConfig) -> Result<(), ConfigError> {
        if let Some(ms) = self.threshold {
            config.threshold = threshold_from_millis(ms)?;
        }
        if let Some(cpus) = self.cpus {
            config.cpus = cpus;
        }
        if let Some(secs) = self.duration {
            config.duration = Duration::from_secs(secs);
        }
        if self.lock_memory {
            config.lock_memory = true;
        }
        Ok(())
    }
}

/// Build the validated run configuration.
///
/// # Errors
///
/// Returns an error if the configuration file cannot be loaded or the merged
/// values are invalid.
pub fn load_config(args: &Args) -> Result<MonitorConfig, ConfigError> {
    let mut config = match args.config_path() {
        Some(path) => {
            info!(?path, "Loading config file");
            MonitorConfig::from_file(&path)?
        }
        None => MonitorConfig::default(),
    };

    args.apply(&mut config)?;
    config.validate()?;
    Ok(config)
}
