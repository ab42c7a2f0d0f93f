//! Client for the `system_freeze` debugfs control surface.
//!
//! The kernel side halts every CPU for a configured number of milliseconds
//! when `1` is written to its `start` file. This crate only drives that
//! interface; the freeze itself always happens in the kernel.
//!
//! ```text
//! /sys/kernel/debug/system_freeze/
//! ├── duration_ms   (rw, 0..=10000)
//! └── start         (wo, only "1" accepted)
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Default debugfs directory of the freeze module.
pub const DEFAULT_ROOT: &str = "/sys/kernel/debug/system_freeze";

/// Largest freeze the module accepts, in milliseconds.
pub const MAX_FREEZE_DURATION_MS: u64 = 10_000;

/// The only value that arms the one-shot trigger.
pub const TRIGGER_VALUE: u64 = 1;

const DURATION_FILE: &str = "duration_ms";
const START_FILE: &str = "start";

/// Errors raised while talking to the control surface.
#[derive(Debug, Error)]
pub enum FreezeError {
    /// Requested duration exceeds [`MAX_FREEZE_DURATION_MS`].
    #[error("freeze duration {0} ms exceeds the {max} ms limit", max = MAX_FREEZE_DURATION_MS)]
    DurationOutOfRange(u64),

    /// Trigger value other than [`TRIGGER_VALUE`].
    #[error("invalid trigger value {0}: only {one} starts a freeze", one = TRIGGER_VALUE)]
    InvalidTrigger(u64),

    /// The control directory does not exist (module not loaded, debugfs not mounted).
    #[error("freeze control surface not available at {path}")]
    NotAvailable {
        /// Directory that was expected.
        path: PathBuf,
    },

    /// The kernel refused the written value.
    #[error("{path} rejected value {value}")]
    Rejected {
        /// Control file written to.
        path: PathBuf,
        /// Value that was refused.
        value: u64,
    },

    /// Any other I/O failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Control file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// `duration_ms` did not contain a number.
    #[error("unexpected contents in {path}: {content:?}")]
    Malformed {
        /// Control file read.
        path: PathBuf,
        /// What was found.
        content: String,
    },
}

/// Convenience type alias for freeze control operations.
pub type FreezeResult<T> = Result<T, FreezeError>;

/// Handle to one freeze control directory.
#[derive(Debug, Clone)]
pub struct FreezeControl {
    root: PathBuf,
}

impl Default for FreezeControl {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl FreezeControl {
    /// Use the control directory at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Control directory in use.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that the control directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`FreezeError::NotAvailable`] otherwise.
    pub fn ensure_available(&self) -> FreezeResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(FreezeError::NotAvailable {
                path: self.root.clone(),
            })
        }
    }

    /// Currently configured freeze duration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a number.
    pub fn duration_ms(&self) -> FreezeResult<u64> {
        self.ensure_available()?;
        let path = self.root.join(DURATION_FILE);
        let content = fs::read_to_string(&path).map_err(|source| FreezeError::Io {
            path: path.clone(),
            source,
        })?;
        content.trim().parse().map_err(|_| FreezeError::Malformed {
            path,
            content,
        })
    }

    /// Configure how long the next freeze lasts.
    ///
    /// Values above [`MAX_FREEZE_DURATION_MS`] are refused without touching
    /// the control file.
    ///
    /// # Errors
    ///
    /// Returns [`FreezeError::DurationOutOfRange`] or the write failure.
    pub fn set_duration_ms(&self, ms: u64) -> FreezeResult<()> {
        if ms > MAX_FREEZE_DURATION_MS {
            return Err(FreezeError::DurationOutOfRange(ms));
        }
        self.ensure_available()?;
        self.write_value(DURATION_FILE, ms)?;
        info!(duration_ms = ms, "Freeze duration configured");
        Ok(())
    }

    /// Fire the one-shot trigger.
    ///
    /// With the real module this call returns only after every CPU has been
    /// halted for the configured duration. Values other than
    /// [`TRIGGER_VALUE`] are refused without touching the control file.
    ///
    /// # Errors
    ///
    /// Returns [`FreezeError::InvalidTrigger`] or the write failure.
    pub fn trigger(&self, value: u64) -> FreezeResult<()> {
        if value != TRIGGER_VALUE {
            return Err(FreezeError::InvalidTrigger(value));
        }
        self.ensure_available()?;
        info!(root = %self.root.display(), "Triggering system freeze");
        self.write_value(START_FILE, value)
    }

    fn write_value(&self, file: &str, value: u64) -> FreezeResult<()> {
        let path = self.root.join(file);
        debug!(path = %path.display(), value, "Writing control file");
        // debugfs attributes want a single write of the whole value
        fs::write(&path, format!("{value}\n")).map_err(|source| {
            if source.raw_os_error() == Some(libc::EINVAL) {
                FreezeError::Rejected { path, value }
            } else {
                FreezeError::Io { path, source }
            }
        })
    }
}
