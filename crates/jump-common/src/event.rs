//! Jump reports.
//!
//! A [`JumpEvent`] is produced by a worker whenever two consecutive polls are
//! at least the threshold apart, and is rendered as exactly one output line:
//!
//! ```text
//! [CPU 3] [2026-01-01 12:00:00] Jump: 501234 us
//! ```

use crate::time::NS_PER_USEC;
use chrono::{DateTime, Local};
use std::fmt;

/// Timestamp layout used in report lines.
pub const WALL_CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A detected gap in monotonic time progression on one CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpEvent {
    /// CPU the gap was observed on.
    pub cpu: usize,
    /// Observed gap between consecutive polls in nanoseconds.
    pub gap_ns: u64,
    /// Local wall-clock time at detection (display only).
    pub detected_at: DateTime<Local>,
}

impl JumpEvent {
    /// Create an event stamped with the current wall-clock time.
    #[must_use]
    pub fn now(cpu: usize, gap_ns: u64) -> Self {
        Self {
            cpu,
            gap_ns,
            detected_at: Local::now(),
        }
    }

    /// Observed gap in whole microseconds (truncated).
    #[must_use]
    pub fn gap_us(&self) -> u64 {
        self.gap_ns / NS_PER_USEC
    }
}

impl fmt::Display for JumpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[CPU {}] [{}] Jump: {} us",
            self.cpu,
            self.detected_at.format(WALL_CLOCK_FORMAT),
            self.gap_us()
        )
    }
}
