//! Monotonic time sources for jump detection.
//!
//! All gap arithmetic runs on a raw monotonic timebase: it never goes
//! backwards and is not slewed by NTP or stepped by `settimeofday`. Wall-clock
//! time is only ever used to label a report, see [`crate::event`].

use crate::error::{JumpError, JumpResult};
use nix::time::{clock_gettime, ClockId};

/// Nanoseconds per second.
pub const NS_PER_SEC: u64 = 1_000_000_000;
/// Nanoseconds per millisecond.
pub const NS_PER_MSEC: u64 = 1_000_000;
/// Nanoseconds per microsecond.
pub const NS_PER_USEC: u64 = 1_000;

/// A source of monotonic timestamps in nanoseconds.
///
/// Implementations are shared by reference between all workers and must be
/// cheap to read: `now_ns` sits in the busy-poll loop.
pub trait MonotonicClock: Sync {
    /// Read the current timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`JumpError::Clock`] if the underlying source is unavailable.
    fn now_ns(&self) -> JumpResult<u64>;
}

/// `CLOCK_MONOTONIC_RAW` on Linux, `CLOCK_MONOTONIC` elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMonotonicClock;

impl RawMonotonicClock {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    const ID: ClockId = ClockId::CLOCK_MONOTONIC_RAW;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    const ID: ClockId = ClockId::CLOCK_MONOTONIC;

    /// Name of the underlying clock, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        if cfg!(any(target_os = "linux", target_os = "android")) {
            "CLOCK_MONOTONIC_RAW"
        } else {
            "CLOCK_MONOTONIC"
        }
    }
}

impl MonotonicClock for RawMonotonicClock {
    #[inline]
    fn now_ns(&self) -> JumpResult<u64> {
        let ts = clock_gettime(Self::ID)
            .map_err(|e| JumpError::Clock(format!("clock_gettime({}): {e}", self.name())))?;
        Ok(timespec_to_ns(ts.tv_sec(), ts.tv_nsec()))
    }
}

/// Collapse a `timespec` pair into nanoseconds.
#[inline]
#[allow(clippy::cast_sign_loss)] // monotonic clocks never report negative fields
#[must_use]
pub fn timespec_to_ns(sec: i64, nsec: i64) -> u64 {
    (sec as u64)
        .wrapping_mul(NS_PER_SEC)
        .wrapping_add(nsec as u64)
}
