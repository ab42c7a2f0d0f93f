//! Write-once stop flag observed by every worker.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative shutdown signal.
///
/// Owned by the controller and lent to workers by shared reference. It moves
/// from "running" to "stop" exactly once. The flag sits on its own cache line
/// because every monitored CPU reads it on every poll.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    stop: CachePadded<AtomicBool>,
}

static_assertions::assert_impl_all!(ShutdownSignal: Send, Sync);

impl ShutdownSignal {
    /// Create a signal in the "running" state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Returns `true` only for the call that flipped the flag.
    pub fn trigger(&self) -> bool {
        !self.stop.swap(true, Ordering::Release)
    }

    /// Check whether shutdown has been requested.
    #[inline]
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}
