//! Signal handling for an orderly stop.
//!
//! SIGINT and SIGTERM only set an atomic flag; the controller polls it and
//! performs the actual shutdown. Handlers are installed with `SA_RESETHAND`,
//! so a second signal falls back to the default action and kills the process.

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use tracing::debug;

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);
static SIGNAL_COUNT: AtomicU32 = AtomicU32::new(0);
static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);

// Async-signal-safe: atomics only
extern "C" fn on_stop_signal(signo: c_int) {
    LAST_SIGNAL.store(signo, Ordering::Relaxed);
    SIGNAL_COUNT.fetch_add(1, Ordering::Relaxed);
    STOP_REQUESTED.store(true, Ordering::Release);
}

/// Handle to the process-wide stop request.
#[derive(Debug, Clone, Copy)]
pub struct SignalHandler {
    _installed: (),
}

impl SignalHandler {
    /// Install handlers for SIGINT and SIGTERM.
    pub fn install() -> nix::Result<Self> {
        let action = SigAction::new(
            SigHandler::Handler(on_stop_signal),
            SaFlags::SA_RESTART | SaFlags::SA_RESETHAND,
            SigSet::empty(),
        );

        for signal in [Signal::SIGINT, Signal::SIGTERM] {
            // SAFETY: the handler only touches atomics
            unsafe { sigaction(signal, &action) }?;
        }

        debug!("Signal handlers registered");
        Ok(Self { _installed: () })
    }

    /// Check if a stop has been requested.
    #[inline]
    pub fn stop_requested(&self) -> bool {
        STOP_REQUESTED.load(Ordering::Acquire)
    }

    /// Request a stop without a signal.
    #[cfg(test)]
    pub fn request_stop(&self) {
        STOP_REQUESTED.store(true, Ordering::Release);
    }

    /// Number of stop signals delivered so far.
    pub fn signal_count(&self) -> u32 {
        SIGNAL_COUNT.load(Ordering::Relaxed)
    }

    /// Most recent signal delivered, if any.
    pub fn last_signal(&self) -> Option<Signal> {
        Signal::try_from(LAST_SIGNAL.load(Ordering::Relaxed)).ok()
    }
}
