//! Destinations for jump reports.

use jump_common::event::JumpEvent;
use std::io::{self, Write};
use std::sync::Mutex;

/// Receives jump events from all workers.
///
/// Called concurrently from every worker thread; one call must produce one
/// indivisible record.
pub trait JumpSink: Send + Sync {
    /// Emit one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be written.
    fn emit(&self, event: &JumpEvent) -> io::Result<()>;
}

/// Writes one line per event to standard output.
///
/// The stdout lock is held for the whole line, so reports from different
/// CPUs never interleave mid-line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl JumpSink for StdoutSink {
    fn emit(&self, event: &JumpEvent) -> io::Result<()> {
        write_event(&mut io::stdout().lock(), event)
    }
}

/// Write `event` as one report line and flush it.
///
/// # Errors
///
/// Returns the writer's error.
pub fn write_event<W: Write>(out: &mut W, event: &JumpEvent) -> io::Result<()> {
    writeln!(out, "{event}")?;
    out.flush()
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<JumpEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far, in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<JumpEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    /// True if nothing has been emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JumpSink for MemorySink {
    fn emit(&self, event: &JumpEvent) -> io::Result<()> {
        self.events
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "event buffer poisoned"))?
            .push(*event);
        Ok(())
    }
}
