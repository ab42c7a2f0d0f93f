//! Lifecycle controller for a monitoring run.
//!
//! The controller owns the configuration, the clock, the output sink and the
//! shutdown signal, and drives the run through
//! IDLE → RUNNING → STOPPING → JOINED:
//!
//! 1. Probe the clock, then spawn one pinned thread per selected CPU
//! 2. Wait for the configured duration or an external stop request
//! 3. Trigger the shutdown signal and join every worker
//!
//! Workers are scoped threads, so they borrow the controller's state instead
//! of sharing ownership of it.

use crate::realtime::online_cpus;
use crate::shutdown::ShutdownSignal;
use crate::sink::JumpSink;
use crate::worker::{Worker, WorkerSummary};
use jump_common::config::MonitorConfig;
use jump_common::error::{JumpError, JumpResult};
use jump_common::state::{LifecycleState, StateMachine};
use jump_common::time::{MonotonicClock, RawMonotonicClock};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How often the controller re-checks the external stop request.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why the controller left RUNNING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured run duration elapsed.
    DurationElapsed,
    /// The external stop predicate asked for shutdown.
    External,
    /// Startup failed part-way; already spawned workers were stopped.
    Aborted,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Why the run ended.
    pub stop_reason: StopReason,
    /// Summaries of workers that exited cleanly, in CPU order.
    pub workers: Vec<WorkerSummary>,
    /// Workers that failed (pinning, clock, panic).
    pub failures: Vec<JumpError>,
    /// Time from spawning the workers to the end of the join.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Total jumps reported across all workers.
    #[must_use]
    pub fn total_jumps(&self) -> u64 {
        self.workers.iter().map(|w| w.jumps).sum()
    }

    /// True if every spawned worker exited cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives workers through one monitoring run.
pub struct Monitor<C: MonotonicClock = RawMonotonicClock> {
    config: MonitorConfig,
    clock: C,
    sink: Arc<dyn JumpSink>,
    shutdown: ShutdownSignal,
    state: StateMachine,
}

impl Monitor<RawMonotonicClock> {
    /// Create a monitor sampling the raw monotonic clock.
    pub fn new(config: MonitorConfig, sink: Arc<dyn JumpSink>) -> Self {
        Self::with_clock(config, RawMonotonicClock, sink)
    }
}

impl<C: MonotonicClock> Monitor<C> {
    /// Create a monitor with a custom clock.
    pub fn with_clock(config: MonitorConfig, clock: C, sink: Arc<dyn JumpSink>) -> Self {
        Self {
            config,
            clock,
            sink,
            shutdown: ShutdownSignal::new(),
            state: StateMachine::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state.state()
    }

    /// Configuration this monitor runs with.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Online CPUs matching the configured selection.
    pub fn selected_cpus(&self) -> Vec<usize> {
        self.config.cpus.resolve(&online_cpus())
    }

    /// Run one worker per entry of `cpus` until the duration elapses or
    /// `stop_requested` returns true, then join them all.
    ///
    /// With a zero duration only `stop_requested` ends the run. Worker
    /// failures do not stop sibling workers; they are collected into
    /// [`RunSummary::failures`].
    ///
    /// # Errors
    ///
    /// - [`JumpError::Clock`] if the clock cannot be read before spawning
    /// - [`JumpError::Resource`] if the worker table cannot be allocated
    /// - [`JumpError::Spawn`] if a thread cannot be created (after the
    ///   already-running workers have been stopped and joined)
    /// - [`JumpError::InvalidStateTransition`] if the monitor already ran
    pub fn run<F>(&mut self, cpus: &[usize], stop_requested: F) -> JumpResult<RunSummary>
    where
        F: FnMut() -> bool,
    {
        if self.state.state() != LifecycleState::Idle {
            return Err(JumpError::InvalidStateTransition {
                from: self.state.state().to_string(),
                to: LifecycleState::Running.to_string(),
            });
        }

        let Self {
            config,
            clock,
            sink,
            shutdown,
            state,
        } = self;

        // A broken clock is a startup failure, not one failure per CPU
        clock.now_ns()?;

        let threshold_ns = config.threshold_ns();
        let run_limit = config.run_limit();
        let clock: &C = clock;
        let sink: &dyn JumpSink = sink.as_ref();
        let shutdown: &ShutdownSignal = shutdown;

        info!(
            threshold_us = threshold_ns / 1_000,
            cpus = ?cpus,
            duration = ?run_limit,
            "Starting workers"
        );

        thread::scope(|scope| {
            let mut handles = Vec::new();
            handles.try_reserve_exact(cpus.len()).map_err(|e| {
                JumpError::Resource(format!("worker table for {} CPUs: {e}", cpus.len()))
            })?;
            state.transition(LifecycleState::Running)?;

            let mut spawn_error = None;
            for &cpu in cpus {
                let worker = Worker::new(cpu, threshold_ns, clock, sink, shutdown);
                match thread::Builder::new()
                    .name(format!("jump-cpu{cpu}"))
                    .spawn_scoped(scope, move || worker.run())
                {
                    Ok(handle) => handles.push((cpu, handle)),
                    Err(e) => {
                        error!(cpu, error = %e, "Failed to spawn worker thread");
                        spawn_error = Some(JumpError::Spawn {
                            cpu,
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
            let started = Instant::now();

            let stop_reason = if spawn_error.is_some() {
                StopReason::Aborted
            } else {
                if handles.is_empty() {
                    warn!("No online CPU matches the selection, running without workers");
                } else {
                    info!(workers = handles.len(), "Workers running");
                }
                wait_for_stop(run_limit, started, stop_requested)
            };

            // Workers must see the signal before anything below can bail out
            shutdown.trigger();
            state.transition(LifecycleState::Stopping)?;
            debug!(?stop_reason, "Stopping workers");

            let mut workers = Vec::with_capacity(handles.len());
            let mut failures = Vec::new();
            for (cpu, handle) in handles {
                match handle.join() {
                    Ok(Ok(summary)) => workers.push(summary),
                    Ok(Err(e)) => failures.push(e),
                    Err(_) => {
                        error!(cpu, "Worker thread panicked");
                        failures.push(JumpError::WorkerPanic { cpu });
                    }
                }
            }
            state.transition(LifecycleState::Joined)?;

            if let Some(e) = spawn_error {
                return Err(e);
            }

            let summary = RunSummary {
                stop_reason,
                workers,
                failures,
                elapsed: started.elapsed(),
            };
            info!(
                ?stop_reason,
                workers = summary.workers.len(),
                failed = summary.failures.len(),
                jumps = summary.total_jumps(),
                elapsed_ms = summary.elapsed.as_millis(),
                "All workers joined"
            );
            Ok(summary)
        })
    }
}

/// Block until `limit` has elapsed since `started` or `stop_requested` fires.
fn wait_for_stop<F>(limit: Option<Duration>, started: Instant, mut stop_requested: F) -> StopReason
where
    F: FnMut() -> bool,
{
    loop {
        if stop_requested() {
            return StopReason::External;
        }

        let nap = match limit {
            Some(limit) => {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return StopReason::DurationElapsed;
                }
                (limit - elapsed).min(STOP_POLL_INTERVAL)
            }
            None => STOP_POLL_INTERVAL,
        };
        thread::sleep(nap);
    }
}
