//! Per-CPU busy-poll worker.
//!
//! Each worker pins itself to one CPU, then reads the raw monotonic clock in
//! a tight loop. Whenever two consecutive reads are at least the threshold
//! apart the CPU was not executing the loop for that long, and a
//! [`JumpEvent`] is emitted.
//!
//! The loop never sleeps or yields. Steady-state iterations do not allocate,
//! lock or log; the only shared memory touched is the read-mostly
//! [`ShutdownSignal`].

use crate::realtime::pin_current_thread;
use crate::shutdown::ShutdownSignal;
use crate::sink::JumpSink;
use jump_common::error::JumpResult;
use jump_common::event::JumpEvent;
use jump_common::time::{MonotonicClock, NS_PER_USEC};
use tracing::{debug, error, warn};

/// Statistics a worker returns when it is joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    /// CPU the worker was pinned to.
    pub cpu: usize,
    /// Clock reads performed inside the loop.
    pub polls: u64,
    /// Jumps reported.
    pub jumps: u64,
    /// Largest gap observed between two polls, reported or not.
    pub max_gap_ns: u64,
}

impl WorkerSummary {
    fn new(cpu: usize) -> Self {
        Self {
            cpu,
            polls: 0,
            jumps: 0,
            max_gap_ns: 0,
        }
    }
}

/// One monitor thread's state.
///
/// Everything except the clock, sink and shutdown signal is private to the
/// worker.
pub struct Worker<'a, C: ?Sized> {
    cpu: usize,
    threshold_ns: u64,
    clock: &'a C,
    sink: &'a dyn JumpSink,
    shutdown: &'a ShutdownSignal,
}

impl<'a, C: MonotonicClock + ?Sized> Worker<'a, C> {
    /// Create a worker for `cpu`.
    pub fn new(
        cpu: usize,
        threshold_ns: u64,
        clock: &'a C,
        sink: &'a dyn JumpSink,
        shutdown: &'a ShutdownSignal,
    ) -> Self {
        Self {
            cpu,
            threshold_ns,
            clock,
            sink,
            shutdown,
        }
    }

    /// CPU this worker monitors.
    #[must_use]
    pub fn cpu(&self) -> usize {
        self.cpu
    }

    /// Pin the calling thread to the worker's CPU, then poll until shutdown.
    ///
    /// Failures are logged here, with the CPU attached, as soon as they happen
    /// rather than when the controller joins the thread.
    ///
    /// # Errors
    ///
    /// Returns a pinning or clock error; sibling workers are unaffected.
    pub fn run(self) -> JumpResult<WorkerSummary> {
        let cpu = self.cpu;

        if let Err(e) = pin_current_thread(cpu) {
            error!(cpu, error = %e, "Cannot pin worker, CPU will not be monitored");
            return Err(e);
        }

        match self.poll() {
            Ok(summary) => {
                debug!(
                    cpu,
                    polls = summary.polls,
                    jumps = summary.jumps,
                    max_gap_us = summary.max_gap_ns / NS_PER_USEC,
                    "Worker stopped"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(cpu, error = %e, "Clock read failed, worker stopped");
                Err(e)
            }
        }
    }

    /// The sample-and-compare loop, on whatever CPU the caller runs on.
    ///
    /// # Errors
    ///
    /// Returns the clock's error if a read fails.
    pub fn poll(&self) -> JumpResult<WorkerSummary> {
        let mut summary = WorkerSummary::new(self.cpu);
        let mut sink_failed = false;

        let mut prev_ns = self.clock.now_ns()?;
        while !self.shutdown.is_triggered() {
            let now_ns = self.clock.now_ns()?;
            let gap_ns = now_ns.saturating_sub(prev_ns);
            summary.polls += 1;
            summary.max_gap_ns = summary.max_gap_ns.max(gap_ns);

            if gap_ns >= self.threshold_ns {
                summary.jumps += 1;
                if let Err(e) = self.sink.emit(&JumpEvent::now(self.cpu, gap_ns)) {
                    if !sink_failed {
                        warn!(cpu = self.cpu, error = %e, "Failed to write jump report");
                        sink_failed = true;
                    }
                }
            }

            prev_ns = now_ns;
        }

        Ok(summary)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use jump_common::error::JumpError;
    use jump_common::time::NS_PER_MSEC;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays fixed timestamps and triggers shutdown on the last one.
    pub(crate) struct ScriptedClock<'a> {
        ticks: Vec<u64>,
        cursor: AtomicUsize,
        shutdown: &'a ShutdownSignal,
    }

    impl<'a> ScriptedClock<'a> {
        pub(crate) fn new(ticks: Vec<u64>, shutdown: &'a ShutdownSignal) -> Self {
            assert!(ticks.len() >= 2);
            Self {
                ticks,
                cursor: AtomicUsize::new(0),
                shutdown,
            }
        }

        fn from_gaps(gaps: &[u64], shutdown: &'a ShutdownSignal) -> Self {
            let mut ticks = vec![1_000];
            for gap in gaps {
                ticks.push(ticks.last().unwrap() + gap);
            }
            Self::new(ticks, shutdown)
        }
    }

    impl MonotonicClock for ScriptedClock<'_> {
        fn now_ns(&self) -> JumpResult<u64> {
            let i = self.cursor.fetch_add(1, Ordering::Relaxed);
            let last = self.ticks.len() - 1;
            if i >= last {
                self.shutdown.trigger();
            }
            Ok(self.ticks[i.min(last)])
        }
    }

    /// Fails after a number of successful reads.
    struct FailingClock {
        remaining: AtomicUsize,
    }

    impl MonotonicClock for FailingClock {
        fn now_ns(&self) -> JumpResult<u64> {
            let left = self.remaining.load(Ordering::Relaxed);
            if left == 0 {
                return Err(JumpError::Clock("clock_gettime: EINVAL".into()));
            }
            self.remaining.store(left - 1, Ordering::Relaxed);
            Ok(42)
        }
    }

    /// Refuses every write and counts the attempts.
    struct FailingSink {
        attempts: AtomicUsize,
    }

    impl JumpSink for FailingSink {
        fn emit(&self, _event: &JumpEvent) -> std::io::Result<()> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_reports_gaps_at_or_above_threshold() {
        let shutdown = ShutdownSignal::new();
        let sink = MemorySink::new();
        let gaps = [
            10 * NS_PER_MSEC,
            150 * NS_PER_MSEC,
            99 * NS_PER_MSEC,
            100 * NS_PER_MSEC,
            1_000,
        ];
        let clock = ScriptedClock::from_gaps(&gaps, &shutdown);

        let summary = Worker::new(3, 100 * NS_PER_MSEC, &clock, &sink, &shutdown)
            .poll()
            .unwrap();

        let reported: Vec<u64> = sink.events().iter().map(|e| e.gap_ns).collect();
        assert_eq!(reported, vec![150 * NS_PER_MSEC, 100 * NS_PER_MSEC]);
        assert!(sink.events().iter().all(|e| e.cpu == 3));
        assert_eq!(summary.polls, gaps.len() as u64);
        assert_eq!(summary.jumps, 2);
        assert_eq!(summary.max_gap_ns, 150 * NS_PER_MSEC);
    }

    #[test]
    fn test_never_reports_below_threshold() {
        // Deterministic pseudo-random gaps spread around the threshold
        let threshold = 5 * NS_PER_MSEC;
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let gaps: Vec<u64> = (0..5_000)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                (state >> 33) % (2 * threshold)
            })
            .collect();
        let expected = gaps.iter().filter(|&&g| g >= threshold).count();

        let shutdown = ShutdownSignal::new();
        let sink = MemorySink::new();
        let clock = ScriptedClock::from_gaps(&gaps, &shutdown);
        Worker::new(0, threshold, &clock, &sink, &shutdown)
            .poll()
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), expected);
        assert!(events.iter().all(|e| e.gap_ns >= threshold));
    }

    #[test]
    fn test_sink_failure_does_not_stop_monitoring() {
        let shutdown = ShutdownSignal::new();
        let sink = FailingSink {
            attempts: AtomicUsize::new(0),
        };
        let gaps = [
            200 * NS_PER_MSEC,
            10,
            300 * NS_PER_MSEC,
            10,
            150 * NS_PER_MSEC,
            100 * NS_PER_MSEC,
            10,
        ];
        let clock = ScriptedClock::from_gaps(&gaps, &shutdown);

        let summary = Worker::new(2, 100 * NS_PER_MSEC, &clock, &sink, &shutdown)
            .poll()
            .unwrap();

        // Every jump is still counted and offered to the sink
        assert_eq!(summary.jumps, 4);
        assert_eq!(sink.attempts.load(Ordering::Relaxed), 4);
        // The loop ran through the whole script up to shutdown
        assert_eq!(summary.polls, gaps.len() as u64);
        assert_eq!(summary.max_gap_ns, 300 * NS_PER_MSEC);
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_window_slides_after_jump() {
        // One long stall followed by short gaps: only the stall is reported
        let shutdown = ShutdownSignal::new();
        let sink = MemorySink::new();
        let clock = ScriptedClock::from_gaps(&[500 * NS_PER_MSEC, 10, 10, 10], &shutdown);

        Worker::new(1, NS_PER_MSEC, &clock, &sink, &shutdown)
            .poll()
            .unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.events()[0].gap_us(), 500_000);
    }

    #[test]
    fn test_stops_immediately_when_already_signalled() {
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        let sink = MemorySink::new();
        let clock = FailingClock {
            remaining: AtomicUsize::new(1),
        };

        let summary = Worker::new(0, 1, &clock, &sink, &shutdown).poll().unwrap();
        assert_eq!(summary.polls, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_clock_failure_is_fatal() {
        let shutdown = ShutdownSignal::new();
        let sink = MemorySink::new();
        let clock = FailingClock {
            remaining: AtomicUsize::new(5),
        };

        let err = Worker::new(0, 1, &clock, &sink, &shutdown)
            .poll()
            .unwrap_err();
        assert!(matches!(err, JumpError::Clock(_)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_run_pin_failure_reports_cpu() {
        let shutdown = ShutdownSignal::new();
        let sink = MemorySink::new();
        let clock = jump_common::time::RawMonotonicClock;
        let cpu = nix::sched::CpuSet::count() + 7;

        let err = std::thread::scope(|s| {
            s.spawn(|| Worker::new(cpu, NS_PER_MSEC, &clock, &sink, &shutdown).run())
                .join()
                .unwrap()
        })
        .unwrap_err();

        assert_eq!(err.cpu(), Some(cpu));
        assert!(matches!(err, JumpError::Pinning { .. }));
        assert!(!shutdown.is_triggered());
    }
}
