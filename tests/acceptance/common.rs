//! Common utilities for integration tests.
//!
//! Provides helpers for:
//! - Checking privileges and the freeze control surface
//! - Picking CPUs the test process may actually pin to
//! - Running a monitor and collecting its reports

#![allow(dead_code)] // Not every helper is used by every test module

use freeze_ctl::FreezeControl;
use jump_common::config::{CpuSelection, MonitorConfig};
use jump_common::event::JumpEvent;
use jump_monitor::controller::{Monitor, RunSummary};
use jump_monitor::realtime::{allowed_cpus, online_cpus};
use jump_monitor::sink::MemorySink;
use std::sync::Arc;
use std::time::Duration;

/// Check if running as root (required for the freeze module).
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Check if the freeze control surface is present.
pub fn freeze_available() -> bool {
    FreezeControl::default().ensure_available().is_ok()
}

/// Check all prerequisites for freeze injection tests.
pub fn check_freeze_prerequisites() -> Result<(), String> {
    let mut errors = Vec::new();

    if !is_root() {
        errors.push("Not running as root - debugfs is not writable");
    }
    if !freeze_available() {
        errors.push("system_freeze module not loaded or debugfs not mounted");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Online CPUs this process is allowed to pin to.
pub fn usable_cpus() -> Vec<usize> {
    let allowed = allowed_cpus().unwrap_or_default();
    online_cpus()
        .into_iter()
        .filter(|cpu| allowed.contains(cpu))
        .collect()
}

/// Build a monitor configuration.
pub fn config(threshold: Duration, cpus: CpuSelection, duration: Duration) -> MonitorConfig {
    MonitorConfig {
        threshold,
        cpus,
        duration,
        lock_memory: false,
    }
}

/// Run a monitor on `cpus` until its duration elapses.
pub fn run_monitor(config: MonitorConfig, cpus: &[usize]) -> (RunSummary, Vec<JumpEvent>) {
    let sink = Arc::new(MemorySink::new());
    let mut monitor = Monitor::new(config, sink.clone());
    let summary = monitor.run(cpus, || false).expect("monitor run failed");
    (summary, sink.events())
}

/// Print a short per-CPU report.
pub fn print_summary(summary: &RunSummary) {
    println!("Stop reason: {:?}", summary.stop_reason);
    println!("Elapsed: {:?}", summary.elapsed);
    for worker in &summary.workers {
        println!(
            "  CPU {:>3}: {} polls, {} jumps, max gap {} us",
            worker.cpu,
            worker.polls,
            worker.jumps,
            worker.max_gap_ns / 1_000
        );
    }
    for failure in &summary.failures {
        println!("  FAILED: {failure}");
    }
}
