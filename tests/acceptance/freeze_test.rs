//! Freeze injection acceptance tests.
//!
//! The system_freeze module halts every CPU for `duration_ms` when triggered;
//! each worker must then report exactly one jump of about that length.
//!
//! # Requirements
//!
//! - Root privileges
//! - system_freeze module loaded, debugfs mounted

use super::common::{check_freeze_prerequisites, config, print_summary, usable_cpus};
use freeze_ctl::{FreezeControl, FreezeError};
use jump_common::config::CpuSelection;
use jump_monitor::controller::Monitor;
use jump_monitor::sink::MemorySink;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

const FREEZE_MS: u64 = 500;

/// Trigger values other than 1 never reach the control file.
#[test]
fn test_invalid_trigger_produces_no_write() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("duration_ms"), "500\n").unwrap();
    fs::write(dir.path().join("start"), "").unwrap();
    let control = FreezeControl::new(dir.path());

    for value in [0, 2] {
        assert!(matches!(
            control.trigger(value),
            Err(FreezeError::InvalidTrigger(v)) if v == value
        ));
    }
    assert_eq!(fs::read_to_string(dir.path().join("start")).unwrap(), "");
}

/// Out-of-range durations are refused before any write.
#[test]
fn test_duration_bound() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("duration_ms"), "0\n").unwrap();
    let control = FreezeControl::new(dir.path());

    assert!(matches!(
        control.set_duration_ms(15_000),
        Err(FreezeError::DurationOutOfRange(15_000))
    ));
    assert_eq!(control.duration_ms().unwrap(), 0);
}

/// A 500 ms freeze is reported once by every worker with a lower threshold.
#[test]
#[ignore = "Requires root and the system_freeze kernel module"]
fn test_induced_freeze_detected_on_every_cpu() {
    if let Err(e) = check_freeze_prerequisites() {
        eprintln!("Skipping test: {}", e);
        return;
    }

    let control = FreezeControl::default();
    assert!(matches!(
        control.set_duration_ms(15_000),
        Err(FreezeError::DurationOutOfRange(_))
    ));
    control.set_duration_ms(FREEZE_MS).expect("set duration");

    let cpus = usable_cpus();
    let sink = Arc::new(MemorySink::new());
    let mut monitor = Monitor::new(
        config(
            Duration::from_millis(100),
            CpuSelection::All,
            Duration::from_secs(3),
        ),
        sink.clone(),
    );

    let summary = std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_secs(1));
            control.trigger(1).expect("trigger freeze");
        });
        monitor.run(&cpus, || false).expect("monitor run")
    });
    print_summary(&summary);

    assert!(summary.is_clean());
    for worker in &summary.workers {
        assert_eq!(worker.jumps, 1, "CPU {} jump count", worker.cpu);
    }

    let events = sink.events();
    assert_eq!(events.len(), cpus.len());
    for event in &events {
        let gap_ms = event.gap_ns / 1_000_000;
        assert!(
            (FREEZE_MS - 50..=FREEZE_MS + 150).contains(&gap_ms),
            "CPU {} reported {} ms",
            event.cpu,
            gap_ms
        );
    }
}
