//! CPU topology, affinity and memory locking.
//!
//! Provides the platform glue a worker needs before it starts timing:
//! - Online CPU discovery (sysfs, falling back to `sysconf`)
//! - Exclusive pinning of the calling thread to one CPU, verified by read-back
//! - Memory locking (mlockall) so page faults do not show up as jumps

#![allow(unused_imports)] // Platform-specific code may not use all imports

use jump_common::error::{JumpError, JumpResult};
use tracing::{debug, info, warn};

/// sysfs file listing online CPUs, e.g. `0-3,6`.
pub const ONLINE_CPUS_PATH: &str = "/sys/devices/system/cpu/online";

/// List the online CPUs in ascending order.
///
/// Reads [`ONLINE_CPUS_PATH`] so that holes left by offlined CPUs are
/// honoured; falls back to `0..sysconf(_SC_NPROCESSORS_ONLN)`.
#[must_use]
pub fn online_cpus() -> Vec<usize> {
    match std::fs::read_to_string(ONLINE_CPUS_PATH)
        .ok()
        .and_then(|content| parse_cpu_list(&content))
    {
        Some(cpus) if !cpus.is_empty() => cpus,
        _ => {
            let count = online_cpu_count();
            debug!(count, "Online CPU list unavailable, assuming contiguous CPUs");
            (0..count).collect()
        }
    }
}

/// Parse a kernel CPU list such as `0-3,6,8-9`.
///
/// Returns `None` on malformed input.
#[must_use]
pub fn parse_cpu_list(list: &str) -> Option<Vec<usize>> {
    let mut cpus = Vec::new();
    for part in list.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: usize = lo.trim().parse().ok()?;
                let hi: usize = hi.trim().parse().ok()?;
                if lo > hi {
                    return None;
                }
                cpus.extend(lo..=hi);
            }
            None => cpus.push(part.trim().parse().ok()?),
        }
    }
    cpus.sort_unstable();
    cpus.dedup();
    Some(cpus)
}

/// Number of online CPUs according to `sysconf`.
fn online_cpu_count() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf has no preconditions
        let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
        if let Ok(n) = usize::try_from(n) {
            if n > 0 {
                return n;
            }
        }
    }
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Pin the calling thread exclusively to `cpu`.
///
/// The affinity is read back afterwards; anything other than exactly `{cpu}`
/// is an error, so a worker never measures on the wrong CPU.
///
/// # Errors
///
/// Returns [`JumpError::Pinning`] if the CPU index is out of range, offline,
/// outside the allowed cpuset, or the platform has no affinity support.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) -> JumpResult<()> {
    use nix::sched::{sched_getaffinity, sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let pinning = |reason: String| JumpError::Pinning { cpu, reason };

    let mut cpu_set = CpuSet::new();
    cpu_set
        .set(cpu)
        .map_err(|e| pinning(format!("invalid CPU index: {e}")))?;

    // Pid 0 addresses the calling thread
    sched_setaffinity(Pid::from_raw(0), &cpu_set)
        .map_err(|e| pinning(format!("sched_setaffinity failed: {e}")))?;

    let actual = sched_getaffinity(Pid::from_raw(0))
        .map_err(|e| pinning(format!("sched_getaffinity failed: {e}")))?;
    let exact = (0..CpuSet::count()).all(|c| actual.is_set(c).unwrap_or(false) == (c == cpu));
    if !exact {
        return Err(pinning("affinity read-back does not match".into()));
    }

    debug!(cpu, "Worker pinned");
    Ok(())
}

/// Pinning is unsupported off Linux.
///
/// # Errors
///
/// Always returns [`JumpError::Pinning`] naming `cpu`.
#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(cpu: usize) -> JumpResult<()> {
    Err(JumpError::Pinning {
        cpu,
        reason: "CPU affinity not available on this platform".into(),
    })
}

/// CPUs the calling thread is currently allowed to run on.
///
/// # Errors
///
/// Returns [`JumpError::Pinning`] if the affinity mask cannot be read.
#[cfg(target_os = "linux")]
pub fn allowed_cpus() -> JumpResult<Vec<usize>> {
    use nix::sched::{sched_getaffinity, CpuSet};
    use nix::unistd::Pid;

    let set = sched_getaffinity(Pid::from_raw(0)).map_err(|e| JumpError::Pinning {
        cpu: 0,
        reason: format!("sched_getaffinity failed: {e}"),
    })?;
    Ok((0..CpuSet::count())
        .filter(|&c| set.is_set(c).unwrap_or(false))
        .collect())
}

/// Without affinity support every online CPU counts as allowed.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(target_os = "linux"))]
pub fn allowed_cpus() -> JumpResult<Vec<usize>> {
    Ok(online_cpus())
}

/// Lock all current and future memory pages.
///
/// Returns `Ok(false)` when the process lacks `CAP_IPC_LOCK`.
///
/// # Errors
///
/// Returns [`JumpError::Resource`] for any failure other than `EPERM`.
#[cfg(target_os = "linux")]
pub fn lock_memory() -> JumpResult<bool> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    debug!("Locking memory pages with mlockall");

    match mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        Ok(()) => {
            info!("Memory locked successfully");
            Ok(true)
        }
        Err(nix::errno::Errno::EPERM) => {
            warn!(
                "mlockall failed with EPERM - running without CAP_IPC_LOCK capability. \
                 Page faults may be reported as jumps."
            );
            Ok(false)
        }
        Err(e) => Err(JumpError::Resource(format!("mlockall failed: {e}"))),
    }
}

/// Memory locking is unsupported off Linux; logs a warning and returns `Ok(false)`.
///
/// # Errors
///
/// Never fails on this platform.
#[cfg(not(target_os = "linux"))]
pub fn lock_memory() -> JumpResult<bool> {
    warn!("mlockall not available on this platform");
    Ok(false)
}
