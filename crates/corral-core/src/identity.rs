//! Identity verification: is the recorded PID still our process?
//!
//! PIDs are recycled by the OS, so "a process with this PID exists" never
//! proves it is the process we launched. The disambiguator is the OS-reported
//! process start time captured at launch; a mismatch means the PID now
//! belongs to a stranger and the meta record can never resolve again.

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::warn;

use crate::meta::MetaRecord;

/// Allowed skew between the recorded and observed start time, absorbing
/// the coarser of the platforms' process-start-time clocks.
pub const START_TIME_TOLERANCE_SECS: u64 = 2;

/// Liveness of a recorded process identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// PID exists and its start time matches the fingerprint
    Running,
    /// PID exists but belongs to a different process now
    Reused { observed_start: u64 },
    /// No process with that PID
    Dead,
}

impl Liveness {
    pub fn is_running(self) -> bool {
        matches!(self, Liveness::Running)
    }
}

/// Query the OS for the start time (epoch seconds) of `pid`.
///
/// Returns `None` when no such process exists. Unreaped zombies still
/// answer, which makes this reliable for fingerprinting a child right
/// after spawn even if it died immediately. The time comes from the
/// process table, never from the wall clock at call time.
pub fn probe_start_time(pid: u32) -> Option<u64> {
    probe(pid).map(|(start_time, _)| start_time)
}

fn probe(pid: u32) -> Option<(u64, ProcessStatus)> {
    let mut system = System::new();
    let target = Pid::from_u32(pid);
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[target]),
        true,
        ProcessRefreshKind::everything(),
    );
    system
        .process(target)
        .map(|process| (process.start_time(), process.status()))
}

/// Verify a meta record against the live process table.
///
/// A zombie is an exited process awaiting its parent, so it counts as
/// dead here even though the PID is still in the table.
pub fn verify(record: &MetaRecord) -> Liveness {
    match probe(record.pid) {
        None => Liveness::Dead,
        Some((_, ProcessStatus::Zombie)) => Liveness::Dead,
        Some((observed, _)) => {
            if observed.abs_diff(record.start_time) <= START_TIME_TOLERANCE_SECS {
                Liveness::Running
            } else {
                warn!(
                    name = %record.name,
                    pid = record.pid,
                    recorded_start = record.start_time,
                    observed_start = observed,
                    "PID has been reused by an unrelated process"
                );
                Liveness::Reused {
                    observed_start: observed,
                }
            }
        }
    }
}
