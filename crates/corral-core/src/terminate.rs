//! Stop flow: graceful signal, bounded wait, forced escalation
//!
//! The whole process group gets SIGTERM first and a grace period to shut
//! down on its own terms. Only after the grace period expires does
//! SIGKILL go out. Identity is re-verified before any signal is sent, so
//! a recycled PID is never signaled; the stale record is reclaimed
//! instead.

use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::host::{ProcessHost, StopSignal};
use crate::identity::{self, Liveness};
use crate::meta::{self, MetaRecord};
use crate::{CoreError, Result};

/// How long a SIGTERM'd group gets before SIGKILL
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// How long a SIGKILL'd group gets to disappear from the process table
const KILL_WAIT: Duration = Duration::from_secs(5);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a stop request accomplished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: u32, forced: bool },
    /// Nothing live held the record; any stale record was reclaimed
    NotRunning,
}

/// Stop whatever the record at `meta_path` points to.
///
/// An absent or stale record is reclaimed and reported as `NotRunning`.
/// An unreadable record is a storage error: it stays on disk and the
/// call fails. A process that survives SIGKILL is an error and its
/// record is left in place for later inspection.
pub fn stop(host: &dyn ProcessHost, meta_path: &Path) -> Result<StopOutcome> {
    let record = match meta::read(meta_path) {
        Ok(record) => record,
        Err(CoreError::MetaNotFound(_)) => return Ok(StopOutcome::NotRunning),
        Err(e) => return Err(e),
    };

    match identity::verify(&record) {
        Liveness::Running => {}
        state => {
            warn!(
                name = %record.name,
                pid = record.pid,
                ?state,
                "Reclaiming stale record"
            );
            meta::delete(meta_path)?;
            return Ok(StopOutcome::NotRunning);
        }
    }

    host.signal_group(record.pid, StopSignal::Term)?;
    if wait_for_exit(&record, GRACE_PERIOD) {
        meta::delete(meta_path)?;
        info!(name = %record.name, pid = record.pid, "Stopped");
        return Ok(StopOutcome::Stopped {
            pid: record.pid,
            forced: false,
        });
    }

    warn!(
        name = %record.name,
        pid = record.pid,
        grace_secs = GRACE_PERIOD.as_secs(),
        "Grace period expired, escalating to SIGKILL"
    );
    host.signal_group(record.pid, StopSignal::Kill)?;
    if wait_for_exit(&record, KILL_WAIT) {
        meta::delete(meta_path)?;
        info!(name = %record.name, pid = record.pid, "Stopped (forced)");
        return Ok(StopOutcome::Stopped {
            pid: record.pid,
            forced: true,
        });
    }

    Err(CoreError::Unkillable { pid: record.pid })
}

/// Poll the identity until it stops verifying as running, bounded by
/// `timeout`. Verification (not mere PID presence) is the exit test, so
/// a recycled PID appearing mid-wait still counts as exited.
fn wait_for_exit(record: &MetaRecord, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !identity::verify(record).is_running() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(EXIT_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{NativeHost, SpawnOutput, SpawnSpec};
    use crate::meta::{LogAttachment, SpawnRecord};
    use corral_config::CommandLine;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn spawn_sleeper(dir: &Path) -> (NativeHost, MetaRecord, PathBuf) {
        let host = NativeHost::default();
        let log = dir.join("sleeper.log");
        let pid = host
            .spawn_detached(&SpawnSpec {
                argv: vec!["/bin/sleep".into(), "30".into()],
                env: HashMap::new(),
                replace_env: false,
                cwd: None,
                output: SpawnOutput::AppendLog(log.clone()),
            })
            .unwrap();
        let start_time = identity::probe_start_time(pid).unwrap();
        let record = MetaRecord::new(
            "sleeper",
            pid,
            start_time,
            CommandLine::Argv(vec!["/bin/sleep".into(), "30".into()]),
            log,
            SpawnRecord {
                new_session: true,
                stdin_null: true,
                log_attachment: LogAttachment::Append,
            },
        );
        let meta_path = dir.join("sleeper.meta.json");
        meta::write(&meta_path, &record).unwrap();
        (host, record, meta_path)
    }

    #[test]
    fn stop_terminates_gracefully_and_clears_the_record() {
        let dir = tempdir().unwrap();
        let (host, record, meta_path) = spawn_sleeper(dir.path());

        let outcome = stop(&host, &meta_path).unwrap();
        assert_eq!(
            outcome,
            StopOutcome::Stopped {
                pid: record.pid,
                forced: false
            }
        );
        assert!(!meta_path.exists());
        assert!(!identity::verify(&record).is_running());
    }

    #[test]
    fn stop_without_a_record_is_not_running() {
        let dir = tempdir().unwrap();
        let outcome = stop(&NativeHost::default(), &dir.path().join("none.meta.json")).unwrap();
        assert_eq!(outcome, StopOutcome::NotRunning);
    }

    #[test]
    fn stop_reclaims_a_dead_record() {
        let dir = tempdir().unwrap();
        let meta_path = dir.path().join("gone.meta.json");
        let record = MetaRecord::new(
            "gone",
            u32::MAX - 1,
            0,
            CommandLine::Shell("true".into()),
            dir.path().join("gone.log"),
            SpawnRecord {
                new_session: true,
                stdin_null: true,
                log_attachment: LogAttachment::Append,
            },
        );
        meta::write(&meta_path, &record).unwrap();

        let outcome = stop(&NativeHost::default(), &meta_path).unwrap();
        assert_eq!(outcome, StopOutcome::NotRunning);
        assert!(!meta_path.exists());
    }

    #[test]
    fn stop_reclaims_a_reused_pid_without_signaling_it() {
        let dir = tempdir().unwrap();
        let meta_path = dir.path().join("old.meta.json");
        // Our own PID with a start time from another era: a reused PID.
        // If stop signaled it, this test process would die.
        let record = MetaRecord::new(
            "old",
            std::process::id(),
            1,
            CommandLine::Shell("true".into()),
            dir.path().join("old.log"),
            SpawnRecord {
                new_session: true,
                stdin_null: true,
                log_attachment: LogAttachment::Append,
            },
        );
        meta::write(&meta_path, &record).unwrap();

        let outcome = stop(&NativeHost::default(), &meta_path).unwrap();
        assert_eq!(outcome, StopOutcome::NotRunning);
        assert!(!meta_path.exists());
    }

    #[test]
    fn stop_fails_on_a_corrupt_record_and_keeps_it() {
        let dir = tempdir().unwrap();
        let meta_path = dir.path().join("bad.meta.json");
        std::fs::write(&meta_path, b"]not json[").unwrap();

        let err = stop(&NativeHost::default(), &meta_path).unwrap_err();
        assert!(matches!(err, CoreError::MetaCorrupt { .. }));
        // The evidence stays on disk for the operator
        assert_eq!(std::fs::read(&meta_path).unwrap(), b"]not json[");
    }
}
