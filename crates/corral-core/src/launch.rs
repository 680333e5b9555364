//! Start flow: claim the name, spawn detached, persist the identity
//!
//! Two launch shapes depending on the rotation policy:
//!
//! - rotation off: the child writes straight to an append descriptor on
//!   the log file and this process records the meta itself
//! - rotation on: a pump process is launched instead (this executable,
//!   re-invoked); the pump spawns the child with piped output, records
//!   the meta, and stays behind to feed and rotate the log

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::host::{shell_argv, ProcessHost, SpawnOutput, SpawnSpec, StopSignal};
use crate::identity::{self, Liveness};
use crate::meta::{self, LogAttachment, MetaRecord, SpawnRecord};
use crate::{CoreError, Result};
use corral_config::CommandConfig;

/// How long to wait for the pump to record the meta file
const META_POLL_INTERVAL: Duration = Duration::from_millis(100);
const META_POLL_ATTEMPTS: u32 = 50;

/// Start `config` detached, returning the persisted identity record.
///
/// Fails with `AlreadyRunning` when a verified live process already
/// holds the name; a stale record (dead or reused PID, or unreadable)
/// is reclaimed first.
pub fn start(host: &dyn ProcessHost, config: &CommandConfig) -> Result<MetaRecord> {
    reclaim_if_stale(config)?;

    if config.rotation.enabled {
        start_pumped(host, config)
    } else {
        start_direct(host, config)
    }
}

/// Refuse to start over a live process; clear out anything stale.
///
/// An unreadable record is a storage error, not staleness: it is kept
/// on disk and fails the start so the operator can inspect it.
fn reclaim_if_stale(config: &CommandConfig) -> Result<()> {
    match meta::read(&config.meta_path) {
        Ok(record) => match identity::verify(&record) {
            Liveness::Running => Err(CoreError::AlreadyRunning {
                name: config.name.clone(),
                pid: record.pid,
            }),
            state => {
                warn!(
                    name = %config.name,
                    pid = record.pid,
                    ?state,
                    "Reclaiming stale record"
                );
                meta::delete(&config.meta_path)
            }
        },
        Err(CoreError::MetaNotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Rotation off: spawn the command itself with log append descriptors.
fn start_direct(host: &dyn ProcessHost, config: &CommandConfig) -> Result<MetaRecord> {
    let spec = SpawnSpec {
        argv: shell_argv(&config.cmd),
        env: config.env.clone(),
        replace_env: config.replace_env,
        cwd: config.cwd.clone(),
        output: SpawnOutput::AppendLog(config.log_path.clone()),
    };
    let pid = host.spawn_detached(&spec)?;

    // Even an immediately dead child is still in the process table here
    // (unreaped), so the fingerprint probe cannot miss it.
    let start_time = match identity::probe_start_time(pid) {
        Some(start_time) => start_time,
        None => {
            // A process we cannot fingerprint is a process we cannot manage
            warn!(pid, "No start time for the fresh process; killing it");
            let _ = host.signal_group(pid, StopSignal::Kill);
            return Err(CoreError::FingerprintUnavailable { pid });
        }
    };

    let record = MetaRecord::new(
        &config.name,
        pid,
        start_time,
        config.cmd.clone(),
        config.log_path.clone(),
        SpawnRecord {
            new_session: true,
            stdin_null: true,
            log_attachment: LogAttachment::Append,
        },
    );

    if let Err(e) = meta::write(&config.meta_path, &record) {
        warn!(pid, error = %e, "Meta write failed; killing the fresh process");
        let _ = host.signal_group(pid, StopSignal::Kill);
        return Err(e);
    }

    info!(name = %config.name, pid, log = %config.log_path.display(), "Started");
    Ok(record)
}

/// Rotation on: launch the pump and wait for it to record the meta.
fn start_pumped(host: &dyn ProcessHost, config: &CommandConfig) -> Result<MetaRecord> {
    // The pump's own stdout/stderr go nowhere: append descriptors on the
    // active log would follow a rename at rotation time and put uncounted
    // bytes in the rotated file. The pump reports through its sink instead.
    let spec = SpawnSpec {
        argv: pump_argv(config)?,
        env: Default::default(),
        replace_env: false,
        // Inherit our cwd so relative log/meta paths resolve identically
        cwd: None,
        output: SpawnOutput::Null,
    };
    let pump_pid = host.spawn_detached(&spec)?;
    debug!(name = %config.name, pump_pid, "Pump launched, waiting for its record");

    for _ in 0..META_POLL_ATTEMPTS {
        std::thread::sleep(META_POLL_INTERVAL);
        match meta::read(&config.meta_path) {
            Ok(record) => {
                info!(
                    name = %config.name,
                    pid = record.pid,
                    log = %config.log_path.display(),
                    "Started with rotation"
                );
                return Ok(record);
            }
            Err(CoreError::MetaNotFound(_)) => continue,
            // Mid-write is impossible (atomic rename); anything else is real
            Err(e) => return Err(e),
        }
    }

    Err(CoreError::WriterDidNotStart {
        meta: config.meta_path.clone(),
        log: config.log_path.clone(),
    })
}

/// Argv that re-invokes this executable as the pump for `config`.
fn pump_argv(config: &CommandConfig) -> Result<Vec<String>> {
    let exe = std::env::current_exe()?;
    let spec_json = serde_json::to_string(config).map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, e)
    })?;
    Ok(vec![
        exe.to_string_lossy().into_owned(),
        "pump".into(),
        "--spec".into(),
        spec_json,
    ])
}
