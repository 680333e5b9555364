//! The operation facade: start, stop, restart, status, list
//!
//! Thin orchestration over `launch`, `terminate`, `identity`, and `meta`.
//! Each method is one user-visible operation and returns a report the
//! CLI renders; nothing here prints.

use std::path::Path;
use tracing::{debug, warn};

use crate::host::{NativeHost, ProcessHost};
use crate::identity::{self, Liveness};
use crate::meta::{self, MetaRecord};
use crate::terminate::{self, StopOutcome};
use crate::{launch, CoreError, Result};
use corral_config::CommandConfig;
use corral_util::uptime_since;

/// Whether a name currently resolves to a verified live process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    NotRunning,
}

/// Result of a successful start
#[derive(Debug)]
pub struct StartReport {
    pub record: MetaRecord,
    /// A pump process sits between the child and the log
    pub pumped: bool,
}

/// Result of a stop request
#[derive(Debug)]
pub struct StopReport {
    pub name: String,
    pub outcome: StopOutcome,
}

/// Point-in-time view of one name
#[derive(Debug)]
pub struct StatusReport {
    pub name: String,
    pub state: RunState,
    /// Present only when the process verified as running
    pub record: Option<MetaRecord>,
    pub uptime_secs: Option<u64>,
}

/// One row of the list output
#[derive(Debug)]
pub struct ListEntry {
    pub name: String,
    pub state: RunState,
    pub pid: Option<u32>,
    pub started: Option<String>,
    pub uptime_secs: Option<u64>,
    pub cmd: Option<String>,
    /// Set when the record exists but could not be read; the file is
    /// left in place for the operator
    pub error: Option<String>,
}

/// Entry point for every supervisor operation, generic over the
/// platform strategy so tests can substitute a host.
pub struct Supervisor<H: ProcessHost> {
    host: H,
}

impl Supervisor<NativeHost> {
    pub fn native() -> Self {
        Self::with_host(NativeHost::default())
    }
}

impl<H: ProcessHost> Supervisor<H> {
    pub fn with_host(host: H) -> Self {
        Self { host }
    }

    /// Start `config` detached; fails if a live process holds the name.
    pub fn start(&self, config: &CommandConfig) -> Result<StartReport> {
        let record = launch::start(&self.host, config)?;
        Ok(StartReport {
            pumped: config.rotation.enabled,
            record,
        })
    }

    /// Stop the process recorded for `name`.
    pub fn stop(&self, name: &str, meta_path: &Path) -> Result<StopReport> {
        let outcome = terminate::stop(&self.host, meta_path)?;
        Ok(StopReport {
            name: name.to_string(),
            outcome,
        })
    }

    /// Stop (if running) then start. A name that was not running is not
    /// an error; restart then degrades to a plain start.
    pub fn restart(&self, config: &CommandConfig) -> Result<StartReport> {
        let stopped = terminate::stop(&self.host, &config.meta_path)?;
        debug!(name = %config.name, ?stopped, "Restart: stop phase done");
        self.start(config)
    }

    /// Report on `name`, reclaiming a stale record along the way.
    ///
    /// An unreadable record is a storage error, not "not running": the
    /// file is kept and the call fails.
    pub fn status(&self, name: &str, meta_path: &Path) -> Result<StatusReport> {
        let not_running = || StatusReport {
            name: name.to_string(),
            state: RunState::NotRunning,
            record: None,
            uptime_secs: None,
        };

        let record = match meta::read(meta_path) {
            Ok(record) => record,
            Err(CoreError::MetaNotFound(_)) => return Ok(not_running()),
            Err(e) => return Err(e),
        };

        match identity::verify(&record) {
            Liveness::Running => Ok(StatusReport {
                name: name.to_string(),
                state: RunState::Running,
                uptime_secs: Some(uptime_since(record.start_time).as_secs()),
                record: Some(record),
            }),
            state => {
                warn!(name = %record.name, pid = record.pid, ?state, "Reclaiming stale record");
                meta::delete(meta_path)?;
                Ok(not_running())
            }
        }
    }

    /// Enumerate every record in `meta_dir`, verifying each and
    /// reclaiming the stale ones. Unreadable records are reported
    /// inline, never deleted and never fatal to the batch.
    pub fn list(&self, meta_dir: &Path) -> Result<Vec<ListEntry>> {
        let mut entries = Vec::new();

        for (name, path, parsed) in meta::list(meta_dir)? {
            let record = match parsed {
                Ok(record) => record,
                Err(e) => {
                    entries.push(ListEntry {
                        name,
                        state: RunState::NotRunning,
                        pid: None,
                        started: None,
                        uptime_secs: None,
                        cmd: None,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };

            let state = match identity::verify(&record) {
                Liveness::Running => RunState::Running,
                other => {
                    warn!(name = %record.name, pid = record.pid, state = ?other, "Reclaiming stale record");
                    meta::delete(&path)?;
                    RunState::NotRunning
                }
            };

            let running = state == RunState::Running;
            entries.push(ListEntry {
                name,
                state,
                pid: running.then_some(record.pid),
                started: running.then(|| record.start_time_human.clone()),
                uptime_secs: running.then(|| uptime_since(record.start_time).as_secs()),
                cmd: Some(record.cmd.display()),
                error: None,
            });
        }

        Ok(entries)
    }
}
