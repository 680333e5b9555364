//! Meta store: durable identity records with atomic writes
//!
//! One JSON file per supervised process. Writes are crash-safe via
//! write-to-temp + fsync + rename so a reader never observes a partial
//! record; the rename is the commit point. The file's existence is the
//! canonical "running" state, so readers must distinguish "absent" from
//! "present but unreadable".

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{CoreError, Result};
use corral_config::CommandLine;
use corral_util::{format_epoch_secs, name_from_meta_path};

/// How the child's output reaches the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAttachment {
    /// stdout/stderr are append descriptors on the log file itself
    Append,
    /// stdout/stderr are pipes drained by the pump process
    Piped,
}

/// OS-level spawn parameters recorded for later verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRecord {
    /// Spawned into its own session / process group (pid == pgid)
    pub new_session: bool,
    /// Standard input redirected from the null device
    pub stdin_null: bool,
    pub log_attachment: LogAttachment,
}

/// Persisted identity record for one supervised process.
///
/// `pid` alone is never a liveness proof; `(pid, start_time)` is the
/// identity fingerprint because the OS recycles PIDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRecord {
    pub name: String,
    pub pid: u32,

    /// OS-reported start time of `pid`, epoch seconds
    pub start_time: u64,

    /// Human-readable rendering of `start_time` (display only)
    pub start_time_human: String,

    pub cmd: CommandLine,
    pub log_path: PathBuf,
    pub spawn: SpawnRecord,
}

impl MetaRecord {
    pub fn new(
        name: impl Into<String>,
        pid: u32,
        start_time: u64,
        cmd: CommandLine,
        log_path: PathBuf,
        spawn: SpawnRecord,
    ) -> Self {
        Self {
            name: name.into(),
            pid,
            start_time,
            start_time_human: format_epoch_secs(start_time),
            cmd,
            log_path,
            spawn,
        }
    }
}

/// Atomically write a meta record to `path`, creating parent directories.
///
/// Steps:
/// - write JSON to a uniquely named temp file in the same directory
/// - `flush` + `sync_all` on the temp file
/// - `rename` the temp file over the destination
/// - best-effort fsync of the directory to persist the rename
pub fn write(path: &Path, record: &MetaRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // Unique per writing process; concurrent invocations never share it
    let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    let json = serde_json::to_vec_pretty(record).map_err(|source| CoreError::MetaCorrupt {
        path: path.to_path_buf(),
        source,
    })?;

    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        f.write_all(&json)?;
        f.flush()?;
        let _ = f.sync_all();
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        // The temp file is exclusively ours; do not leave it behind
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    debug!(path = %path.display(), pid = record.pid, "Meta record written");
    Ok(())
}

/// Read the meta record at `path`.
///
/// Absent file -> `MetaNotFound`; present but unparseable -> `MetaCorrupt`.
pub fn read(path: &Path) -> Result<MetaRecord> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CoreError::MetaNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_str(&content).map_err(|source| CoreError::MetaCorrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Delete the meta record at `path`; already absent is success.
pub fn delete(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Meta record deleted");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Enumerate all meta files in `dir` with a best-effort parse of each.
///
/// Files that fail to parse are reported individually; they never abort
/// the enumeration. A missing directory is an empty listing.
pub fn list(dir: &Path) -> Result<Vec<(String, PathBuf, Result<MetaRecord>)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut results = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = name_from_meta_path(&path) else {
            continue;
        };

        let parsed = read(&path);
        if let Err(e) = &parsed {
            warn!(path = %path.display(), error = %e, "Unreadable meta record");
        }
        results.push((name, path, parsed));
    }

    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}
