//! Error types and exit outcomes for corral-core

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for supervisor operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("No meta record at {0}")]
    MetaNotFound(PathBuf),

    #[error("Meta record at {path} is corrupt: {source}")]
    MetaCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{name}' is already running (pid {pid}); use restart")]
    AlreadyRunning { name: String, pid: u32 },

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No OS start time for spawned pid {pid}")]
    FingerprintUnavailable { pid: u32 },

    #[error("Log writer did not record {meta}; check {log}")]
    WriterDidNotStart { meta: PathBuf, log: PathBuf },

    #[error("Failed to signal pid {pid}: {message}")]
    Signal { pid: u32, message: String },

    #[error("Process {pid} survived forced kill")]
    Unkillable { pid: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Process-style outcome of one supervisor operation.
///
/// `NotRunning` is a legitimate result of `stop` and `status`, distinct
/// from both success and error at the exit-code level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    Error,
    NotRunning,
}

impl ExitOutcome {
    /// Map to the process exit code contract: 0 / 1 / 3
    pub fn code(self) -> i32 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::Error => 1,
            ExitOutcome::NotRunning => 3,
        }
    }
}
