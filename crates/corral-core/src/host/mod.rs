//! Platform process-control strategy
//!
//! The core talks to the OS only through [`ProcessHost`]: spawn a command
//! fully detached, and signal its process group. Each supported platform
//! provides one implementation; everything above this seam is portable.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::Result;
use corral_config::CommandLine;

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::UnixHost;

/// The host implementation for the current platform
#[cfg(unix)]
pub type NativeHost = UnixHost;

/// Signal sent to a process group during shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Polite request to exit (SIGTERM)
    Term,
    /// Forced, cannot be caught (SIGKILL)
    Kill,
}

/// Where a detached process's stdout and stderr go
#[derive(Debug, Clone)]
pub enum SpawnOutput {
    /// Append descriptors on the given file
    AppendLog(PathBuf),
    /// The null device; the process accounts for its own output
    Null,
}

/// Everything a host needs to spawn one detached process
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    /// Program and arguments, shell already resolved
    pub argv: Vec<String>,

    /// Environment overlay
    pub env: HashMap<String, String>,

    /// Overlay replaces the inherited environment instead of merging in
    pub replace_env: bool,

    /// Working directory; `None` inherits the caller's
    pub cwd: Option<PathBuf>,

    pub output: SpawnOutput,
}

/// Platform strategy for detached process control.
///
/// `spawn_detached` must place the child in its own session so that
/// signaling the group with the child's PID never touches the caller,
/// and must leave stdin on the null device.
pub trait ProcessHost {
    fn spawn_detached(&self, spec: &SpawnSpec) -> Result<u32>;

    /// Signal the whole process group led by `pid`.
    ///
    /// A group that no longer exists is not an error; the exit already
    /// achieved what the signal was for.
    fn signal_group(&self, pid: u32, signal: StopSignal) -> Result<()>;
}

/// Expand a command line into the argv the host executes.
///
/// Shell form runs under `/bin/sh -c`; argv form executes directly with
/// no shell interpretation.
pub fn shell_argv(cmd: &CommandLine) -> Vec<String> {
    match cmd {
        CommandLine::Argv(argv) => argv.clone(),
        CommandLine::Shell(line) => vec!["/bin/sh".into(), "-c".into(), line.clone()],
    }
}
