//! Process lifecycle and log-capture engine for corral
//!
//! The engine behind the `corral` CLI:
//! - `meta`: durable on-disk identity records, one JSON file per process
//! - `identity`: liveness verification that survives PID reuse
//! - `host`: platform process-control strategy (spawn detached, signal)
//! - `launch`: start a command detached with its output captured
//! - `logwriter`: the detached pump that copies child output and rotates
//! - `terminate`: graceful-then-forced stop
//! - `supervisor`: the `start`/`stop`/`restart`/`status`/`list` facade
//!
//! Every operation is a short-lived synchronous call; the only resident
//! piece is the pump process that a rotation-enabled `start` leaves
//! behind to feed the log file.

mod error;
pub mod host;
pub mod identity;
pub mod launch;
pub mod logwriter;
pub mod meta;
pub mod supervisor;
pub mod terminate;

pub use error::{CoreError, ExitOutcome, Result};
pub use identity::Liveness;
pub use meta::MetaRecord;
pub use supervisor::{ListEntry, RunState, StartReport, StatusReport, StopReport, Supervisor};
pub use terminate::StopOutcome;
