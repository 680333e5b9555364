//! Shared utilities for corral
//!
//! This crate provides:
//! - Default paths for meta and log files
//! - Time utilities (fingerprint timestamps, uptime formatting)

mod paths;
mod time;

pub use paths::*;
pub use time::*;
