//! Command-line definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// corral - keep background commands penned in
#[derive(Parser, Debug)]
#[command(name = "corral", version)]
#[command(about = "Run, inspect, and stop background commands declared in Corral.toml")]
pub struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a command detached, capturing its output to a log file
    Start {
        /// Command name; may be omitted when the config defines exactly one
        name: Option<String>,

        /// Write output here instead of the configured log path
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,

        /// Keep the identity record here instead of the configured path
        #[arg(long, value_name = "PATH")]
        meta_file: Option<PathBuf>,
    },

    /// Stop a running command (graceful, then forced after a grace period)
    Stop {
        name: Option<String>,

        /// Operate on this identity record directly, bypassing the config
        #[arg(long, value_name = "PATH")]
        meta_file: Option<PathBuf>,
    },

    /// Stop (if running) and start again
    Restart {
        name: Option<String>,

        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,

        #[arg(long, value_name = "PATH")]
        meta_file: Option<PathBuf>,
    },

    /// Show whether a command is running, with PID and uptime
    Status {
        name: Option<String>,

        /// Operate on this identity record directly, bypassing the config
        #[arg(long, value_name = "PATH")]
        meta_file: Option<PathBuf>,
    },

    /// List every recorded command and its state
    List {
        /// Directory of identity records (default: .corral)
        #[arg(long, value_name = "DIR")]
        meta_dir: Option<PathBuf>,
    },

    /// Internal: run as the log pump for one command
    #[command(hide = true)]
    Pump {
        /// Resolved command definition as JSON
        #[arg(long)]
        spec: String,
    },
}
