//! Configuration schema: raw TOML forms and the resolved `CommandConfig`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use corral_util::{default_log_path, default_meta_path, default_rotated_path};

/// Default rotation threshold when rotation is enabled without a size (1 MiB)
pub const DEFAULT_MAX_LOG_SIZE: u64 = 1024 * 1024;

/// How a command line is interpreted at spawn time.
///
/// A string goes through the platform shell; a sequence is executed
/// directly with no shell interpretation and no further word-splitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Argv(Vec<String>),
    Shell(String),
}

impl CommandLine {
    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Argv(argv) => argv.is_empty(),
            CommandLine::Shell(s) => s.trim().is_empty(),
        }
    }

    /// Short display form for status output and diagnostics
    pub fn display(&self) -> String {
        match self {
            CommandLine::Argv(argv) => argv.join(" "),
            CommandLine::Shell(s) => s.clone(),
        }
    }
}

/// Log rotation policy for one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationPolicy {
    /// Rotation on/off; when off the child writes straight to the log fd
    pub enabled: bool,

    /// Active log size (bytes) that triggers a rotation
    pub max_size: u64,

    /// Destination the active log is renamed to at rotation time
    pub rotated_path: PathBuf,

    /// Cap on the rotated file; older bytes beyond this are dropped
    pub max_rotated_size: u64,
}

impl RotationPolicy {
    /// Policy with rotation disabled; paths still resolved for display
    pub fn disabled(log_path: &Path) -> Self {
        Self {
            enabled: false,
            max_size: DEFAULT_MAX_LOG_SIZE,
            rotated_path: default_rotated_path(log_path),
            max_rotated_size: DEFAULT_MAX_LOG_SIZE,
        }
    }
}

/// Fully resolved command definition, the immutable input to the core.
///
/// Produced from `Corral.toml` by this crate (or assembled directly by
/// tests); the core never reads configuration files itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandConfig {
    pub name: String,
    pub cmd: CommandLine,

    /// Working directory; `None` means the caller's
    pub cwd: Option<PathBuf>,

    /// Environment overlay applied at spawn time
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// When true the overlay replaces the inherited environment entirely;
    /// when false it merges in, overlay winning on conflicts
    #[serde(default)]
    pub replace_env: bool,

    pub log_path: PathBuf,
    pub meta_path: PathBuf,
    pub rotation: RotationPolicy,
}

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Commands by name
    #[serde(default)]
    pub commands: HashMap<String, RawCommand>,
}

/// A command entry: either a bare command line or a detailed table
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawCommand {
    Bare(CommandLine),
    Detailed(RawCommandTable),
}

/// Detailed command table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCommandTable {
    pub cmd: CommandLine,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub replace_env: bool,

    pub cwd: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub meta_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: RawRotation,
}

/// Raw rotation settings; all sizes optional with documented defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRotation {
    #[serde(default)]
    pub enabled: bool,

    pub max_size: Option<u64>,
    pub rotated_path: Option<PathBuf>,
    pub max_rotated_size: Option<u64>,
}

impl RawCommand {
    pub fn cmd(&self) -> &CommandLine {
        match self {
            RawCommand::Bare(cmd) => cmd,
            RawCommand::Detailed(table) => &table.cmd,
        }
    }

    /// Resolve this raw entry into a full `CommandConfig` for `name`
    pub fn resolve(&self, name: &str) -> CommandConfig {
        let table = match self {
            RawCommand::Bare(cmd) => {
                return CommandConfig {
                    name: name.to_string(),
                    cmd: cmd.clone(),
                    cwd: None,
                    env: HashMap::new(),
                    replace_env: false,
                    log_path: default_log_path(name),
                    meta_path: default_meta_path(name),
                    rotation: RotationPolicy::disabled(&default_log_path(name)),
                };
            }
            RawCommand::Detailed(table) => table,
        };

        let log_path = table
            .log_path
            .clone()
            .unwrap_or_else(|| default_log_path(name));
        let meta_path = table
            .meta_path
            .clone()
            .unwrap_or_else(|| default_meta_path(name));

        let max_size = table.rotation.max_size.unwrap_or(DEFAULT_MAX_LOG_SIZE);
        let rotation = RotationPolicy {
            enabled: table.rotation.enabled,
            max_size,
            rotated_path: table
                .rotation
                .rotated_path
                .clone()
                .unwrap_or_else(|| default_rotated_path(&log_path)),
            max_rotated_size: table.rotation.max_rotated_size.unwrap_or(max_size),
        };

        CommandConfig {
            name: name.to_string(),
            cmd: table.cmd.clone(),
            cwd: table.cwd.clone(),
            env: table.env.clone(),
            replace_env: table.replace_env,
            log_path,
            meta_path,
            rotation,
        }
    }
}
