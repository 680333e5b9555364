//! Configuration discovery and parsing for corral
//!
//! Commands are declared in a `Corral.toml` found by walking up from the
//! working directory, so any subdirectory of a project can address the
//! project's supervised commands:
//!
//! ```toml
//! [commands]
//! web = "python -m http.server 8000"
//!
//! [commands.worker]
//! cmd = ["cargo", "run", "--release"]
//! env = { RUST_LOG = "info" }
//! log_path = "logs/worker.log"
//!
//! [commands.worker.rotation]
//! enabled = true
//! max_size = 1048576
//! ```

mod schema;
mod validation;

pub use schema::*;
pub use validation::*;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Configuration file names, checked in order
pub const CONFIG_FILE_NAMES: &[&str] = &["Corral.toml", "corral.toml"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No Corral.toml found from {0} upwards")]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("No commands defined in {0}")]
    NoCommands(PathBuf),

    #[error("Command '{name}' not found in {path}")]
    UnknownCommand { name: String, path: PathBuf },

    #[error("Multiple commands defined in {0}; specify one by name")]
    AmbiguousCommand(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Search for a config file from `start` upwards through its ancestors.
pub fn find_config_file(start: &Path) -> ConfigResult<PathBuf> {
    for dir in start.ancestors() {
        for file_name in CONFIG_FILE_NAMES {
            let candidate = dir.join(file_name);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "Found config file");
                return Ok(candidate);
            }
        }
    }
    Err(ConfigError::NotFound(start.to_path_buf()))
}

/// Load and validate the config file at `path`
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<RawConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<RawConfig> {
    let raw: RawConfig = toml::from_str(content)?;

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Ok(raw)
}

/// Resolve a command by name from the config nearest to `start`.
///
/// With `name: None` the single configured command is used; zero or more
/// than one configured command is an error in that case.
pub fn command_config(start: &Path, name: Option<&str>) -> ConfigResult<CommandConfig> {
    let path = find_config_file(start)?;
    let raw = load_config(&path)?;
    select_command(&raw, name, &path)
}

/// Pick one command from an already-parsed config.
pub fn select_command(
    raw: &RawConfig,
    name: Option<&str>,
    path: &Path,
) -> ConfigResult<CommandConfig> {
    let name = match name {
        Some(name) => {
            if !raw.commands.contains_key(name) {
                return Err(ConfigError::UnknownCommand {
                    name: name.to_string(),
                    path: path.to_path_buf(),
                });
            }
            name.to_string()
        }
        None => match raw.commands.len() {
            0 => return Err(ConfigError::NoCommands(path.to_path_buf())),
            1 => raw.commands.keys().next().cloned().unwrap_or_default(),
            _ => return Err(ConfigError::AmbiguousCommand(path.to_path_buf())),
        },
    };

    let command = &raw.commands[&name];
    Ok(command.resolve(&name))
}
