//! Configuration validation

use crate::schema::{CommandLine, RawCommand, RawConfig};
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Command '{name}': {message}")]
    CommandError { name: String, message: String },

    #[error("Command name '{0}' is not usable as a file name")]
    BadCommandName(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (name, command) in &config.commands {
        errors.extend(validate_command(name, command));
    }

    errors
}

fn validate_command(name: &str, command: &RawCommand) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // Names become meta/log file names, so path separators are out
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        errors.push(ValidationError::BadCommandName(name.to_string()));
    }

    match command.cmd() {
        CommandLine::Shell(s) if s.trim().is_empty() => {
            errors.push(ValidationError::CommandError {
                name: name.to_string(),
                message: "cmd cannot be empty".into(),
            });
        }
        CommandLine::Argv(argv) => {
            if argv.is_empty() {
                errors.push(ValidationError::CommandError {
                    name: name.to_string(),
                    message: "cmd list cannot be empty".into(),
                });
            } else if argv[0].trim().is_empty() {
                errors.push(ValidationError::CommandError {
                    name: name.to_string(),
                    message: "cmd executable cannot be empty".into(),
                });
            }
        }
        CommandLine::Shell(_) => {}
    }

    if let RawCommand::Detailed(table) = command {
        if table.rotation.enabled {
            if table.rotation.max_size == Some(0) {
                errors.push(ValidationError::CommandError {
                    name: name.to_string(),
                    message: "rotation.max_size must be at least 1 byte".into(),
                });
            }
            if table.rotation.max_rotated_size == Some(0) {
                errors.push(ValidationError::CommandError {
                    name: name.to_string(),
                    message: "rotation.max_rotated_size must be at least 1 byte".into(),
                });
            }
        }

        for key in table.env.keys() {
            if key.is_empty() || key.contains('=') {
                errors.push(ValidationError::CommandError {
                    name: name.to_string(),
                    message: format!("invalid environment variable name {:?}", key),
                });
            }
        }
    }

    errors
}
