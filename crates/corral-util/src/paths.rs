//! Default paths for corral state
//!
//! Meta records and logs live relative to the project directory so that a
//! checkout carries its own supervisor state:
//! - Meta: `.corral/<name>.meta.json`
//! - Logs: `logs/<name>.log`
//!
//! Both directories can be overridden with environment variables, which is
//! mainly useful for tests and for users who keep state out of the tree.

use std::path::{Path, PathBuf};

/// Environment variable for overriding the meta directory
pub const CORRAL_META_DIR_ENV: &str = "CORRAL_META_DIR";

/// Environment variable for overriding the log directory
pub const CORRAL_LOG_DIR_ENV: &str = "CORRAL_LOG_DIR";

/// Default meta directory name (relative to the working directory)
const META_DIR: &str = ".corral";

/// Default log directory name (relative to the working directory)
const LOG_DIR: &str = "logs";

/// Get the default meta directory.
///
/// Order of precedence:
/// 1. `$CORRAL_META_DIR` environment variable (if set)
/// 2. `.corral` relative to the working directory
pub fn default_meta_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CORRAL_META_DIR_ENV) {
        return PathBuf::from(dir);
    }
    PathBuf::from(META_DIR)
}

/// Get the default log directory.
///
/// Order of precedence:
/// 1. `$CORRAL_LOG_DIR` environment variable (if set)
/// 2. `logs` relative to the working directory
pub fn default_log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CORRAL_LOG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    PathBuf::from(LOG_DIR)
}

/// Default meta file path for a command name
pub fn default_meta_path(name: &str) -> PathBuf {
    default_meta_dir().join(format!("{}.meta.json", name))
}

/// Default log file path for a command name
pub fn default_log_path(name: &str) -> PathBuf {
    default_log_dir().join(format!("{}.log", name))
}

/// Default rotated-log path: the log path with a `.1` suffix appended
pub fn default_rotated_path(log_path: &Path) -> PathBuf {
    let mut name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out.log".to_string());
    name.push_str(".1");
    log_path.with_file_name(name)
}

/// Extract the command name from a meta file path (`<name>.meta.json`),
/// used when listing a directory of meta files.
pub fn name_from_meta_path(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    file_name
        .strip_suffix(".meta.json")
        .map(|name| name.to_string())
}
