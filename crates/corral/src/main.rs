//! corral - run, inspect, and stop background commands
//!
//! Every invocation is one short-lived call: resolve the target command
//! from `Corral.toml` (or an explicit meta file), hand it to the
//! supervisor facade, render the report, and exit with the 0/1/3
//! success/error/not-running contract. The hidden `pump` subcommand is
//! the one exception: a rotation-enabled start re-invokes this binary
//! as the detached log writer, and that invocation stays alive as long
//! as the child does.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use corral_config::CommandConfig;
use corral_core::{ExitOutcome, RunState, StopOutcome, Supervisor};
use corral_util::{default_meta_dir, default_rotated_path, name_from_meta_path};

mod cli;
mod render;

use cli::{Cli, Command};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "corral invoked");

    let code = match run(cli.command) {
        Ok(outcome) => outcome.code(),
        Err(e) => {
            eprintln!("corral: {e:#}");
            ExitOutcome::Error.code()
        }
    };
    std::process::exit(code);
}

fn run(command: Command) -> anyhow::Result<ExitOutcome> {
    match command {
        Command::Start {
            name,
            log_file,
            meta_file,
        } => {
            let config = resolve_command(name.as_deref(), log_file, meta_file)?;
            let report = Supervisor::native().start(&config)?;
            render::print_started(&report);
            Ok(ExitOutcome::Success)
        }

        Command::Stop { name, meta_file } => {
            let (name, meta_path) = resolve_target(name, meta_file)?;
            let report = Supervisor::native().stop(&name, &meta_path)?;
            match report.outcome {
                StopOutcome::Stopped { pid, forced } => {
                    let how = if forced { " (forced)" } else { "" };
                    println!("Stopped '{}' (pid {pid}){how}", report.name);
                    Ok(ExitOutcome::Success)
                }
                StopOutcome::NotRunning => {
                    println!("'{}' is not running", report.name);
                    Ok(ExitOutcome::NotRunning)
                }
            }
        }

        Command::Restart {
            name,
            log_file,
            meta_file,
        } => {
            let config = resolve_command(name.as_deref(), log_file, meta_file)?;
            let report = Supervisor::native().restart(&config)?;
            render::print_restarted(&report);
            Ok(ExitOutcome::Success)
        }

        Command::Status { name, meta_file } => {
            let (name, meta_path) = resolve_target(name, meta_file)?;
            let report = Supervisor::native().status(&name, &meta_path)?;
            render::print_status(&report);
            Ok(match report.state {
                RunState::Running => ExitOutcome::Success,
                RunState::NotRunning => ExitOutcome::NotRunning,
            })
        }

        Command::List { meta_dir } => {
            let dir = meta_dir.unwrap_or_else(default_meta_dir);
            let entries = Supervisor::native().list(&dir)?;
            render::print_list(&entries);
            Ok(ExitOutcome::Success)
        }

        Command::Pump { spec } => {
            let config: CommandConfig =
                serde_json::from_str(&spec).context("invalid pump spec")?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(corral_core::logwriter::run_pump(config))?;
            Ok(ExitOutcome::Success)
        }
    }
}

/// Resolve the full command definition for start/restart, applying any
/// path overrides on top of the configured values.
fn resolve_command(
    name: Option<&str>,
    log_file: Option<PathBuf>,
    meta_file: Option<PathBuf>,
) -> anyhow::Result<CommandConfig> {
    let cwd = std::env::current_dir()?;
    let mut config = corral_config::command_config(&cwd, name)?;

    if let Some(log) = log_file {
        // The rotated sibling follows the log unless the config pinned
        // it somewhere explicit
        if config.rotation.rotated_path == default_rotated_path(&config.log_path) {
            config.rotation.rotated_path = default_rotated_path(&log);
        }
        config.log_path = log;
    }
    if let Some(meta) = meta_file {
        config.meta_path = meta;
    }
    Ok(config)
}

/// Resolve a (name, meta path) target for stop/status. An explicit
/// `--meta-file` bypasses config discovery entirely.
fn resolve_target(
    name: Option<String>,
    meta_file: Option<PathBuf>,
) -> anyhow::Result<(String, PathBuf)> {
    if let Some(path) = meta_file {
        let name = name
            .or_else(|| name_from_meta_path(&path))
            .unwrap_or_else(|| path.display().to_string());
        return Ok((name, path));
    }

    let cwd = std::env::current_dir()?;
    let config = corral_config::command_config(&cwd, name.as_deref())?;
    Ok((config.name, config.meta_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_meta_file_skips_config_discovery() {
        // No Corral.toml anywhere near this path; must still resolve
        let (name, path) =
            resolve_target(None, Some(PathBuf::from("/tmp/x/api.meta.json"))).unwrap();
        assert_eq!(name, "api");
        assert_eq!(path, PathBuf::from("/tmp/x/api.meta.json"));
    }

    #[test]
    fn explicit_name_wins_over_derived() {
        let (name, _) = resolve_target(
            Some("renamed".into()),
            Some(PathBuf::from("/tmp/x/api.meta.json")),
        )
        .unwrap();
        assert_eq!(name, "renamed");
    }
}
