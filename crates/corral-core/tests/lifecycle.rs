//! End-to-end lifecycle against real processes.
//!
//! These use the direct (rotation-off) launch shape so everything runs
//! inside the test process tree.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use corral_config::{CommandConfig, CommandLine, RotationPolicy};
use corral_core::{CoreError, RunState, StopOutcome, Supervisor};

fn config(dir: &Path, name: &str, cmd: CommandLine) -> CommandConfig {
    let log_path = dir.join(format!("{name}.log"));
    CommandConfig {
        name: name.into(),
        cmd,
        cwd: None,
        env: HashMap::new(),
        replace_env: false,
        log_path: log_path.clone(),
        meta_path: dir.join(format!("{name}.meta.json")),
        rotation: RotationPolicy::disabled(&log_path),
    }
}

fn wait_for_content(path: &Path) -> String {
    for _ in 0..50 {
        if let Ok(content) = std::fs::read_to_string(path) {
            if !content.is_empty() {
                return content;
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    panic!("no content appeared in {}", path.display());
}

#[test]
fn started_process_output_reaches_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(
        dir.path(),
        "greeter",
        CommandLine::Shell("echo hello from the corral; sleep 30".into()),
    );

    let supervisor = Supervisor::native();
    supervisor.start(&cfg).unwrap();

    let content = wait_for_content(&cfg.log_path);
    assert!(content.contains("hello from the corral"));

    supervisor.stop("greeter", &cfg.meta_path).unwrap();
}

#[test]
fn meta_file_survives_for_inspection_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "steady", CommandLine::Shell("sleep 30".into()));

    let supervisor = Supervisor::native();
    let started = supervisor.start(&cfg).unwrap();

    // On-disk record is valid JSON a human can read
    let raw = std::fs::read_to_string(&cfg.meta_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["pid"], started.record.pid);
    assert_eq!(parsed["name"], "steady");
    assert!(parsed["start_time"].as_u64().unwrap() > 0);

    supervisor.stop("steady", &cfg.meta_path).unwrap();
    assert!(!cfg.meta_path.exists());
}

#[test]
fn double_start_is_rejected_and_leaves_the_first_alone() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "solo", CommandLine::Shell("sleep 30".into()));

    let supervisor = Supervisor::native();
    let first = supervisor.start(&cfg).unwrap();

    let err = supervisor.start(&cfg).unwrap_err();
    assert!(matches!(err, CoreError::AlreadyRunning { .. }));

    let status = supervisor.status("solo", &cfg.meta_path).unwrap();
    assert_eq!(status.record.map(|r| r.pid), Some(first.record.pid));

    supervisor.stop("solo", &cfg.meta_path).unwrap();
}

#[test]
fn exited_process_is_reported_not_running_and_reclaimed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "quick", CommandLine::Shell("true".into()));

    let supervisor = Supervisor::native();
    supervisor.start(&cfg).unwrap();

    // Wait for the short-lived command to finish
    std::thread::sleep(Duration::from_millis(300));

    let status = supervisor.status("quick", &cfg.meta_path).unwrap();
    assert_eq!(status.state, RunState::NotRunning);
    assert!(!cfg.meta_path.exists());
}

#[test]
fn stop_of_an_exited_process_is_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "brief", CommandLine::Shell("true".into()));

    let supervisor = Supervisor::native();
    supervisor.start(&cfg).unwrap();
    std::thread::sleep(Duration::from_millis(300));

    let report = supervisor.stop("brief", &cfg.meta_path).unwrap();
    assert_eq!(report.outcome, StopOutcome::NotRunning);
}

#[test]
fn env_overlay_reaches_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(
        dir.path(),
        "envy",
        CommandLine::Shell("echo value=$CORRAL_LIFECYCLE_VAR; sleep 30".into()),
    );
    cfg.env
        .insert("CORRAL_LIFECYCLE_VAR".into(), "overlaid".into());

    let supervisor = Supervisor::native();
    supervisor.start(&cfg).unwrap();

    let content = wait_for_content(&cfg.log_path);
    assert!(content.contains("value=overlaid"));

    supervisor.stop("envy", &cfg.meta_path).unwrap();
}

#[test]
fn cwd_applies_to_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().join("work");
    std::fs::create_dir(&workdir).unwrap();

    let mut cfg = config(dir.path(), "wherever", CommandLine::Shell("pwd; sleep 30".into()));
    cfg.cwd = Some(workdir.clone());

    let supervisor = Supervisor::native();
    supervisor.start(&cfg).unwrap();

    let content = wait_for_content(&cfg.log_path);
    // Canonical paths in case the tempdir sits behind a symlink
    let logged = Path::new(content.lines().next().unwrap());
    assert_eq!(
        logged.canonicalize().unwrap(),
        workdir.canonicalize().unwrap()
    );

    supervisor.stop("wherever", &cfg.meta_path).unwrap();
}

#[test]
fn restart_after_crash_comes_back_up() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), "phoenix", CommandLine::Shell("sleep 30".into()));

    let supervisor = Supervisor::native();
    let first = supervisor.start(&cfg).unwrap();
    supervisor.stop("phoenix", &cfg.meta_path).unwrap();

    let second = supervisor.restart(&cfg).unwrap();
    assert_ne!(first.record.pid, second.record.pid);

    let status = supervisor.status("phoenix", &cfg.meta_path).unwrap();
    assert_eq!(status.state, RunState::Running);

    supervisor.stop("phoenix", &cfg.meta_path).unwrap();
}

#[test]
fn consecutive_runs_append_to_the_same_log() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(
        dir.path(),
        "appender",
        CommandLine::Shell("echo run; sleep 30".into()),
    );

    let supervisor = Supervisor::native();
    supervisor.start(&cfg).unwrap();
    wait_for_content(&cfg.log_path);
    supervisor.stop("appender", &cfg.meta_path).unwrap();

    supervisor.start(&cfg).unwrap();
    std::thread::sleep(Duration::from_millis(300));
    supervisor.stop("appender", &cfg.meta_path).unwrap();

    let content = std::fs::read_to_string(&cfg.log_path).unwrap();
    assert_eq!(content.matches("run").count(), 2);
}
