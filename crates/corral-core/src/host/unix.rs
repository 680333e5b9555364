//! Unix host: setsid-detached spawn and process-group signaling

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fs::{self, OpenOptions};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use tracing::debug;

use super::{ProcessHost, SpawnOutput, SpawnSpec, StopSignal};
use crate::{CoreError, Result};

#[derive(Debug, Default)]
pub struct UnixHost;

impl ProcessHost for UnixHost {
    /// Spawn the child in its own session with stdin on the null device
    /// and stdout/stderr wired per `spec.output`.
    ///
    /// After `setsid` the child is its own session and group leader, so
    /// pid == pgid and the caller is outside the group it may later signal.
    fn spawn_detached(&self, spec: &SpawnSpec) -> Result<u32> {
        let program = spec.argv.first().ok_or_else(|| CoreError::Spawn {
            command: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
        })?;

        let mut cmd = Command::new(program);
        cmd.args(&spec.argv[1..]);

        if spec.replace_env {
            cmd.env_clear();
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        match &spec.output {
            SpawnOutput::AppendLog(log_path) => {
                if let Some(parent) = log_path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                let open_log = || {
                    OpenOptions::new().create(true).append(true).open(log_path)
                };
                cmd.stdout(Stdio::from(open_log()?));
                cmd.stderr(Stdio::from(open_log()?));
            }
            SpawnOutput::Null => {
                cmd.stdout(Stdio::null());
                cmd.stderr(Stdio::null());
            }
        }

        // SAFETY: setsid is async-signal-safe, fine between fork and exec
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|source| CoreError::Spawn {
            command: spec.argv.join(" "),
            source,
        })?;

        let pid = child.id();
        debug!(pid, program = %program, "Detached process spawned");
        // Not waited on; it outlives us and reparents when we exit. If it
        // dies first it stays visible as a zombie until then, which keeps
        // the start-time probe reliable.
        Ok(pid)
    }

    fn signal_group(&self, pid: u32, stop: StopSignal) -> Result<()> {
        let sig = match stop {
            StopSignal::Term => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        };
        // Negative PID addresses the whole group
        let pgid = Pid::from_raw(-(pid as i32));

        match signal::kill(pgid, sig) {
            Ok(()) => {
                debug!(pid, signal = ?sig, "Signaled process group");
                Ok(())
            }
            // Already gone, or exited into a state we may no longer signal
            Err(Errno::ESRCH) | Err(Errno::EPERM) => Ok(()),
            Err(e) => Err(CoreError::Signal {
                pid,
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::tempdir;

    fn spec(argv: &[&str], log_path: std::path::PathBuf) -> SpawnSpec {
        SpawnSpec {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            env: HashMap::new(),
            replace_env: false,
            cwd: None,
            output: SpawnOutput::AppendLog(log_path),
        }
    }

    #[test]
    fn spawn_appends_output_to_log() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("echo.log");

        let host = UnixHost;
        host.spawn_detached(&spec(&["/bin/sh", "-c", "echo captured"], log.clone()))
            .unwrap();

        std::thread::sleep(Duration::from_millis(300));
        let content = fs::read_to_string(&log).unwrap();
        assert!(content.contains("captured"), "log was: {content:?}");
    }

    #[test]
    fn spawn_creates_log_parent_dirs() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("deep").join("nested").join("out.log");

        let host = UnixHost;
        host.spawn_detached(&spec(&["/bin/true"], log.clone())).unwrap();
        assert!(log.exists());
    }

    #[test]
    fn env_overlay_merges_by_default() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("env.log");

        let mut s = spec(&["/bin/sh", "-c", "echo ${CORRAL_TEST_VAL}:${PATH:+haspath}"], log.clone());
        s.env.insert("CORRAL_TEST_VAL".into(), "abc".into());

        UnixHost.spawn_detached(&s).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        let content = fs::read_to_string(&log).unwrap();
        assert!(content.contains("abc:haspath"), "log was: {content:?}");
    }

    #[test]
    fn replace_env_clears_inherited_vars() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("env.log");

        let mut s = spec(&["/bin/sh", "-c", "echo only:${CORRAL_KEEP}${PATH:+haspath}"], log.clone());
        s.replace_env = true;
        s.env.insert("CORRAL_KEEP".into(), "kept".into());

        UnixHost.spawn_detached(&s).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        let content = fs::read_to_string(&log).unwrap();
        assert!(content.contains("only:kept"), "log was: {content:?}");
        assert!(!content.contains("haspath"), "log was: {content:?}");
    }

    #[test]
    fn null_output_spawn_touches_no_files() {
        let dir = tempdir().unwrap();
        let mut s = spec(&["/bin/sh", "-c", "echo discarded"], dir.path().join("unused"));
        s.output = SpawnOutput::Null;

        UnixHost.spawn_detached(&s).unwrap();
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn signal_to_dead_group_is_ok() {
        // Far beyond the default Linux pid_max
        UnixHost.signal_group(u32::MAX - 1, StopSignal::Term).unwrap();
        UnixHost.signal_group(u32::MAX - 1, StopSignal::Kill).unwrap();
    }

    #[test]
    fn term_stops_a_sleeping_group() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("sleep.log");

        let host = UnixHost;
        let pid = host
            .spawn_detached(&spec(&["/bin/sleep", "30"], log))
            .unwrap();
        // Give it a moment to exec before signaling
        std::thread::sleep(Duration::from_millis(100));
        host.signal_group(pid, StopSignal::Term).unwrap();

        let mut gone = false;
        for _ in 0..50 {
            if crate::identity::probe_start_time(pid).is_none()
                || signal::kill(Pid::from_raw(pid as i32), None) == Err(Errno::ESRCH)
            {
                gone = true;
                break;
            }
            // Zombie children of the test process also count as stopped
            if let Ok(nix::sys::wait::WaitStatus::Signaled(..)) = nix::sys::wait::waitpid(
                Pid::from_raw(pid as i32),
                Some(nix::sys::wait::WaitPidFlag::WNOHANG),
            ) {
                gone = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        assert!(gone, "sleep did not exit after SIGTERM");
    }
}
