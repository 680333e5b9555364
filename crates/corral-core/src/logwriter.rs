//! The pump: size-rotating log sink and the detached writer process
//!
//! When rotation is enabled the child's output cannot go straight to a
//! file descriptor, because rotation must swap the file underneath an
//! ongoing stream. So a pump process sits between the child and the log:
//! it owns both pipe ends, counts every byte it writes, and rotates by
//! renaming the active log aside once it crosses the size threshold.
//!
//! Rotation happens after a write completes, never inside one, so a
//! single write is never split across files.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::host::{shell_argv, NativeHost, ProcessHost, StopSignal};
use crate::identity;
use crate::meta::{self, LogAttachment, MetaRecord, SpawnRecord};
use crate::{CoreError, Result};
use corral_config::{CommandConfig, RotationPolicy};

/// Consecutive rotation failures tolerated before the sink gives up
const MAX_ROTATE_FAILURES: u32 = 3;

/// Append-only log file with size-triggered rotation.
///
/// Tracks bytes written itself instead of re-statting the file, so the
/// threshold check costs nothing per write.
pub struct LogSink {
    path: PathBuf,
    file: File,
    bytes: u64,
    policy: RotationPolicy,
    rotate_failures: u32,
}

impl LogSink {
    pub fn open(path: &Path, policy: RotationPolicy) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let bytes = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            bytes,
            policy,
            rotate_failures: 0,
        })
    }

    /// Write one chunk, then rotate if the threshold has been crossed.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf)?;
        self.bytes += buf.len() as u64;

        if self.policy.enabled && self.bytes >= self.policy.max_size {
            if let Err(e) = self.rotate() {
                self.rotate_failures += 1;
                if self.rotate_failures >= MAX_ROTATE_FAILURES {
                    error!(
                        failures = self.rotate_failures,
                        error = %e,
                        "Giving up on rotation"
                    );
                    return Err(e);
                }
                warn!(error = %e, "Rotation failed, will retry on next write");
            } else {
                self.rotate_failures = 0;
            }
        }
        Ok(())
    }

    /// Rename the active log aside, trim the rotated copy to its cap,
    /// and reopen a fresh active log.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, &self.policy.rotated_path)?;
        trim_to_tail(&self.policy.rotated_path, self.policy.max_rotated_size)?;

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.bytes = 0;
        debug!(
            rotated = %self.policy.rotated_path.display(),
            "Log rotated"
        );
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// Drop everything but the last `cap` bytes of `path`.
///
/// Same atomic-replace shape as the meta store: the tail goes to a temp
/// sibling and is renamed over the original, so a crash mid-trim never
/// loses the rotated contents.
fn trim_to_tail(path: &Path, cap: u64) -> Result<()> {
    let len = fs::metadata(path)?.len();
    if len <= cap {
        return Ok(());
    }

    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-(cap as i64)))?;
    let mut tail = Vec::with_capacity(cap as usize);
    file.read_to_end(&mut tail)?;

    let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp_path, &tail)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Run as the pump for `config`: spawn the child with piped output,
/// record its identity, feed the sink until both pipes close, then
/// append an exit trailer and retire the record.
///
/// This is the body of the hidden re-invocation a rotation-enabled
/// start leaves behind; it returns only once the child has exited.
pub async fn run_pump(config: CommandConfig) -> Result<()> {
    let sink = LogSink::open(&config.log_path, config.rotation.clone())?;
    let sink = Arc::new(Mutex::new(sink));

    let argv = shell_argv(&config.cmd);
    let program = argv.first().ok_or_else(|| CoreError::Spawn {
        command: String::new(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"),
    })?;

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(&argv[1..]);
    if config.replace_env {
        cmd.env_clear();
    }
    cmd.envs(&config.env);
    if let Some(dir) = &config.cwd {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Own group (pid == pgid) so stop can signal the child's group
    // without touching this pump
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            let e = CoreError::Spawn {
                command: argv.join(" "),
                source,
            };
            report_failure(&sink, &config.name, &e).await;
            return Err(e);
        }
    };
    let pid = match child.id() {
        Some(pid) => pid,
        None => {
            let e = CoreError::FingerprintUnavailable { pid: 0 };
            let _ = child.wait().await;
            report_failure(&sink, &config.name, &e).await;
            return Err(e);
        }
    };
    let start_time = match identity::probe_start_time(pid) {
        Some(start_time) => start_time,
        None => {
            let e = CoreError::FingerprintUnavailable { pid };
            abort_spawn(&mut child, pid, &sink, &config.name, &e).await;
            return Err(e);
        }
    };

    let record = MetaRecord::new(
        &config.name,
        pid,
        start_time,
        config.cmd.clone(),
        config.log_path.clone(),
        SpawnRecord {
            new_session: false,
            stdin_null: true,
            log_attachment: LogAttachment::Piped,
        },
    );
    // A child without a durable record must not be left running
    if let Err(e) = meta::write(&config.meta_path, &record) {
        abort_spawn(&mut child, pid, &sink, &config.name, &e).await;
        return Err(e);
    }
    info!(name = %config.name, pid, "Pump attached");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_task = stdout.map(|r| tokio::spawn(drain(r, Arc::clone(&sink))));
    let err_task = stderr.map(|r| tokio::spawn(drain(r, Arc::clone(&sink))));

    let status = child.wait().await?;
    if let Some(task) = out_task {
        let _ = task.await;
    }
    if let Some(task) = err_task {
        let _ = task.await;
    }

    let trailer = format!(
        "[corral] '{}' (pid {}) exited with {} at {}\n",
        config.name,
        pid,
        describe_status(&status),
        corral_util::format_epoch_secs(corral_util::epoch_secs_now()),
    );
    {
        let mut sink = sink.lock().await;
        let _ = sink.write(trailer.as_bytes());
        let _ = sink.flush();
    }

    // Retire the record only if it is still ours; a concurrent restart
    // may already have replaced it
    if let Ok(current) = meta::read(&config.meta_path) {
        if current.pid == pid {
            let _ = meta::delete(&config.meta_path);
        }
    }

    info!(name = %config.name, pid, status = %describe_status(&status), "Child exited");
    Ok(())
}

/// Kill the child's group, reap it, and leave the failure in the log.
async fn abort_spawn(
    child: &mut tokio::process::Child,
    pid: u32,
    sink: &Arc<Mutex<LogSink>>,
    name: &str,
    error: &CoreError,
) {
    let _ = NativeHost::default().signal_group(pid, StopSignal::Kill);
    let _ = child.wait().await;
    report_failure(sink, name, error).await;
}

/// The pump's stdio goes nowhere, so failures are recorded in the log
/// file itself with the sink doing the byte accounting.
async fn report_failure(sink: &Arc<Mutex<LogSink>>, name: &str, error: &CoreError) {
    let line = format!("[corral] '{name}' start failed: {error}\n");
    let mut sink = sink.lock().await;
    let _ = sink.write(line.as_bytes());
    let _ = sink.flush();
}

/// Copy one pipe into the shared sink until EOF.
///
/// A sink failure stops writing but not reading; the pipe keeps being
/// drained so the child never blocks on a full buffer.
async fn drain<R>(mut reader: R, sink: Arc<Mutex<LogSink>>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = [0u8; 8192];
    let mut sink_dead = false;
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Pipe read failed");
                break;
            }
        };
        if sink_dead {
            continue;
        }
        if let Err(e) = sink.lock().await.write(&buf[..n]) {
            error!(error = %e, "Log sink failed; discarding further output");
            sink_dead = true;
        }
    }
}

fn describe_status(status: &std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("code {code}"),
        None => {
            #[cfg(unix)]
            {
                use std::os::unix::process::ExitStatusExt;
                if let Some(sig) = status.signal() {
                    return format!("signal {sig}");
                }
            }
            "an unknown status".into()
        }
    }
}
