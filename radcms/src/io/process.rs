//! Low-level child process helpers.
//!
//! Two shapes of process are run here: bounded commands whose stdout and
//! stderr are captured, and detached commands that outlive the call.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::error::{ExecError, SIGNAL_EXIT_CODE};

/// How long to wait for the pipes to close after killing a timed-out child.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(100);

type StreamResult = std::io::Result<Vec<u8>>;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(SIGNAL_EXIT_CODE)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    /// Text reported for a failed command: stderr, or stdout if stderr is blank.
    pub fn failure_text(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        if stderr.trim().is_empty() {
            self.stdout_text()
        } else {
            stderr.trim().to_string()
        }
    }
}

/// Run a command to completion, capturing stdout and stderr.
///
/// Both pipes are drained on their own threads while the child runs so a
/// chatty child cannot deadlock on a full pipe. With a `timeout`, a child that
/// is still running at the deadline is killed and `timed_out` is set. The
/// call then returns after a short grace period even if a grandchild still
/// holds the pipes open; whatever was read by then is kept.
#[instrument(skip_all, fields(command = label, timeout = ?timeout))]
pub fn run_command(
    mut cmd: Command,
    label: &str,
    timeout: Option<Duration>,
) -> Result<CommandOutput, ExecError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(ExecError::Spawn {
                program: label.to_string(),
                source: e,
            });
        }
    };

    let io_err = |context: &'static str, source: std::io::Error| ExecError::Io {
        command: label.to_string(),
        context,
        source,
    };

    let stdout = child.stdout.take().ok_or_else(|| {
        io_err(
            "stdout was not piped",
            std::io::Error::other("missing pipe"),
        )
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        io_err(
            "stderr was not piped",
            std::io::Error::other("missing pipe"),
        )
    })?;

    let stdout_rx = drain(stdout);
    let stderr_rx = drain(stderr);

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait().map_err(|e| io_err("wait for command", e))?,
        Some(limit) => match child
            .wait_timeout(limit)
            .map_err(|e| io_err("wait for command", e))?
        {
            Some(status) => status,
            None => {
                warn!(timeout = ?limit, "command timed out, killing");
                timed_out = true;
                child.kill().map_err(|e| io_err("kill command", e))?;
                child
                    .wait()
                    .map_err(|e| io_err("wait command after kill", e))?
            }
        },
    };

    let (stdout, stderr) = if timed_out {
        (abandon(&stdout_rx), abandon(&stderr_rx))
    } else {
        (
            collect(&stdout_rx).map_err(|e| io_err("read stdout", e))?,
            collect(&stderr_rx).map_err(|e| io_err("read stderr", e))?,
        )
    };

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Spawn a command that keeps running after this call returns.
///
/// Standard streams go to the null device and, on unix, the child gets its
/// own process group so terminal signals aimed at us do not reach it. No
/// handle is returned; a background thread reaps the child when it exits.
#[instrument(skip_all, fields(command = label))]
pub fn spawn_detached(mut cmd: Command, label: &str) -> Result<u32, ExecError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| {
        error!(err = %e, "failed to spawn detached command");
        ExecError::Spawn {
            program: label.to_string(),
            source: e,
        }
    })?;

    let pid = child.id();
    let reaper = thread::Builder::new()
        .name(format!("reap-{pid}"))
        .spawn(move || {
            let _ = child.wait();
        });
    if let Err(e) = reaper {
        // The child still runs; it is reaped when we exit.
        warn!(pid, err = %e, "failed to start reaper thread");
    }

    debug!(pid, "detached process spawned");
    Ok(pid)
}

/// Read `reader` to the end on its own thread.
fn drain<R: Read + Send + 'static>(reader: R) -> Receiver<StreamResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver is gone only after a timeout gave up on this stream.
        let _ = tx.send(read_stream(reader));
    });
    rx
}

fn collect(rx: &Receiver<StreamResult>) -> StreamResult {
    rx.recv()
        .map_err(|_| std::io::Error::other("output reader thread exited"))?
}

/// Output of a killed child, if its pipes closed promptly.
fn abandon(rx: &Receiver<StreamResult>) -> Vec<u8> {
    match rx.recv_timeout(PIPE_DRAIN_GRACE) {
        Ok(Ok(buf)) => buf,
        Ok(Err(e)) => {
            debug!(err = %e, "reading output of killed command failed");
            Vec::new()
        }
        Err(_) => {
            debug!("pipe still held open after kill, not waiting for it");
            Vec::new()
        }
    }
}

fn read_stream<R: Read>(mut reader: R) -> StreamResult {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_streams_separately() {
        let out = run_command(sh("echo out; echo err >&2"), "sh", None).expect("run");
        assert!(out.status.success());
        assert_eq!(out.stdout_text(), "out");
        assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "err");
        assert!(!out.timed_out);
    }

    #[test]
    fn failure_text_prefers_stderr() {
        let out = run_command(sh("echo out; echo err >&2; exit 4"), "sh", None).expect("run");
        assert_eq!(out.exit_code(), 4);
        assert_eq!(out.failure_text(), "err");
    }

    #[test]
    fn failure_text_falls_back_to_stdout() {
        let out = run_command(sh("echo only-stdout; exit 2"), "sh", None).expect("run");
        assert_eq!(out.failure_text(), "only-stdout");
    }

    #[test]
    fn timeout_kills_child() {
        let out = run_command(sh("sleep 5"), "sh", Some(Duration::from_millis(100))).expect("run");
        assert!(out.timed_out);
        assert!(!out.status.success());
    }

    #[test]
    fn timeout_is_not_extended_by_grandchildren() {
        let start = std::time::Instant::now();
        let out = run_command(
            sh("sleep 3 & echo started; wait"),
            "sh",
            Some(Duration::from_millis(200)),
        )
        .expect("run");
        assert!(out.timed_out);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let err = run_command(Command::new("/definitely/not/here"), "nope", None).unwrap_err();
        assert!(err.is_spawn());
    }

    #[test]
    fn detached_spawn_returns_immediately() {
        let start = std::time::Instant::now();
        let pid = spawn_detached(sh("sleep 2"), "sh").expect("spawn");
        assert!(pid > 0);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
