// src/exec/process.rs

//! Spawn one external command and supervise it until it exits or is killed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::errors::{Result, StepRunnerError};
use crate::exec::escape::command_line;
use crate::exec::terminate::{force_kill, terminate};

/// How long a killed process may keep its pipes open before it is
/// force-killed and its remaining output abandoned.
const KILL_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8 * 1024;

/// Exit code `sh` uses for "command not found".
const SHELL_NOT_FOUND_CODE: i32 = 127;

/// `cmd.exe` message for an unknown program.
const CMD_NOT_FOUND_MESSAGE: &str = "is not recognized as an internal or external command";

pub type ChunkCallback = Box<dyn FnMut(&str) + Send>;
pub type StartCallback = Box<dyn FnOnce() + Send>;
pub type NotFoundCallback = Box<dyn FnOnce(&ProcessError) + Send>;

/// Per-run options for [`ProcessRunner::run`].
#[derive(Default)]
pub struct RunOptions {
    pub cwd: Option<PathBuf>,
    /// Fired once, before the first chunk on either stream is delivered.
    pub on_start: Option<StartCallback>,
    pub on_stdout: Option<ChunkCallback>,
    pub on_stderr: Option<ChunkCallback>,
    /// Appended to "not found" errors.
    pub not_found_hint: Option<String>,
    /// When set, a not-found failure is reported here instead of through
    /// the completion, which then resolves with the captured output.
    pub on_not_found: Option<NotFoundCallback>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn on_start(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    pub fn on_stdout(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stdout = Some(Box::new(f));
        self
    }

    pub fn on_stderr(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stderr = Some(Box::new(f));
        self
    }

    pub fn not_found_hint(mut self, hint: impl Into<String>) -> Self {
        self.not_found_hint = Some(hint.into());
        self
    }

    pub fn on_not_found(mut self, f: impl FnOnce(&ProcessError) + Send + 'static) -> Self {
        self.on_not_found = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("cwd", &self.cwd)
            .field("not_found_hint", &self.not_found_hint)
            .finish_non_exhaustive()
    }
}

/// Output captured from a process that completed without error, or that
/// was killed by its caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// True when the run ended because [`ProcessHandle::kill`] was called.
    pub killed: bool,
}

/// How a failed process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Code(i32),
    Signal(i32),
    Unknown,
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Code(code) => write!(f, "exit code {code}"),
            ExitKind::Signal(sig) => write!(f, "signal {sig}"),
            ExitKind::Unknown => f.write_str("unknown status"),
        }
    }
}

impl From<ExitStatus> for ExitKind {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitKind::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return ExitKind::Signal(sig);
            }
        }
        ExitKind::Unknown
    }
}

/// Failure of a process that was not killed by its caller.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProcessError {
    pub program: String,
    pub command_line: String,
    pub stdout: String,
    pub stderr: String,
    pub exit: ExitKind,
    pub not_found: bool,
    pub hint: Option<String>,
    pub message: String,
}

#[derive(Debug)]
struct ProcessState {
    running: AtomicBool,
    killed: AtomicBool,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

/// Cloneable handle that can kill a running process while another task
/// awaits its completion.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    state: Arc<ProcessState>,
}

impl KillSwitch {
    /// Kill the process. Idempotent.
    ///
    /// The killed flag is set before termination is requested, so the
    /// supervisor classifies the exit as a cancellation whatever status the
    /// process reports.
    pub fn kill(&self) {
        if self.state.killed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.running.store(false, Ordering::SeqCst);

        let sender = self
            .state
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(tx) = sender {
            // The supervisor may have finished already; that is fine.
            let _ = tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }
}

/// One in-flight (or completed) external invocation.
pub struct ProcessHandle {
    program: String,
    command_line: String,
    cwd: Option<PathBuf>,
    pid: Option<u32>,
    switch: KillSwitch,
    done: oneshot::Receiver<std::result::Result<ProcessOutput, ProcessError>>,
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("command_line", &self.command_line)
            .field("cwd", &self.cwd)
            .field("pid", &self.pid)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ProcessHandle {
    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        self.switch.is_running()
    }

    pub fn kill(&self) {
        self.switch.kill();
    }

    pub fn killer(&self) -> KillSwitch {
        self.switch.clone()
    }

    /// Wait for the process to settle.
    ///
    /// Resolves with the captured output on success or after a caller kill;
    /// fails with a [`ProcessError`] otherwise.
    pub async fn wait(self) -> std::result::Result<ProcessOutput, ProcessError> {
        match self.done.await {
            Ok(result) => result,
            Err(_) => Err(ProcessError {
                program: self.program,
                command_line: self.command_line.clone(),
                stdout: String::new(),
                stderr: String::new(),
                exit: ExitKind::Unknown,
                not_found: false,
                hint: None,
                message: format!(
                    "process supervisor for '{}' stopped before reporting an outcome",
                    self.command_line
                ),
            }),
        }
    }
}

/// Spawns external commands through the platform shell.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Spawn `program` with shell-escaped `args` and return its handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(&self, program: &str, args: &[String], options: RunOptions) -> Result<ProcessHandle> {
        let line = command_line(program, args);

        let mut cmd = shell_command(&line);
        if let Some(ref cwd) = options.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(cmd = %line, cwd = ?options.cwd, "spawning process");

        let mut child = cmd.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StepRunnerError::ToolNotFound {
                    command: shell_program().to_string(),
                    hint: None,
                }
            } else {
                StepRunnerError::IoError(err)
            }
        })?;

        let pid = child.id();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let state = Arc::new(ProcessState {
            running: AtomicBool::new(true),
            killed: AtomicBool::new(false),
            cancel: Mutex::new(Some(cancel_tx)),
        });

        let supervisor = Supervisor {
            program: program.to_string(),
            command_line: line.clone(),
            state: Arc::clone(&state),
            options: SupervisorCallbacks {
                on_start: options.on_start,
                on_stdout: options.on_stdout,
                on_stderr: options.on_stderr,
                not_found_hint: options.not_found_hint,
                on_not_found: options.on_not_found,
            },
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        tokio::spawn(async move {
            let result = supervisor.supervise(child, stdout, stderr, cancel_rx).await;
            let _ = done_tx.send(result);
        });

        Ok(ProcessHandle {
            program: program.to_string(),
            command_line: line,
            cwd: options.cwd,
            pid,
            switch: KillSwitch { state },
            done: done_rx,
        })
    }
}

struct SupervisorCallbacks {
    on_start: Option<StartCallback>,
    on_stdout: Option<ChunkCallback>,
    on_stderr: Option<ChunkCallback>,
    not_found_hint: Option<String>,
    on_not_found: Option<NotFoundCallback>,
}

struct Supervisor {
    program: String,
    command_line: String,
    state: Arc<ProcessState>,
    options: SupervisorCallbacks,
}

impl Supervisor {
    /// Pump both output streams from a single task so callbacks never run
    /// concurrently, then wait for the exit status and classify it.
    async fn supervise<O, E>(
        mut self,
        mut child: Child,
        mut stdout: Option<O>,
        mut stderr: Option<E>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) -> std::result::Result<ProcessOutput, ProcessError>
    where
        O: AsyncRead + Unpin,
        E: AsyncRead + Unpin,
    {
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let mut out_chunk = vec![0u8; READ_CHUNK];
        let mut err_chunk = vec![0u8; READ_CHUNK];
        let mut out_text = Utf8Chunks::default();
        let mut err_text = Utf8Chunks::default();

        let mut out_open = stdout.is_some();
        let mut err_open = stderr.is_some();
        let mut cancel_open = true;
        let mut kill_deadline: Option<tokio::time::Instant> = None;

        while out_open || err_open {
            tokio::select! {
                read = read_chunk(&mut stdout, &mut out_chunk), if out_open => match read {
                    Ok(0) | Err(_) => {
                        out_open = false;
                        deliver(&mut self.options.on_stdout, out_text.flush());
                    }
                    Ok(n) => {
                        self.fire_start();
                        let bytes = &out_chunk[..n];
                        deliver(&mut self.options.on_stdout, out_text.push(bytes));
                        out_buf.extend_from_slice(bytes);
                    }
                },
                read = read_chunk(&mut stderr, &mut err_chunk), if err_open => match read {
                    Ok(0) | Err(_) => {
                        err_open = false;
                        deliver(&mut self.options.on_stderr, err_text.flush());
                    }
                    Ok(n) => {
                        self.fire_start();
                        let bytes = &err_chunk[..n];
                        deliver(&mut self.options.on_stderr, err_text.push(bytes));
                        err_buf.extend_from_slice(bytes);
                    }
                },
                cancel = &mut cancel_rx, if cancel_open => {
                    cancel_open = false;
                    if cancel.is_ok() {
                        info!(cmd = %self.command_line, "kill requested; terminating process");
                        terminate(&mut child).await;
                        kill_deadline = Some(tokio::time::Instant::now() + KILL_GRACE);
                    }
                },
                _ = sleep_until_opt(kill_deadline), if kill_deadline.is_some() => {
                    warn!(cmd = %self.command_line, "process ignored termination; forcing kill");
                    force_kill(&mut child);
                    kill_deadline = None;
                    break;
                },
            }
        }

        // The pipes can close while the process keeps running, so a kill
        // must still be able to reach it here.
        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                cancel = &mut cancel_rx, if cancel_open => {
                    cancel_open = false;
                    if cancel.is_ok() {
                        info!(cmd = %self.command_line, "kill requested; terminating process");
                        terminate(&mut child).await;
                        kill_deadline = Some(tokio::time::Instant::now() + KILL_GRACE);
                    }
                },
                _ = sleep_until_opt(kill_deadline), if kill_deadline.is_some() => {
                    warn!(cmd = %self.command_line, "process ignored termination; forcing kill");
                    force_kill(&mut child);
                    kill_deadline = None;
                },
            }
        };
        self.state.running.store(false, Ordering::SeqCst);

        let stdout = String::from_utf8_lossy(&out_buf).into_owned();
        let stderr = String::from_utf8_lossy(&err_buf).into_owned();

        if self.state.killed.load(Ordering::SeqCst) {
            debug!(cmd = %self.command_line, "process ended after caller kill");
            return Ok(ProcessOutput {
                stdout,
                stderr,
                killed: true,
            });
        }

        let status = match status {
            Ok(status) => status,
            Err(err) => {
                return Err(self.error(stdout, stderr, ExitKind::Unknown, false, err.to_string()));
            }
        };

        if status.success() {
            debug!(cmd = %self.command_line, "process exited successfully");
            return Ok(ProcessOutput {
                stdout,
                stderr,
                killed: false,
            });
        }

        let exit = ExitKind::from(status);
        if is_not_found(exit, &stderr) {
            let mut message = format!("'{}' could not be found", self.program);
            if let Some(ref hint) = self.options.not_found_hint {
                message.push_str(": ");
                message.push_str(hint);
            }
            let err = self.error(stdout, stderr, exit, true, message);

            if let Some(notify) = self.options.on_not_found.take() {
                notify(&err);
                return Ok(ProcessOutput {
                    stdout: err.stdout,
                    stderr: err.stderr,
                    killed: false,
                });
            }
            return Err(err);
        }

        let message = format!("command failed with {exit}: {}", self.command_line);
        debug!(cmd = %self.command_line, %exit, "process failed");
        Err(self.error(stdout, stderr, exit, false, message))
    }

    fn fire_start(&mut self) {
        if let Some(on_start) = self.options.on_start.take() {
            on_start();
        }
    }

    fn error(
        &self,
        stdout: String,
        stderr: String,
        exit: ExitKind,
        not_found: bool,
        message: String,
    ) -> ProcessError {
        ProcessError {
            program: self.program.clone(),
            command_line: self.command_line.clone(),
            stdout,
            stderr,
            exit,
            not_found,
            hint: if not_found {
                self.options.not_found_hint.clone()
            } else {
                None
            },
            message,
        }
    }
}

/// Decodes a byte stream chunk by chunk, holding back a multi-byte
/// character split across reads until the rest of it arrives.
#[derive(Debug, Default)]
struct Utf8Chunks {
    pending: Vec<u8>,
}

impl Utf8Chunks {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let keep = incomplete_tail(&self.pending);
        let tail = self.pending.split_off(self.pending.len() - keep);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = tail;
        text
    }

    fn flush(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of a trailing, not yet complete UTF-8 sequence in `bytes`.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xF0..=0xF7 => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

fn deliver(callback: &mut Option<ChunkCallback>, text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(cb) = callback.as_mut() {
        cb(&text);
    }
}

fn is_not_found(exit: ExitKind, stderr: &str) -> bool {
    if cfg!(windows) {
        stderr.contains(CMD_NOT_FOUND_MESSAGE)
    } else {
        exit == ExitKind::Code(SHELL_NOT_FOUND_CODE)
    }
}

async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader.as_mut() {
        Some(r) => r.read(buf).await,
        None => Ok(0),
    }
}

async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn shell_program() -> &'static str {
    if cfg!(windows) { "cmd" } else { "sh" }
}

/// Build a shell command appropriate for the platform.
fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}
