// src/host/debugger.rs

//! Command-line debugger launcher.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::DebuggerSection;
use crate::errors::{Result, StepRunnerError};
use crate::host::{DebugConfiguration, DebuggerHost};
use crate::types::ConsoleMode;

/// A debugger that has been launched.
#[derive(Debug)]
pub struct DebugSession {
    name: String,
    ended: oneshot::Receiver<Option<i32>>,
}

impl DebugSession {
    /// Build a session whose end is reported through `ended`.
    pub fn new(name: impl Into<String>, ended: oneshot::Receiver<Option<i32>>) -> Self {
        Self {
            name: name.into(),
            ended,
        }
    }

    /// A session that has already ended with `exit_code`.
    pub fn finished(name: impl Into<String>, exit_code: Option<i32>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(exit_code);
        Self::new(name, rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the debugger to exit.
    pub async fn wait(self) -> Option<i32> {
        self.ended.await.unwrap_or(None)
    }
}

/// Runs `<command> <args...> <program> <program args...>`.
///
/// With [`ConsoleMode::Internal`] the debugger's output is captured into the
/// log; otherwise it shares this process's terminal.
#[derive(Debug, Clone)]
pub struct CommandDebugger {
    command: String,
    args: Vec<String>,
}

impl CommandDebugger {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(cfg: &DebuggerSection) -> Self {
        Self::new(cfg.command.clone(), cfg.args.clone())
    }

    fn spawn(&self, config: DebugConfiguration) -> Result<DebugSession> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .arg(&config.program)
            .args(&config.args)
            .current_dir(&config.cwd)
            .kill_on_drop(false);

        match config.console {
            ConsoleMode::Internal => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
            ConsoleMode::Integrated | ConsoleMode::External => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
        }

        info!(
            session = %config.name,
            debugger = %self.command,
            program = %config.program.display(),
            "launching debugger"
        );

        let child = cmd.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StepRunnerError::DebuggerUnavailable(format!("'{}' is not installed", self.command))
            } else {
                StepRunnerError::IoError(err)
            }
        })?;

        let (tx, rx) = oneshot::channel();
        let name = config.name.clone();
        tokio::spawn(async move {
            let exit_code = match child.wait_with_output().await {
                Ok(output) => {
                    if !output.stdout.is_empty() {
                        debug!(session = %name, "debugger stdout: {}", String::from_utf8_lossy(&output.stdout));
                    }
                    if !output.stderr.is_empty() {
                        debug!(session = %name, "debugger stderr: {}", String::from_utf8_lossy(&output.stderr));
                    }
                    output.status.code()
                }
                Err(err) => {
                    warn!(session = %name, error = %err, "waiting for debugger failed");
                    None
                }
            };
            info!(session = %name, ?exit_code, "debugger exited");
            let _ = tx.send(exit_code);
        });

        Ok(DebugSession::new(config.name, rx))
    }
}

impl DebuggerHost for CommandDebugger {
    fn is_available(&self) -> bool {
        which::which(&self.command).is_ok()
    }

    fn launch(
        &self,
        config: DebugConfiguration,
    ) -> Pin<Box<dyn Future<Output = Result<DebugSession>> + Send + '_>> {
        let result = self.spawn(config);
        Box::pin(async move { result })
    }
}
