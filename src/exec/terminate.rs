// src/exec/terminate.rs

//! Cross-platform termination of a running child process.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Ask the child (and, on Windows, its process tree) to stop.
///
/// - Unix: `SIGINT` via `kill -INT <pid>`.
/// - Windows: `taskkill /pid <pid> /T /F`.
///
/// If the platform tool fails, fall back to a hard kill of the direct child.
pub(crate) async fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        debug!("child already reaped; nothing to terminate");
        return;
    };

    let mut cmd = termination_command(pid);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    match cmd.status().await {
        Ok(status) if status.success() => {
            debug!(pid, "termination signal delivered");
        }
        Ok(status) => {
            warn!(pid, code = ?status.code(), "termination command failed; forcing kill");
            force_kill(child);
        }
        Err(err) => {
            warn!(pid, error = %err, "could not run termination command; forcing kill");
            force_kill(child);
        }
    }
}

pub(crate) fn force_kill(child: &mut Child) {
    if let Err(err) = child.start_kill() {
        debug!(error = %err, "start_kill failed (process likely exited)");
    }
}

#[cfg(windows)]
fn termination_command(pid: u32) -> Command {
    let mut c = Command::new("taskkill");
    c.args(["/pid", &pid.to_string(), "/T", "/F"]);
    c
}

#[cfg(not(windows))]
fn termination_command(pid: u32) -> Command {
    let mut c = Command::new("kill");
    c.args(["-INT", &pid.to_string()]);
    c
}
