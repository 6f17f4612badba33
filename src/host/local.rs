// src/host/local.rs

//! Task host that runs tasks as local processes.

use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::errors::{Result, StepRunnerError};
use crate::exec::{ExitKind, KillSwitch, ProcessRunner, RunOptions};
use crate::host::events::{ExecutionId, TaskEnded, TaskEventBus, TaskStarted};
use crate::host::{Task, TaskHost};

/// Runs each submitted task through [`ProcessRunner`] and publishes its
/// lifecycle on a [`TaskEventBus`].
///
/// `Started` is published as soon as the process is spawned; `Ended` once
/// it exits or is killed.
#[derive(Debug)]
pub struct LocalTaskHost {
    runner: ProcessRunner,
    bus: TaskEventBus,
    next_id: AtomicU64,
    running: Arc<Mutex<HashMap<ExecutionId, KillSwitch>>>,
    echo_output: bool,
}

impl LocalTaskHost {
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            runner,
            bus: TaskEventBus::default(),
            next_id: AtomicU64::new(1),
            running: Arc::new(Mutex::new(HashMap::new())),
            echo_output: true,
        }
    }

    /// Don't forward task output to this process's stdout/stderr.
    pub fn quiet(mut self) -> Self {
        self.echo_output = false;
        self
    }

    pub fn events(&self) -> &TaskEventBus {
        &self.bus
    }

    fn spawn_task(&self, task: Task) -> Result<ExecutionId> {
        validate_task(&task)?;

        let execution = ExecutionId(self.next_id.fetch_add(1, Ordering::SeqCst));

        let mut options = RunOptions::new().cwd(&task.cwd);
        options.not_found_hint = task.not_found_hint.clone();
        if self.echo_output {
            options = options
                .on_stdout(|chunk| {
                    let mut out = std::io::stdout().lock();
                    let _ = out.write_all(chunk.as_bytes());
                    let _ = out.flush();
                })
                .on_stderr(|chunk| {
                    let mut err = std::io::stderr().lock();
                    let _ = err.write_all(chunk.as_bytes());
                });
        }

        info!(%execution, task = %task.name, cmd = %task.command_line(), "submitting task");
        let handle = self.runner.run(&task.program, &task.args, options)?;

        lock(&self.running).insert(execution, handle.killer());
        self.bus.emit_started(TaskStarted {
            execution,
            name: task.name.clone(),
        });

        let bus = self.bus.clone();
        let running = Arc::clone(&self.running);
        let name = task.name;
        tokio::spawn(async move {
            let exit_code = match handle.wait().await {
                Ok(output) if output.killed => None,
                Ok(_) => Some(0),
                Err(err) => {
                    warn!(%execution, task = %name, error = %err, "task failed");
                    match err.exit {
                        ExitKind::Code(code) => Some(code),
                        _ => None,
                    }
                }
            };
            lock(&running).remove(&execution);
            debug!(%execution, task = %name, ?exit_code, "task finished");
            bus.emit_ended(TaskEnded {
                execution,
                name,
                exit_code,
            });
        });

        Ok(execution)
    }
}

impl TaskHost for LocalTaskHost {
    fn subscribe_started(&self) -> broadcast::Receiver<TaskStarted> {
        self.bus.subscribe_started()
    }

    fn subscribe_ended(&self) -> broadcast::Receiver<TaskEnded> {
        self.bus.subscribe_ended()
    }

    fn submit(&self, task: Task) -> Pin<Box<dyn Future<Output = Result<ExecutionId>> + Send + '_>> {
        let result = self.spawn_task(task);
        Box::pin(async move { result })
    }

    fn cancel_all(&self) -> usize {
        let switches: Vec<KillSwitch> = lock(&self.running).drain().map(|(_, s)| s).collect();
        for switch in &switches {
            switch.kill();
        }
        switches.len()
    }
}

/// Reject tasks the host could never run, before anything is spawned.
fn validate_task(task: &Task) -> Result<()> {
    if task.program.trim().is_empty() {
        return Err(StepRunnerError::ConfigError(format!(
            "task '{}' has no program",
            task.name
        )));
    }

    let program = Path::new(&task.program);
    let found = if program.components().count() > 1 {
        program.is_file()
    } else {
        which::which(&task.program).is_ok()
    };

    if !found {
        return Err(StepRunnerError::ToolNotFound {
            command: task.program.clone(),
            hint: task.not_found_hint.clone(),
        });
    }

    if !task.cwd.is_dir() {
        return Err(StepRunnerError::ConfigError(format!(
            "working directory {} does not exist",
            task.cwd.display()
        )));
    }

    Ok(())
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
