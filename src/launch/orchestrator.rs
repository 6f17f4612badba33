// src/launch/orchestrator.rs

//! Drives one launch request through its states.
//!
//! Build steps stop at `Started`: the caller gets the end signal and may
//! await it. Debug test runs continue: once the build has started and a
//! debugger is known to be available, the orchestrator waits for the build
//! to finish, then launches the debugger on the produced test binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::cache::StepCache;
use crate::config::DebuggerSection;
use crate::correlate::{Signal, TaskCorrelator, TaskLaunch};
use crate::errors::{Result, StepRunnerError};
use crate::fs::FileSystem;
use crate::host::{DebugConfiguration, DebuggerHost, ExecutionId, TaskEnded};
use crate::launch::request::{TaskDefinition, TaskFactory};
use crate::launch::{LaunchStage, LaunchState};
use crate::types::ConsoleMode;

/// What a launch reached.
#[derive(Debug)]
pub struct LaunchReport {
    pub target: String,
    pub state: LaunchState,
    pub execution: ExecutionId,
    /// End signal of the task, for callers that want completion notice.
    /// `None` when the orchestrator already consumed it (debug runs).
    pub on_end: Option<Signal<TaskEnded>>,
    /// Exit code of the debugger, for debug runs.
    pub debugger_exit: Option<i32>,
}

impl LaunchReport {
    /// Wait for the task to end, if the end signal is still held.
    pub async fn wait_for_end(&mut self) -> Result<Option<TaskEnded>> {
        match self.on_end.take() {
            Some(signal) => Ok(Some(signal.await?)),
            None => Ok(None),
        }
    }
}

/// Tracks the state of one launch and scopes its errors.
#[derive(Debug)]
struct LaunchTracker {
    target: String,
    state: LaunchState,
}

impl LaunchTracker {
    fn new(target: String) -> Self {
        debug!(target = %target, "launch requested");
        Self {
            target,
            state: LaunchState::Requested,
        }
    }

    fn advance(&mut self, next: LaunchState) {
        debug!(target = %self.target, from = ?self.state, to = ?next, "launch state change");
        self.state = next;
    }

    fn fail(&mut self, stage: LaunchStage, err: StepRunnerError) -> StepRunnerError {
        self.advance(LaunchState::Failed);
        error!(target = %self.target, %stage, error = %err, "launch failed");
        StepRunnerError::scoped(self.target.clone(), stage, err)
    }
}

pub struct LaunchOrchestrator {
    cache: Arc<StepCache>,
    correlator: TaskCorrelator,
    factory: Arc<TaskFactory>,
    debugger: Arc<dyn DebuggerHost>,
    fs: Arc<dyn FileSystem>,
    console: ConsoleMode,
}

impl std::fmt::Debug for LaunchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchOrchestrator")
            .field("cache", &self.cache)
            .field("console", &self.console)
            .finish_non_exhaustive()
    }
}

impl LaunchOrchestrator {
    pub fn new(
        cache: Arc<StepCache>,
        correlator: TaskCorrelator,
        factory: Arc<TaskFactory>,
        debugger: Arc<dyn DebuggerHost>,
        fs: Arc<dyn FileSystem>,
        debugger_cfg: &DebuggerSection,
    ) -> Self {
        Self {
            cache,
            correlator,
            factory,
            debugger,
            fs,
            console: debugger_cfg.console,
        }
    }

    pub fn cache(&self) -> &Arc<StepCache> {
        &self.cache
    }

    /// Run a build step by name.
    pub async fn run_step(&self, step: &str, extra_args: &[String]) -> Result<LaunchReport> {
        match self.cache.get_steps(false).await {
            Ok(steps) if !steps.iter().any(|s| s.name == step) => {
                warn!(step, "step is not listed by the build file; running it anyway");
            }
            Ok(_) => {}
            Err(err) => debug!(step, error = %err, "could not list steps before running"),
        }

        let definition = TaskDefinition::Build(self.factory.build_request(step, extra_args));
        let mut tracker = LaunchTracker::new(definition.target());

        let (execution, launch) = self.submit_and_start(&mut tracker, definition).await?;

        tracker.advance(LaunchState::Completed);
        info!(step = %tracker.target, %execution, "build step started");
        Ok(LaunchReport {
            target: tracker.target,
            state: LaunchState::Completed,
            execution,
            on_end: Some(launch.on_end),
            debugger_exit: None,
        })
    }

    /// Run the last picked step, prompting when none was picked yet or
    /// `force_pick` is set. `None` when the user dismisses the prompt.
    pub async fn run_picked_step(&self, force_pick: bool) -> Result<Option<LaunchReport>> {
        match self.cache.get_picked_step(force_pick).await? {
            Some(step) => Ok(Some(self.run_step(&step, &[]).await?)),
            None => Ok(None),
        }
    }

    /// The last picked step, re-prompting when `force_pick` is set.
    pub async fn last_target(&self, force_pick: bool) -> Result<Option<String>> {
        self.cache.get_picked_step(force_pick).await
    }

    /// Run, or with `debug` build and debug, the tests of `file`.
    pub async fn run_test(&self, file: &Path, filter: Option<&str>, debug: bool) -> Result<LaunchReport> {
        let request = self.factory.test_request(file, filter, debug);
        let bin_path = request.bin_path.clone();
        let cwd = request.cwd.clone();
        let definition = TaskDefinition::Test(request);
        let mut tracker = LaunchTracker::new(definition.target());

        let (execution, mut launch) = self.submit_and_start(&mut tracker, definition).await?;

        if !debug {
            tracker.advance(LaunchState::Completed);
            return Ok(LaunchReport {
                target: tracker.target,
                state: LaunchState::Completed,
                execution,
                on_end: Some(launch.on_end),
                debugger_exit: None,
            });
        }

        if !self.debugger.is_available() {
            launch.on_end.cancel();
            return Err(tracker.fail(
                LaunchStage::DebugAttach,
                StepRunnerError::DebuggerUnavailable(
                    "no supported debugger is installed; configure [debugger].command".to_string(),
                ),
            ));
        }

        let ended = match launch.on_end.await {
            Ok(ended) => ended,
            Err(err) => return Err(tracker.fail(LaunchStage::Build, err.into())),
        };
        if ended.exit_code != Some(0) {
            return Err(tracker.fail(
                LaunchStage::Build,
                StepRunnerError::BuildFailed(ended.exit_code),
            ));
        }

        let program = match self.locate_test_binary(&bin_path) {
            Ok(path) => path,
            Err(err) => return Err(tracker.fail(LaunchStage::DebugAttach, err)),
        };

        let config = DebugConfiguration {
            name: format!("Debug {}", tracker.target),
            program,
            args: vec![self.toolchain_binary()],
            cwd,
            console: self.console,
        };

        let session = match self.debugger.launch(config).await {
            Ok(session) => session,
            Err(err) => return Err(tracker.fail(LaunchStage::DebugAttach, err)),
        };
        tracker.advance(LaunchState::DebugAttached);

        let debugger_exit = session.wait().await;
        tracker.advance(LaunchState::DebugEnded);

        Ok(LaunchReport {
            target: tracker.target,
            state: LaunchState::DebugEnded,
            execution,
            on_end: None,
            debugger_exit,
        })
    }

    /// `Requested -> Submitted -> Started`.
    async fn submit_and_start(
        &self,
        tracker: &mut LaunchTracker,
        definition: TaskDefinition,
    ) -> Result<(ExecutionId, TaskLaunch)> {
        let task = self.factory.task(definition);
        let mut launch = self.correlator.launch(task).await;

        let Some(execution) = launch.execution else {
            let err = match (&mut launch.on_start).await {
                Err(err) => err.into(),
                Ok(_) => StepRunnerError::Other(anyhow::anyhow!("task has no execution identity")),
            };
            return Err(tracker.fail(LaunchStage::Submit, err));
        };
        tracker.advance(LaunchState::Submitted);

        if let Err(err) = (&mut launch.on_start).await {
            launch.on_end.cancel();
            return Err(tracker.fail(LaunchStage::Start, err.into()));
        }
        tracker.advance(LaunchState::Started);

        Ok((execution, launch))
    }

    fn locate_test_binary(&self, bin_path: &Path) -> Result<PathBuf> {
        if self.fs.is_file(bin_path) {
            Ok(bin_path.to_path_buf())
        } else {
            Err(StepRunnerError::TestBinaryMissing(bin_path.to_path_buf()))
        }
    }

    /// Absolute path of the toolchain when it can be resolved.
    fn toolchain_binary(&self) -> String {
        let toolchain = self.factory.toolchain();
        match which::which(toolchain) {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(_) => toolchain.to_string(),
        }
    }
}
