// src/correlate/mod.rs

//! Narrow a host's global task event streams down to one launched task.

pub mod signal;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::host::{ExecutionId, Task, TaskEnded, TaskHost, TaskStarted};

pub use signal::{first_matching, Signal};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    #[error("task submission failed: {0}")]
    Submission(String),

    #[error("task event stream closed before the task reported")]
    StreamClosed,

    #[error("stopped waiting for task events")]
    Abandoned,
}

/// The lifecycle signals of one launched task.
#[derive(Debug)]
pub struct TaskLaunch {
    /// `None` when submission failed.
    pub execution: Option<ExecutionId>,
    pub on_start: Signal<TaskStarted>,
    pub on_end: Signal<TaskEnded>,
}

/// Submits tasks and correlates lifecycle events to them.
#[derive(Clone)]
pub struct TaskCorrelator {
    host: Arc<dyn TaskHost>,
}

impl std::fmt::Debug for TaskCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCorrelator").finish_non_exhaustive()
    }
}

impl TaskCorrelator {
    pub fn new(host: Arc<dyn TaskHost>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Arc<dyn TaskHost> {
        &self.host
    }

    /// Submit `task` and return signals for its own start and end.
    ///
    /// Both streams are subscribed *before* submission, so an event the host
    /// publishes while `submit` is still running is buffered rather than
    /// missed. If submission fails, both subscriptions are dropped and both
    /// signals fail with the submission error.
    pub async fn launch(&self, task: Task) -> TaskLaunch {
        let started_rx = self.host.subscribe_started();
        let ended_rx = self.host.subscribe_ended();
        let name = task.name.clone();

        match self.host.submit(task).await {
            Ok(execution) => {
                debug!(%execution, task = %name, "task submitted; correlating events");
                TaskLaunch {
                    execution: Some(execution),
                    on_start: first_matching(started_rx, move |e: &TaskStarted| {
                        e.execution == execution
                    }),
                    on_end: first_matching(ended_rx, move |e: &TaskEnded| e.execution == execution),
                }
            }
            Err(err) => {
                drop(started_rx);
                drop(ended_rx);
                warn!(task = %name, error = %err, "task submission failed");
                let err = CorrelationError::Submission(err.to_string());
                TaskLaunch {
                    execution: None,
                    on_start: Signal::failed(err.clone()),
                    on_end: Signal::failed(err),
                }
            }
        }
    }
}
