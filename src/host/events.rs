// src/host/events.rs

//! Global task lifecycle streams.

use std::fmt;

use tokio::sync::broadcast;
use tracing::trace;

/// Default buffer per subscriber. Filters drain their receivers eagerly, so
/// this only needs to absorb bursts.
const EVENT_CAPACITY: usize = 256;

/// Identifies one submitted task among all tasks a host runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(pub u64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStarted {
    pub execution: ExecutionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEnded {
    pub execution: ExecutionId,
    pub name: String,
    /// `None` when the task was killed or ended by a signal.
    pub exit_code: Option<i32>,
}

/// The pair of broadcast streams a task host publishes to.
#[derive(Debug, Clone)]
pub struct TaskEventBus {
    started: broadcast::Sender<TaskStarted>,
    ended: broadcast::Sender<TaskEnded>,
}

impl Default for TaskEventBus {
    fn default() -> Self {
        Self::new(EVENT_CAPACITY)
    }
}

impl TaskEventBus {
    pub fn new(capacity: usize) -> Self {
        let (started, _) = broadcast::channel(capacity);
        let (ended, _) = broadcast::channel(capacity);
        Self { started, ended }
    }

    pub fn subscribe_started(&self) -> broadcast::Receiver<TaskStarted> {
        self.started.subscribe()
    }

    pub fn subscribe_ended(&self) -> broadcast::Receiver<TaskEnded> {
        self.ended.subscribe()
    }

    pub fn emit_started(&self, event: TaskStarted) {
        trace!(execution = %event.execution, task = %event.name, "task started");
        // No subscribers is not an error.
        let _ = self.started.send(event);
    }

    pub fn emit_ended(&self, event: TaskEnded) {
        trace!(execution = %event.execution, task = %event.name, code = ?event.exit_code, "task ended");
        let _ = self.ended.send(event);
    }

    /// Live subscriptions on the start stream.
    pub fn started_subscribers(&self) -> usize {
        self.started.receiver_count()
    }

    /// Live subscriptions on the end stream.
    pub fn ended_subscribers(&self) -> usize {
        self.ended.receiver_count()
    }
}
