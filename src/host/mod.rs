// src/host/mod.rs

//! Collaborators the step machinery drives but does not own.
//!
//! An editor integration supplies these; the binary uses the local
//! implementations in this module:
//!
//! - [`TaskHost`]: accepts a [`Task`], returns its [`ExecutionId`], and
//!   broadcasts start/end events for *every* task on two global streams.
//!   [`LocalTaskHost`] runs tasks as local processes.
//! - [`Picker`]: lets the user choose one item, or nothing.
//!   [`TerminalPicker`] prompts on the terminal.
//! - [`DebuggerHost`]: launches a debugger against a program.
//!   [`CommandDebugger`] runs a command-line debugger.

pub mod debugger;
pub mod events;
pub mod local;
pub mod picker;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::sync::broadcast;

use crate::errors::Result;
use crate::exec::command_line;
use crate::launch::TaskDefinition;
use crate::types::{ConsoleMode, StepDescriptor};

pub use debugger::{CommandDebugger, DebugSession};
pub use events::{ExecutionId, TaskEnded, TaskEventBus, TaskStarted};
pub use local::LocalTaskHost;
pub use picker::{TerminalInput, TerminalPicker};

/// A fully resolved unit of work handed to a [`TaskHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub definition: TaskDefinition,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub not_found_hint: Option<String>,
}

impl Task {
    pub fn command_line(&self) -> String {
        command_line(&self.program, &self.args)
    }
}

/// Host task scheduler.
pub trait TaskHost: Send + Sync {
    /// Subscribe to the start events of all tasks.
    fn subscribe_started(&self) -> broadcast::Receiver<TaskStarted>;

    /// Subscribe to the end events of all tasks.
    fn subscribe_ended(&self) -> broadcast::Receiver<TaskEnded>;

    /// Submit a task for execution.
    fn submit(&self, task: Task) -> Pin<Box<dyn Future<Output = Result<ExecutionId>> + Send + '_>>;

    /// Stop every task this host is still running. Returns how many were
    /// asked to stop.
    fn cancel_all(&self) -> usize {
        0
    }
}

/// One entry in a picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickItem {
    pub label: String,
    pub description: String,
}

impl PickItem {
    pub fn from_step(step: &StepDescriptor) -> Self {
        let description = if step.is_default {
            format!("(default) {}", step.description)
        } else {
            step.description.clone()
        };
        Self {
            label: step.name.clone(),
            description,
        }
    }
}

/// Interactive single-choice picker.
pub trait Picker: Send + Sync {
    /// Returns the index of the chosen item, or `None` if the user dismissed
    /// the prompt.
    fn pick(&self, items: Vec<PickItem>) -> Pin<Box<dyn Future<Output = Result<Option<usize>>> + Send + '_>>;
}

/// What a debugger should launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugConfiguration {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub console: ConsoleMode,
}

/// Host debugger facility.
pub trait DebuggerHost: Send + Sync {
    /// Whether a debugger is installed and usable right now.
    fn is_available(&self) -> bool;

    fn launch(
        &self,
        config: DebugConfiguration,
    ) -> Pin<Box<dyn Future<Output = Result<DebugSession>> + Send + '_>>;
}
