// src/launch/mod.rs

//! Running build steps and tests, and chaining a debugger onto test builds.
//!
//! - [`request`]: typed task definitions and the [`TaskFactory`].
//! - [`variables`]: `${...}` placeholder resolution.
//! - [`orchestrator`]: the per-launch state machine.

pub mod orchestrator;
pub mod request;
pub mod variables;

use std::fmt;

pub use orchestrator::{LaunchOrchestrator, LaunchReport};
pub use request::{BuildTaskRequest, TaskDefinition, TaskFactory, TestTaskRequest};
pub use variables::VariableResolver;

/// States of one launch request.
///
/// ```text
/// Requested -> Submitted -> Started -> Completed
///                                   -> DebugAttached -> DebugEnded
/// (any) -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Requested,
    Submitted,
    Started,
    Completed,
    DebugAttached,
    DebugEnded,
    Failed,
}

/// Which part of a launch an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStage {
    Submit,
    Start,
    Build,
    DebugAttach,
}

impl fmt::Display for LaunchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LaunchStage::Submit => "Submitting task",
            LaunchStage::Start => "Starting task",
            LaunchStage::Build => "Building test binary",
            LaunchStage::DebugAttach => "Attaching debugger",
        })
    }
}
