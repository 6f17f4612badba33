// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs one external command through the platform shell with
//! `tokio::process::Command`, streams its output to callbacks while
//! accumulating it, and supports cooperative cancellation.
//!
//! - [`escape`] builds the shell command line from program and arguments.
//! - [`process`] owns [`ProcessRunner`], [`ProcessHandle`] and error
//!   classification (caller kill, not found, failed exit).
//! - [`terminate`] contains the platform-specific termination request.

pub mod escape;
pub mod process;
mod terminate;

pub use escape::{command_line, escape_arg};
pub use process::{
    ExitKind, KillSwitch, ProcessError, ProcessHandle, ProcessOutput, ProcessRunner, RunOptions,
};
