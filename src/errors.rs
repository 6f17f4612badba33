// src/errors.rs

//! Crate-wide error type and helpers.

use std::path::PathBuf;

use thiserror::Error;

use crate::correlate::CorrelationError;
use crate::exec::ProcessError;
use crate::launch::LaunchStage;

#[derive(Error, Debug)]
pub enum StepRunnerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("'{command}' could not be found{}", hint_suffix(.hint))]
    ToolNotFound {
        command: String,
        hint: Option<String>,
    },

    #[error("Process failed: {0}")]
    ProcessExit(ProcessError),

    #[error("Build file not found: {}", .0.display())]
    BuildFileMissing(PathBuf),

    #[error("Failed to discover build steps: {message}")]
    DiscoveryParse {
        message: String,
        detail: Option<String>,
    },

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error("Build exited with {}", exit_code_text(.0))]
    BuildFailed(Option<i32>),

    #[error("Interrupted while waiting for '{0}'")]
    Interrupted(String),

    #[error("Test binary not found at {}", .0.display())]
    TestBinaryMissing(PathBuf),

    #[error("Debugger unavailable: {0}")]
    DebuggerUnavailable(String),

    #[error("{stage} failed for '{target}': {source}")]
    Launch {
        target: String,
        stage: LaunchStage,
        #[source]
        source: Box<StepRunnerError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ProcessError> for StepRunnerError {
    fn from(err: ProcessError) -> Self {
        if err.not_found {
            StepRunnerError::ToolNotFound {
                command: err.program.clone(),
                hint: err.hint.clone(),
            }
        } else {
            StepRunnerError::ProcessExit(err)
        }
    }
}

impl StepRunnerError {
    /// Wrap an error with the launch target and stage it came from.
    pub fn scoped(target: impl Into<String>, stage: LaunchStage, source: StepRunnerError) -> Self {
        StepRunnerError::Launch {
            target: target.into(),
            stage,
            source: Box::new(source),
        }
    }

    /// Optional detail text shown below the headline message: captured
    /// stderr for process failures, the underlying cause otherwise.
    pub fn detail(&self) -> Option<String> {
        match self {
            StepRunnerError::ProcessExit(err) => {
                let stderr = err.stderr.trim();
                (!stderr.is_empty()).then(|| stderr.to_string())
            }
            StepRunnerError::DiscoveryParse { detail, .. } => detail.clone(),
            StepRunnerError::Launch { source, .. } => source.detail(),
            _ => None,
        }
    }

    /// True for errors caused by a missing toolchain executable.
    pub fn is_not_found(&self) -> bool {
        match self {
            StepRunnerError::ToolNotFound { .. } => true,
            StepRunnerError::Launch { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(h) => format!(" ({h})"),
        None => String::new(),
    }
}

fn exit_code_text(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "no exit code (killed or signalled)".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StepRunnerError>;
