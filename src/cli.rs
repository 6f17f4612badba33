// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `steprunner`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "steprunner",
    version,
    about = "Discover, run and debug toolchain build steps and tests.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Steprunner.toml` in the workspace root; defaults apply if
    /// it does not exist.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Workspace root. Defaults to the current directory.
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STEPRUNNER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the build steps, sorted by category.
    Steps {
        /// Ignore cached steps and rerun discovery.
        #[arg(long)]
        force: bool,
    },

    /// Run a build step and wait for it to finish.
    Run {
        /// Step to run. Prompts for one when omitted.
        step: Option<String>,

        /// Prompt for the step even if one was picked before.
        #[arg(long)]
        pick: bool,

        /// Extra arguments passed to the toolchain.
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Run the tests in a file, or build them and start a debugger.
    Test {
        file: PathBuf,

        /// Only run tests whose name matches.
        #[arg(long)]
        filter: Option<String>,

        /// Build the test binary and launch it under the debugger.
        #[arg(long)]
        debug: bool,
    },

    /// Print the last picked step, prompting if there is none.
    Last {
        /// Prompt again even if a step was picked before.
        #[arg(long)]
        pick: bool,
    },

    /// Interactive session that keeps steps cached and watches the build file.
    Session,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
