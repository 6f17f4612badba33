// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod correlate;
pub mod discovery;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod host;
pub mod launch;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cache::sorted_for_display;
use crate::cli::{CliArgs, Command};
use crate::config::{default_config_path, load_or_default};
use crate::context::{AppContext, Collaborators};
use crate::errors::{Result, StepRunnerError};
use crate::host::{TaskEnded, TerminalInput};
use crate::launch::LaunchReport;
use crate::types::StepDescriptor;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - workspace and config resolution
/// - the application context (discovery, cache, correlator, orchestrator)
/// - the requested command
/// - Ctrl-C handling while a task runs
pub async fn run(args: CliArgs) -> Result<()> {
    let workspace_root = resolve_workspace_root(args.cwd.as_deref())?;

    let (config_path, explicit) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (workspace_root.join(default_config_path()), false),
    };
    let cfg = load_or_default(&config_path, explicit)?;
    debug!(config = %config_path.display(), explicit, "configuration loaded");

    let input = Arc::new(TerminalInput::stdin());
    let collaborators = Collaborators::local(&cfg, &workspace_root, Arc::clone(&input))?;
    let mut ctx = AppContext::new(cfg, workspace_root, collaborators)?;

    let result = dispatch(&mut ctx, args.command, &input).await;
    ctx.shutdown();
    result
}

async fn dispatch(ctx: &mut AppContext, command: Command, input: &TerminalInput) -> Result<()> {
    match command {
        Command::Steps { force } => {
            let steps = ctx.cache().get_steps(force).await?;
            print_steps(&steps);
            Ok(())
        }
        Command::Run { step, pick, args } => {
            let report = match step {
                Some(step) => ctx.orchestrator().run_step(&step, &args).await?,
                None => match ctx.orchestrator().run_picked_step(pick).await? {
                    Some(report) => report,
                    None => {
                        println!("no step selected");
                        return Ok(());
                    }
                },
            };
            finish(ctx, report).await
        }
        Command::Test { file, filter, debug } => {
            let file = absolutize(ctx.workspace_root(), &file);
            let report = ctx
                .orchestrator()
                .run_test(&file, filter.as_deref(), debug)
                .await?;
            finish(ctx, report).await
        }
        Command::Last { pick } => {
            match ctx.orchestrator().last_target(pick).await? {
                Some(step) => println!("{step}"),
                None => println!("no step selected"),
            }
            Ok(())
        }
        Command::Session => session(ctx, input).await,
    }
}

/// Wait for a launched task to end, stopping it on Ctrl-C.
///
/// Tasks are children of this process, so returning early would kill them.
async fn finish(ctx: &AppContext, mut report: LaunchReport) -> Result<()> {
    if let Some(code) = report.debugger_exit {
        info!(target = %report.target, code, "debugger exited");
    }

    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let Some(ended) = ctx.wait_for_end(&mut report, interrupt).await? else {
        return Ok(());
    };

    report_end(&report.target, &ended)
}

fn report_end(target: &str, ended: &TaskEnded) -> Result<()> {
    match ended.exit_code {
        Some(0) => {
            info!(target, execution = %ended.execution, "task finished");
            Ok(())
        }
        code => Err(StepRunnerError::BuildFailed(code)),
    }
}

/// Line-oriented interactive loop.
///
/// Keeps the step cache alive between commands and, when enabled, watches
/// the build file so edits show up without a manual reload.
async fn session(ctx: &mut AppContext, input: &TerminalInput) -> Result<()> {
    let (changes_tx, mut changes_rx) = mpsc::unbounded_channel();
    if ctx.config().watch.enabled {
        ctx.start_watching(Some(changes_tx))?;
        info!(build_file = %ctx.build_file().display(), "watching build file");
    }

    eprintln!("commands: steps | run [STEP] | last | pick | reload | test FILE [FILTER] | quit");
    loop {
        eprint!("steprunner> ");

        let line = tokio::select! {
            line = input.read_line() => line?,
            Some(change) = changes_rx.recv() => {
                eprintln!();
                eprintln!("build file {change}; steps will be rediscovered");
                continue;
            }
        };

        let Some(line) = line else {
            break;
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        let outcome = match words.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] | ["q"] => break,
            ["steps"] => ctx.cache().get_steps(false).await.map(|steps| print_steps(&steps)),
            ["reload"] => ctx.cache().get_steps(true).await.map(|steps| print_steps(&steps)),
            ["run"] => run_picked(ctx, false).await,
            ["pick"] => run_picked(ctx, true).await,
            ["run", step, rest @ ..] => {
                let extra: Vec<String> = rest.iter().map(|s| s.to_string()).collect();
                match ctx.orchestrator().run_step(step, &extra).await {
                    Ok(report) => finish(ctx, report).await,
                    Err(err) => Err(err),
                }
            }
            ["last"] => match ctx.cache().picked_step() {
                Some(step) => {
                    println!("{step}");
                    Ok(())
                }
                None => {
                    println!("no step picked yet");
                    Ok(())
                }
            },
            ["test", file, rest @ ..] => {
                let file = absolutize(ctx.workspace_root(), Path::new(file));
                let filter = rest.first().copied();
                match ctx.orchestrator().run_test(&file, filter, false).await {
                    Ok(report) => finish(ctx, report).await,
                    Err(err) => Err(err),
                }
            }
            _ => {
                eprintln!("unknown command: {line}");
                Ok(())
            }
        };

        if let Err(err) = outcome {
            eprintln!("error: {err}");
            if let Some(detail) = err.detail() {
                eprintln!("{detail}");
            }
        }
    }

    Ok(())
}

async fn run_picked(ctx: &AppContext, force_pick: bool) -> Result<()> {
    match ctx.orchestrator().run_picked_step(force_pick).await? {
        Some(report) => finish(ctx, report).await,
        None => {
            println!("no step selected");
            Ok(())
        }
    }
}

fn print_steps(steps: &[StepDescriptor]) {
    if steps.is_empty() {
        println!("no build steps");
        return;
    }
    let ordered = sorted_for_display(steps);
    let width = ordered.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for step in ordered {
        let marker = if step.is_default { " (default)" } else { "" };
        println!(
            "{:<8} {:<width$}{}  {}",
            step.category.as_str(),
            step.name,
            marker,
            step.description,
            width = width
        );
    }
}

fn resolve_workspace_root(cwd: Option<&Path>) -> Result<PathBuf> {
    let root = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };
    if !root.is_dir() {
        return Err(StepRunnerError::ConfigError(format!(
            "workspace root {} is not a directory",
            root.display()
        )));
    }
    Ok(std::fs::canonicalize(&root).unwrap_or(root))
}

fn absolutize(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
