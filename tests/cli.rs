// tests/cli.rs

use std::path::PathBuf;

use clap::Parser;

use steprunner::cli::{CliArgs, Command, LogLevel};
use steprunner::logging::log_filter;
use tracing::level_filters::LevelFilter;

#[test]
fn run_with_step_and_passthrough_args() {
    let args = CliArgs::try_parse_from([
        "steprunner",
        "--cwd",
        "/ws",
        "run",
        "install",
        "--",
        "-Doptimize=ReleaseFast",
        "--summary",
    ])
    .unwrap();

    assert_eq!(args.cwd, Some(PathBuf::from("/ws")));
    match args.command {
        Command::Run { step, pick, args } => {
            assert_eq!(step.as_deref(), Some("install"));
            assert!(!pick);
            assert_eq!(args, vec!["-Doptimize=ReleaseFast", "--summary"]);
        }
        other => panic!("expected run, got {other:?}"),
    }
}

#[test]
fn run_without_step_prompts() {
    let args = CliArgs::try_parse_from(["steprunner", "run", "--pick"]).unwrap();
    assert!(matches!(
        args.command,
        Command::Run { step: None, pick: true, .. }
    ));
}

#[test]
fn test_command_flags() {
    let args = CliArgs::try_parse_from([
        "steprunner",
        "--log-level",
        "debug",
        "test",
        "src/main.zig",
        "--filter",
        "parser",
        "--debug",
    ])
    .unwrap();

    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    match args.command {
        Command::Test { file, filter, debug } => {
            assert_eq!(file, PathBuf::from("src/main.zig"));
            assert_eq!(filter.as_deref(), Some("parser"));
            assert!(debug);
        }
        other => panic!("expected test, got {other:?}"),
    }
}

#[test]
fn subcommand_is_required() {
    assert!(CliArgs::try_parse_from(["steprunner"]).is_err());
}

#[test]
fn cli_level_overrides_environment_filter() {
    let filter = log_filter(Some(LogLevel::Debug), Some("error"));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
}

#[test]
fn environment_filter_accepts_module_directives() {
    let filter = log_filter(None, Some("warn,steprunner::cache=trace"));
    assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
}

#[test]
fn unusable_environment_filter_falls_back_to_warn() {
    assert_eq!(log_filter(None, None).max_level_hint(), Some(LevelFilter::WARN));
    assert_eq!(log_filter(None, Some("  ")).max_level_hint(), Some(LevelFilter::WARN));
    assert_eq!(
        log_filter(None, Some("steprunner=loud")).max_level_hint(),
        Some(LevelFilter::WARN)
    );
}
