// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::ConsoleMode;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [toolchain]
/// path = "zig"
///
/// [build]
/// build_file = "build.zig"
/// args = ["-Doptimize=Debug"]
///
/// [debugger]
/// command = "lldb"
/// args = ["--"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub toolchain: ToolchainSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub test: TestSection,

    #[serde(default)]
    pub debugger: DebuggerSection,

    #[serde(default)]
    pub watch: WatchSection,
}

/// Validated configuration. Construct through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub toolchain: ToolchainSection,
    pub build: BuildSection,
    pub test: TestSection,
    pub debugger: DebuggerSection,
    pub watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            toolchain: raw.toolchain,
            build: raw.build,
            test: raw.test,
            debugger: raw.debugger,
            watch: raw.watch,
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}

/// `[toolchain]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainSection {
    /// Toolchain executable, either a bare name looked up on `PATH` or a path.
    #[serde(default = "default_toolchain_path")]
    pub path: String,

    /// Extra text appended to "not found" errors.
    #[serde(default)]
    pub not_found_hint: Option<String>,
}

fn default_toolchain_path() -> String {
    "zig".to_string()
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            path: default_toolchain_path(),
            not_found_hint: None,
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Build file, relative to the workspace root unless absolute.
    #[serde(default = "default_build_file")]
    pub build_file: PathBuf,

    /// Extra arguments appended to every build task.
    #[serde(default)]
    pub args: Vec<String>,

    /// Arguments that put the toolchain in introspection mode.
    #[serde(default = "default_introspect_args")]
    pub introspect_args: Vec<String>,

    /// Flag preceding the build file path.
    #[serde(default = "default_build_file_flag")]
    pub build_file_flag: String,

    /// Arguments placed before the step name when running a step.
    #[serde(default = "default_step_args")]
    pub step_args: Vec<String>,
}

fn default_build_file() -> PathBuf {
    PathBuf::from("build.zig")
}

fn default_introspect_args() -> Vec<String> {
    vec!["build".to_string(), "--help".to_string()]
}

fn default_build_file_flag() -> String {
    "--build-file".to_string()
}

fn default_step_args() -> Vec<String> {
    vec!["build".to_string()]
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            build_file: default_build_file(),
            args: Vec::new(),
            introspect_args: default_introspect_args(),
            build_file_flag: default_build_file_flag(),
            step_args: default_step_args(),
        }
    }
}

/// `[test]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TestSection {
    /// Arguments placed before the test file.
    #[serde(default = "default_test_subcommand")]
    pub subcommand: Vec<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "default_filter_flag")]
    pub filter_flag: String,

    /// Prefix joined directly with the output path (no separating space).
    #[serde(default = "default_emit_bin_flag")]
    pub emit_bin_flag: String,

    /// Flag that makes the toolchain compile the test binary without running it.
    #[serde(default = "default_no_exec_flag")]
    pub no_exec_flag: String,

    /// Directory for compiled test binaries, relative to the workspace root.
    #[serde(default = "default_bin_dir")]
    pub bin_dir: PathBuf,
}

fn default_test_subcommand() -> Vec<String> {
    vec!["test".to_string()]
}

fn default_filter_flag() -> String {
    "--test-filter".to_string()
}

fn default_emit_bin_flag() -> String {
    "-femit-bin=".to_string()
}

fn default_no_exec_flag() -> String {
    "--test-no-exec".to_string()
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from("zig-out").join("tmp-debug-build").join("bin")
}

impl Default for TestSection {
    fn default() -> Self {
        Self {
            subcommand: default_test_subcommand(),
            args: Vec::new(),
            filter_flag: default_filter_flag(),
            emit_bin_flag: default_emit_bin_flag(),
            no_exec_flag: default_no_exec_flag(),
            bin_dir: default_bin_dir(),
        }
    }
}

/// `[debugger]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DebuggerSection {
    #[serde(default = "default_debugger_command")]
    pub command: String,

    /// Arguments placed between the debugger command and the program.
    #[serde(default = "default_debugger_args")]
    pub args: Vec<String>,

    #[serde(default)]
    pub console: ConsoleMode,
}

fn default_debugger_command() -> String {
    "lldb".to_string()
}

fn default_debugger_args() -> Vec<String> {
    vec!["--".to_string()]
}

impl Default for DebuggerSection {
    fn default() -> Self {
        Self {
            command: default_debugger_command(),
            args: default_debugger_args(),
            console: ConsoleMode::default(),
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Invalidate cached steps when the build file changes.
    #[serde(default = "default_watch_enabled")]
    pub enabled: bool,
}

fn default_watch_enabled() -> bool {
    true
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            enabled: default_watch_enabled(),
        }
    }
}
