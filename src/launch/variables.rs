// src/launch/variables.rs

//! `${name}` placeholder substitution for task definitions.

use std::path::{Path, PathBuf};

use regex::{Captures, Regex};

use crate::config::{BuildSection, ConfigFile, DebuggerSection, TestSection, ToolchainSection};
use crate::errors::{Result, StepRunnerError};

const PLACEHOLDER_PATTERN: &str = r"\$\{([^}]+)\}";

/// Resolves editor-style placeholders:
///
/// | placeholder | value |
/// |---|---|
/// | `${workspaceFolder}` | workspace root |
/// | `${workspaceFolderBasename}` | last component of the workspace root |
/// | `${file}` | current file |
/// | `${fileBasename}` | file name of the current file |
/// | `${fileBasenameNoExtension}` | file stem of the current file |
/// | `${fileDirname}` | directory of the current file |
/// | `${cwd}` | working directory |
/// | `${env:NAME}` | environment variable, empty if unset |
///
/// Unknown placeholders, and file placeholders when no file is set, are
/// left untouched.
#[derive(Debug, Clone)]
pub struct VariableResolver {
    workspace_folder: PathBuf,
    cwd: PathBuf,
    file: Option<PathBuf>,
    pattern: Regex,
}

impl VariableResolver {
    pub fn new(workspace_folder: impl Into<PathBuf>) -> Result<Self> {
        let workspace_folder = workspace_folder.into();
        let pattern = Regex::new(PLACEHOLDER_PATTERN).map_err(|e| {
            StepRunnerError::Other(anyhow::anyhow!("invalid placeholder pattern: {e}"))
        })?;
        Ok(Self {
            cwd: workspace_folder.clone(),
            workspace_folder,
            file: None,
            pattern,
        })
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// A copy of this resolver with `${file}` and friends bound to `file`.
    pub fn for_file(&self, file: impl Into<PathBuf>) -> Self {
        let mut resolver = self.clone();
        resolver.file = Some(file.into());
        resolver
    }

    pub fn resolve(&self, input: &str) -> String {
        if !input.contains("${") {
            return input.to_string();
        }
        self.pattern
            .replace_all(input, |caps: &Captures<'_>| {
                let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                self.lookup(name).unwrap_or_else(|| whole.to_string())
            })
            .into_owned()
    }

    pub fn resolve_path(&self, input: &Path) -> PathBuf {
        PathBuf::from(self.resolve(&input.to_string_lossy()))
    }

    pub fn resolve_all(&self, inputs: &[String]) -> Vec<String> {
        inputs.iter().map(|s| self.resolve(s)).collect()
    }

    /// A copy of `cfg` with placeholders in every command and path field
    /// resolved. File placeholders stay in place for [`Self::for_file`].
    pub fn resolve_config(&self, cfg: &ConfigFile) -> ConfigFile {
        ConfigFile {
            toolchain: ToolchainSection {
                path: self.resolve(&cfg.toolchain.path),
                not_found_hint: cfg.toolchain.not_found_hint.clone(),
            },
            build: BuildSection {
                build_file: self.resolve_path(&cfg.build.build_file),
                args: self.resolve_all(&cfg.build.args),
                introspect_args: self.resolve_all(&cfg.build.introspect_args),
                build_file_flag: self.resolve(&cfg.build.build_file_flag),
                step_args: self.resolve_all(&cfg.build.step_args),
            },
            test: TestSection {
                subcommand: self.resolve_all(&cfg.test.subcommand),
                args: self.resolve_all(&cfg.test.args),
                filter_flag: self.resolve(&cfg.test.filter_flag),
                emit_bin_flag: self.resolve(&cfg.test.emit_bin_flag),
                no_exec_flag: self.resolve(&cfg.test.no_exec_flag),
                bin_dir: self.resolve_path(&cfg.test.bin_dir),
            },
            debugger: self.resolve_debugger(&cfg.debugger),
            watch: cfg.watch.clone(),
        }
    }

    pub fn resolve_debugger(&self, debugger: &DebuggerSection) -> DebuggerSection {
        DebuggerSection {
            command: self.resolve(&debugger.command),
            args: self.resolve_all(&debugger.args),
            console: debugger.console,
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        if let Some(var) = name.strip_prefix("env:") {
            return Some(std::env::var(var).unwrap_or_default());
        }

        match name {
            "workspaceFolder" => Some(display(&self.workspace_folder)),
            "workspaceFolderBasename" => self
                .workspace_folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            "cwd" => Some(display(&self.cwd)),
            "file" => self.file.as_deref().map(display),
            "fileBasename" => self
                .file
                .as_deref()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned()),
            "fileBasenameNoExtension" => self
                .file
                .as_deref()
                .and_then(Path::file_stem)
                .map(|n| n.to_string_lossy().into_owned()),
            "fileDirname" => self
                .file
                .as_deref()
                .and_then(Path::parent)
                .map(display),
            _ => None,
        }
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
