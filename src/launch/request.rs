// src/launch/request.rs

//! Typed task definitions and the factory that resolves them into
//! runnable [`Task`]s.

use std::path::{Path, PathBuf};

use crate::config::{ConfigFile, TestSection};
use crate::errors::Result;
use crate::host::Task;
use crate::launch::variables::VariableResolver;

/// Run one named build step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTaskRequest {
    pub step: String,
    pub build_file: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Compile (and unless `debug`, run) the tests of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTaskRequest {
    pub test_file: PathBuf,
    pub filter: Option<String>,
    /// Where the compiled test binary is written.
    pub bin_path: PathBuf,
    /// Only build the binary; a debugger runs it afterwards.
    pub debug: bool,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskDefinition {
    Build(BuildTaskRequest),
    Test(TestTaskRequest),
}

impl TaskDefinition {
    /// Human-readable name of what this definition runs, used to scope errors.
    pub fn target(&self) -> String {
        match self {
            TaskDefinition::Build(req) => req.step.clone(),
            TaskDefinition::Test(req) => match req.filter {
                Some(ref filter) => format!("{} ({filter})", req.test_file.display()),
                None => req.test_file.display().to_string(),
            },
        }
    }

    pub fn cwd(&self) -> &Path {
        match self {
            TaskDefinition::Build(req) => &req.cwd,
            TaskDefinition::Test(req) => &req.cwd,
        }
    }
}

/// Builds resolved task definitions and tasks from configuration.
///
/// Placeholders in the configuration are resolved once, on construction;
/// the accessors return resolved values.
#[derive(Debug, Clone)]
pub struct TaskFactory {
    toolchain: String,
    not_found_hint: Option<String>,
    workspace_root: PathBuf,
    build_file: PathBuf,
    build_file_flag: String,
    introspect_args: Vec<String>,
    step_args: Vec<String>,
    build_args: Vec<String>,
    test: TestSection,
    resolver: VariableResolver,
}

impl TaskFactory {
    pub fn from_config(cfg: &ConfigFile, workspace_root: impl Into<PathBuf>) -> Result<Self> {
        let workspace_root = workspace_root.into();
        let resolver = VariableResolver::new(&workspace_root)?;
        let cfg = resolver.resolve_config(cfg);
        Ok(Self {
            toolchain: cfg.toolchain.path,
            not_found_hint: cfg.toolchain.not_found_hint,
            build_file: workspace_root.join(&cfg.build.build_file),
            build_file_flag: cfg.build.build_file_flag,
            introspect_args: cfg.build.introspect_args,
            step_args: cfg.build.step_args,
            build_args: cfg.build.args,
            test: cfg.test,
            workspace_root,
            resolver,
        })
    }

    pub fn toolchain(&self) -> &str {
        &self.toolchain
    }

    pub fn not_found_hint(&self) -> Option<&str> {
        self.not_found_hint.as_deref()
    }

    pub fn build_file(&self) -> &Path {
        &self.build_file
    }

    pub fn build_file_flag(&self) -> &str {
        &self.build_file_flag
    }

    /// Arguments that make the toolchain list the build file's steps.
    pub fn introspect_args(&self) -> &[String] {
        &self.introspect_args
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn build_request(&self, step: &str, extra_args: &[String]) -> BuildTaskRequest {
        let mut args = self.build_args.clone();
        args.extend(self.resolver.resolve_all(extra_args));
        BuildTaskRequest {
            step: self.resolver.resolve(step),
            build_file: self.build_file.clone(),
            args,
            cwd: self.workspace_root.clone(),
        }
    }

    pub fn test_request(&self, test_file: &Path, filter: Option<&str>, debug: bool) -> TestTaskRequest {
        let file_resolver = self.resolver.for_file(self.workspace_root.join(test_file));
        let test_file = self.workspace_root.join(file_resolver.resolve_path(test_file));
        let filter = filter
            .map(|f| file_resolver.resolve(f))
            .filter(|f| !f.is_empty());
        let bin_dir = self
            .workspace_root
            .join(file_resolver.resolve_path(&self.test.bin_dir));
        let bin_path = bin_dir.join(test_binary_name(&test_file, filter.as_deref()));

        TestTaskRequest {
            test_file,
            filter,
            bin_path,
            debug,
            args: file_resolver.resolve_all(&self.test.args),
            cwd: self.workspace_root.clone(),
        }
    }

    /// Derive the task that runs `step` with no extra arguments.
    pub fn build_task(&self, step: &str) -> Task {
        self.task(TaskDefinition::Build(self.build_request(step, &[])))
    }

    /// Turn a resolved definition into the command the host will run.
    pub fn task(&self, definition: TaskDefinition) -> Task {
        let (name, args) = match definition {
            TaskDefinition::Build(ref req) => (format!("build {}", req.step), self.build_args(req)),
            TaskDefinition::Test(ref req) => {
                (format!("test {}", definition.target()), self.test_args(req))
            }
        };

        Task {
            name,
            program: self.toolchain.clone(),
            args,
            cwd: definition.cwd().to_path_buf(),
            not_found_hint: self.not_found_hint.clone(),
            definition,
        }
    }

    fn build_args(&self, req: &BuildTaskRequest) -> Vec<String> {
        let mut args = self.step_args.clone();
        args.push(req.step.clone());
        args.push(self.build_file_flag.clone());
        args.push(req.build_file.to_string_lossy().into_owned());
        args.extend(req.args.iter().cloned());
        args
    }

    fn test_args(&self, req: &TestTaskRequest) -> Vec<String> {
        let mut args = self.test.subcommand.clone();
        args.push(req.test_file.to_string_lossy().into_owned());
        if let Some(ref filter) = req.filter {
            args.push(self.test.filter_flag.clone());
            args.push(filter.clone());
        }
        args.push(format!(
            "{}{}",
            self.test.emit_bin_flag,
            req.bin_path.to_string_lossy()
        ));
        if req.debug {
            args.push(self.test.no_exec_flag.clone());
        }
        args.extend(req.args.iter().cloned());
        args
    }
}

/// `<stem>-test[-<filter slug>]<exe suffix>`.
fn test_binary_name(test_file: &Path, filter: Option<&str>) -> String {
    let stem = test_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "test".to_string());

    let mut name = format!("{stem}-test");
    if let Some(filter) = filter {
        name.push('-');
        name.push_str(&slug(filter));
    }
    name.push_str(std::env::consts::EXE_SUFFIX);
    name
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
