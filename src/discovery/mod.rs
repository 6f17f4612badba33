// src/discovery/mod.rs

//! Step discovery: run the toolchain in introspection mode and parse its
//! output into [`StepDescriptor`]s.

pub mod parser;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::{Result, StepRunnerError};
use crate::exec::{ProcessRunner, RunOptions};
use crate::fs::FileSystem;
use crate::launch::TaskFactory;
use crate::types::StepDescriptor;

pub use parser::{SectionMarkers, StepParser, GENERAL_OPTIONS_HEADER, STEPS_HEADER};

/// Anything that can produce the current list of build steps.
///
/// Production code uses [`StepDiscovery`]; tests provide fakes that count
/// calls or fail on demand.
pub trait StepSource: Send + Sync {
    fn discover(&self) -> Pin<Box<dyn Future<Output = Result<Vec<StepDescriptor>>> + Send + '_>>;
}

/// Invokes the toolchain's introspection command for one build file.
#[derive(Debug, Clone)]
pub struct StepDiscovery {
    runner: ProcessRunner,
    fs: Arc<dyn FileSystem>,
    parser: StepParser,
    toolchain: String,
    introspect_args: Vec<String>,
    build_file_flag: String,
    build_file: PathBuf,
    cwd: PathBuf,
    not_found_hint: Option<String>,
}

impl StepDiscovery {
    pub fn new(
        runner: ProcessRunner,
        fs: Arc<dyn FileSystem>,
        toolchain: impl Into<String>,
        build_file: impl Into<PathBuf>,
        cwd: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(Self {
            runner,
            fs,
            parser: StepParser::new(SectionMarkers::default())?,
            toolchain: toolchain.into(),
            introspect_args: vec!["build".to_string(), "--help".to_string()],
            build_file_flag: "--build-file".to_string(),
            build_file: build_file.into(),
            cwd: cwd.into(),
            not_found_hint: None,
        })
    }

    /// Build a discovery for the configured toolchain and build file, with
    /// placeholders resolved against `workspace_root`.
    pub fn from_config(
        cfg: &ConfigFile,
        runner: ProcessRunner,
        fs: Arc<dyn FileSystem>,
        workspace_root: &Path,
    ) -> Result<Self> {
        let factory = TaskFactory::from_config(cfg, workspace_root)?;
        Self::from_factory(&factory, runner, fs)
    }

    /// Discovery for the same toolchain and build file `factory` runs steps with.
    pub fn from_factory(factory: &TaskFactory, runner: ProcessRunner, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let mut discovery = Self::new(
            runner,
            fs,
            factory.toolchain(),
            factory.build_file(),
            factory.workspace_root(),
        )?;
        discovery.introspect_args = factory.introspect_args().to_vec();
        discovery.build_file_flag = factory.build_file_flag().to_string();
        discovery.not_found_hint = factory.not_found_hint().map(str::to_string);
        Ok(discovery)
    }

    pub fn with_markers(mut self, markers: SectionMarkers) -> Result<Self> {
        self.parser = StepParser::new(markers)?;
        Ok(self)
    }

    pub fn build_file(&self) -> &Path {
        &self.build_file
    }

    /// Run the introspection call and parse its output.
    pub async fn discover_steps(&self) -> Result<Vec<StepDescriptor>> {
        if !self.fs.is_file(&self.build_file) {
            return Err(StepRunnerError::BuildFileMissing(self.build_file.clone()));
        }

        let mut args = self.introspect_args.clone();
        args.push(self.build_file_flag.clone());
        args.push(self.build_file.to_string_lossy().into_owned());

        let mut options = RunOptions::new().cwd(&self.cwd);
        options.not_found_hint = self.not_found_hint.clone();

        debug!(build_file = %self.build_file.display(), "running step introspection");
        let handle = self.runner.run(&self.toolchain, &args, options)?;
        let output = handle.wait().await?;

        // A clean exit with diagnostics still means the build file did not load.
        let diagnostics = output.stderr.trim();
        if !diagnostics.is_empty() {
            warn!(
                build_file = %self.build_file.display(),
                stderr = %diagnostics,
                "introspection wrote diagnostics; treating as failure"
            );
            return Err(StepRunnerError::DiscoveryParse {
                message: format!(
                    "toolchain reported errors for {}",
                    self.build_file.display()
                ),
                detail: Some(diagnostics.to_string()),
            });
        }

        let steps = self.parser.parse(&output.stdout)?;
        info!(
            build_file = %self.build_file.display(),
            count = steps.len(),
            "discovered build steps"
        );
        Ok(steps)
    }
}

impl StepSource for StepDiscovery {
    fn discover(&self) -> Pin<Box<dyn Future<Output = Result<Vec<StepDescriptor>>> + Send + '_>> {
        Box::pin(self.discover_steps())
    }
}
