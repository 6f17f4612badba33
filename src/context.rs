// src/context.rs

//! Explicit owner of every long-lived component.
//!
//! Built once by [`crate::run`], passed by reference to whatever needs a
//! component, and torn down with [`AppContext::shutdown`] in reverse
//! construction order.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::StepCache;
use crate::config::ConfigFile;
use crate::correlate::TaskCorrelator;
use crate::discovery::{StepDiscovery, StepSource};
use crate::errors::{Result, StepRunnerError};
use crate::exec::ProcessRunner;
use crate::fs::{FileSystem, RealFileSystem};
use crate::host::{
    CommandDebugger, DebuggerHost, LocalTaskHost, Picker, TaskEnded, TaskHost, TerminalInput,
    TerminalPicker,
};
use crate::launch::{LaunchOrchestrator, LaunchReport, TaskFactory, VariableResolver};
use crate::watch::{spawn_build_file_watcher, BuildFileChange, WatcherHandle};

/// The host-side collaborators a context is built from.
///
/// `steps` overrides the discovery source; when `None`, a
/// [`StepDiscovery`] for the configured toolchain is used.
pub struct Collaborators {
    pub host: Arc<dyn TaskHost>,
    pub picker: Arc<dyn Picker>,
    pub debugger: Arc<dyn DebuggerHost>,
    pub fs: Arc<dyn FileSystem>,
    pub steps: Option<Arc<dyn StepSource>>,
}

impl Collaborators {
    /// Local processes, a terminal picker and a command-line debugger.
    ///
    /// Placeholders in the debugger command line resolve against
    /// `workspace_root`.
    pub fn local(cfg: &ConfigFile, workspace_root: &Path, input: Arc<TerminalInput>) -> Result<Self> {
        let debugger = VariableResolver::new(workspace_root)?.resolve_debugger(&cfg.debugger);
        Ok(Self {
            host: Arc::new(LocalTaskHost::new(ProcessRunner::new())),
            picker: Arc::new(TerminalPicker::new(input)),
            debugger: Arc::new(CommandDebugger::from_config(&debugger)),
            fs: Arc::new(RealFileSystem),
            steps: None,
        })
    }
}

pub struct AppContext {
    config: ConfigFile,
    workspace_root: PathBuf,
    factory: Arc<TaskFactory>,
    cache: Arc<StepCache>,
    host: Arc<dyn TaskHost>,
    orchestrator: LaunchOrchestrator,
    watcher: Option<WatcherHandle>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("workspace_root", &self.workspace_root)
            .field("watcher", &self.watcher)
            .finish_non_exhaustive()
    }
}

impl AppContext {
    pub fn new(
        config: ConfigFile,
        workspace_root: impl Into<PathBuf>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let workspace_root = workspace_root.into();
        let Collaborators {
            host,
            picker,
            debugger,
            fs,
            steps,
        } = collaborators;

        let factory = Arc::new(TaskFactory::from_config(&config, &workspace_root)?);

        let source: Arc<dyn StepSource> = match steps {
            Some(source) => source,
            None => Arc::new(StepDiscovery::from_factory(
                &factory,
                ProcessRunner::new(),
                Arc::clone(&fs),
            )?),
        };

        let cache = Arc::new(StepCache::new(source, picker, Arc::clone(&factory)));
        let correlator = TaskCorrelator::new(Arc::clone(&host));
        let orchestrator = LaunchOrchestrator::new(
            Arc::clone(&cache),
            correlator,
            Arc::clone(&factory),
            debugger,
            fs,
            &config.debugger,
        );

        debug!(root = %workspace_root.display(), "application context ready");

        Ok(Self {
            config,
            workspace_root,
            factory,
            cache,
            host,
            orchestrator,
            watcher: None,
        })
    }

    /// Start invalidating the step cache when the build file changes.
    ///
    /// No-op if already watching.
    pub fn start_watching(
        &mut self,
        changes: Option<mpsc::UnboundedSender<BuildFileChange>>,
    ) -> Result<()> {
        if self.watcher.is_some() {
            return Ok(());
        }
        let handle = spawn_build_file_watcher(
            self.factory.build_file().to_path_buf(),
            Arc::clone(&self.cache),
            changes,
        )?;
        self.watcher = Some(handle);
        Ok(())
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn build_file(&self) -> &Path {
        self.factory.build_file()
    }

    pub fn cache(&self) -> &Arc<StepCache> {
        &self.cache
    }

    pub fn host(&self) -> &Arc<dyn TaskHost> {
        &self.host
    }

    pub fn orchestrator(&self) -> &LaunchOrchestrator {
        &self.orchestrator
    }

    /// Wait for the task behind `report` to end.
    ///
    /// If `interrupt` completes first, every running task is cancelled and
    /// the wait fails with [`StepRunnerError::Interrupted`]. `None` when the
    /// report no longer holds an end signal.
    pub async fn wait_for_end(
        &self,
        report: &mut LaunchReport,
        interrupt: impl Future<Output = ()>,
    ) -> Result<Option<TaskEnded>> {
        let Some(on_end) = report.on_end.take() else {
            return Ok(None);
        };

        tokio::select! {
            ended = on_end => Ok(Some(ended?)),
            _ = interrupt => {
                let cancelled = self.host.cancel_all();
                warn!(target = %report.target, cancelled, "interrupted; stopping running tasks");
                Err(StepRunnerError::Interrupted(report.target.clone()))
            }
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Tear down in reverse construction order: stop watching, stop running
    /// tasks, then release the orchestrator, cache and factory.
    pub fn shutdown(self) {
        let AppContext {
            config: _,
            workspace_root,
            factory,
            cache,
            host,
            orchestrator,
            watcher,
        } = self;

        drop(watcher);

        let cancelled = host.cancel_all();
        if cancelled > 0 {
            info!(cancelled, "stopped running tasks on shutdown");
        }

        drop(orchestrator);
        drop(host);
        drop(cache);
        drop(factory);
        debug!(root = %workspace_root.display(), "application context shut down");
    }
}
