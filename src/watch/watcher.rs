// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::StepCache;
use crate::watch::path_utils::same_file;

/// Kind of change observed on the build file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildFileChange {
    Created,
    Changed,
    Deleted,
}

impl std::fmt::Display for BuildFileChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BuildFileChange::Created => "created",
            BuildFileChange::Changed => "changed",
            BuildFileChange::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Handle for the build-file watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle
/// stops watching and ends the forwarding task.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    task: JoinHandle<()>,
    build_file: PathBuf,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("build_file", &self.build_file)
            .finish()
    }
}

impl WatcherHandle {
    pub fn build_file(&self) -> &Path {
        &self.build_file
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Classify a notify event. `None` unless it is a create, modify or remove
/// event that touches `build_file`.
pub fn is_build_file_event(event: &Event, build_file: &Path) -> Option<BuildFileChange> {
    let change = match event.kind {
        EventKind::Create(_) => BuildFileChange::Created,
        EventKind::Modify(_) => BuildFileChange::Changed,
        EventKind::Remove(_) => BuildFileChange::Deleted,
        _ => return None,
    };

    event
        .paths
        .iter()
        .any(|p| same_file(build_file, p))
        .then_some(change)
}

/// Watch `build_file` and invalidate `cache` whenever it is created,
/// changed or deleted.
///
/// The parent directory is watched non-recursively so that creation and
/// deletion of the file itself are seen. Every detected change is also
/// forwarded on `changes`, if given.
pub fn spawn_build_file_watcher(
    build_file: impl Into<PathBuf>,
    cache: Arc<StepCache>,
    changes: Option<mpsc::UnboundedSender<BuildFileChange>>,
) -> Result<WatcherHandle> {
    let build_file = build_file.into();
    let dir = match build_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // We can't log via tracing reliably here, so fall back to stderr.
                    eprintln!("steprunner: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("steprunner: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .context("creating build file watcher")?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching {:?}", dir))?;

    info!(build_file = %build_file.display(), "watching build file for changes");

    let target = build_file.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");

            let Some(change) = is_build_file_event(&event, &target) else {
                continue;
            };

            info!(?change, build_file = %target.display(), "build file changed; invalidating steps");
            cache.invalidate();

            if let Some(ref tx) = changes {
                if tx.send(change).is_err() {
                    warn!("build file change listener dropped");
                }
            }
        }
        debug!("build file watcher loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        task,
        build_file,
    })
}
