// src/cache/mod.rs

//! Memoized build steps, the tasks derived from them, and the last step the
//! user picked.
//!
//! All three are dropped together by [`StepCache::invalidate`], which the
//! build-file watcher calls on every change. Discovery results are committed
//! only if no invalidation happened while the discovery call was running.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::discovery::StepSource;
use crate::errors::Result;
use crate::host::{PickItem, Picker, Task};
use crate::launch::TaskFactory;
use crate::types::StepDescriptor;

/// How often discovery is repeated when the cache is invalidated while a
/// call is in flight, before the last result is returned uncommitted.
const MAX_STALE_RETRIES: usize = 2;

#[derive(Debug, Default)]
struct CacheEntry {
    steps: Option<Arc<Vec<StepDescriptor>>>,
    /// Always derived from the `steps` value currently stored.
    derived_tasks: Option<Arc<Vec<Task>>>,
    picked_step: Option<String>,
}

pub struct StepCache {
    source: Arc<dyn StepSource>,
    picker: Arc<dyn Picker>,
    factory: Arc<TaskFactory>,
    entry: Mutex<CacheEntry>,
    generation: AtomicU64,
    /// Serializes discovery so concurrent callers share one call.
    discovery: tokio::sync::Mutex<()>,
}

impl fmt::Debug for StepCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepCache")
            .field("entry", &*self.lock())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl StepCache {
    pub fn new(source: Arc<dyn StepSource>, picker: Arc<dyn Picker>, factory: Arc<TaskFactory>) -> Self {
        Self {
            source,
            picker,
            factory,
            entry: Mutex::new(CacheEntry::default()),
            generation: AtomicU64::new(0),
            discovery: tokio::sync::Mutex::new(()),
        }
    }

    /// Number of invalidations so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Drop steps, derived tasks and the picked step.
    pub fn invalidate(&self) {
        let mut entry = self.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *entry = CacheEntry::default();
        debug!(generation, "step cache invalidated");
    }

    /// Cached steps, running discovery if the cache is empty or `force` is set.
    ///
    /// A forced call invalidates first, so it also forgets the picked step.
    /// On failure nothing is cached and the error is returned.
    pub async fn get_steps(&self, force: bool) -> Result<Arc<Vec<StepDescriptor>>> {
        if force {
            info!("forced reload of build steps");
            self.invalidate();
        }

        if let Some(steps) = self.cached_steps() {
            return Ok(steps);
        }

        let _guard = self.discovery.lock().await;

        // Another caller may have filled the cache while we waited.
        if let Some(steps) = self.cached_steps() {
            return Ok(steps);
        }

        let mut retries = 0;
        loop {
            let generation = self.generation();
            let steps = Arc::new(self.source.discover().await?);

            if self.commit_steps(generation, &steps) {
                return Ok(steps);
            }

            if retries >= MAX_STALE_RETRIES {
                warn!(
                    generation,
                    "build file kept changing during discovery; returning uncached steps"
                );
                return Ok(steps);
            }
            retries += 1;
            debug!(generation, retries, "cache invalidated during discovery; rediscovering");
        }
    }

    /// One task per step, cached alongside the steps.
    pub async fn get_tasks(&self, force: bool) -> Result<Arc<Vec<Task>>> {
        let steps = self.get_steps(force).await?;

        {
            let entry = self.lock();
            if let (Some(cached_steps), Some(tasks)) = (&entry.steps, &entry.derived_tasks) {
                if Arc::ptr_eq(cached_steps, &steps) {
                    return Ok(Arc::clone(tasks));
                }
            }
        }

        let tasks: Arc<Vec<Task>> = Arc::new(
            steps
                .iter()
                .map(|step| self.factory.build_task(&step.name))
                .collect(),
        );

        let mut entry = self.lock();
        if entry
            .steps
            .as_ref()
            .is_some_and(|cached| Arc::ptr_eq(cached, &steps))
        {
            entry.derived_tasks = Some(Arc::clone(&tasks));
        }
        Ok(tasks)
    }

    /// The last picked step, prompting when there is none or `force_pick`.
    ///
    /// Returns `None` when the user dismisses the prompt; that is not cached.
    pub async fn get_picked_step(&self, force_pick: bool) -> Result<Option<String>> {
        if !force_pick {
            if let Some(name) = self.picked_step() {
                return Ok(Some(name));
            }
        }

        let generation = self.generation();
        let steps = self.get_steps(false).await?;
        let ordered = sorted_for_display(&steps);

        if ordered.is_empty() {
            info!("build file defines no steps to pick from");
            return Ok(None);
        }

        let items = ordered.iter().map(PickItem::from_step).collect();
        let Some(index) = self.picker.pick(items).await? else {
            debug!("step selection dismissed");
            return Ok(None);
        };

        let Some(step) = ordered.get(index) else {
            warn!(index, count = ordered.len(), "picker returned an out-of-range choice");
            return Ok(None);
        };

        let mut entry = self.lock();
        if self.generation() == generation {
            entry.picked_step = Some(step.name.clone());
        } else {
            debug!(step = %step.name, "cache invalidated while picking; not remembering choice");
        }
        info!(step = %step.name, "picked build step");
        Ok(Some(step.name.clone()))
    }

    /// Peek at the picked step without prompting.
    pub fn picked_step(&self) -> Option<String> {
        self.lock().picked_step.clone()
    }

    fn cached_steps(&self) -> Option<Arc<Vec<StepDescriptor>>> {
        self.lock().steps.clone()
    }

    /// Store `steps` unless an invalidation happened since `generation` was read.
    fn commit_steps(&self, generation: u64, steps: &Arc<Vec<StepDescriptor>>) -> bool {
        let mut entry = self.lock();
        if self.generation() != generation {
            return false;
        }
        entry.steps = Some(Arc::clone(steps));
        entry.derived_tasks = None;
        true
    }

    fn lock(&self) -> MutexGuard<'_, CacheEntry> {
        self.entry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Steps ordered for presentation: by category (`Run < Test < Build < Tool
/// < None`), keeping discovery order within a category.
pub fn sorted_for_display(steps: &[StepDescriptor]) -> Vec<StepDescriptor> {
    let mut ordered = steps.to_vec();
    ordered.sort_by_key(|step| step.category);
    ordered
}
