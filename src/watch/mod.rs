// src/watch/mod.rs

//! Build-file watching.
//!
//! Turns filesystem notifications about the build file into
//! [`StepCache::invalidate`](crate::cache::StepCache::invalidate) calls, so
//! the next step lookup rediscovers.

pub mod path_utils;
pub mod watcher;

pub use watcher::{is_build_file_event, spawn_build_file_watcher, BuildFileChange, WatcherHandle};
