// src/watch/path_utils.rs

//! Path comparison for watcher events.

use std::path::{Path, PathBuf};

/// Whether `event_path` names the same file as `target`.
///
/// - Direct equality first.
/// - Otherwise compare file names, then canonicalized parent directories.
///   The file itself may no longer exist (remove events), so only the parents
///   are canonicalized. This covers platforms (notably macOS) that report
///   `/private/var/...` for `/var/...`.
pub fn same_file(target: &Path, event_path: &Path) -> bool {
    if target == event_path {
        return true;
    }

    if target.file_name() != event_path.file_name() {
        return false;
    }

    match (canonical_parent(target), canonical_parent(event_path)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn canonical_parent(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    parent.canonicalize().ok()
}
