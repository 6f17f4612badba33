// tests/watcher.rs

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use notify::event::{CreateKind, DataChange, EventKind, ModifyKind, RemoveKind};
use notify::Event;
use tokio::sync::mpsc;

use steprunner::cache::StepCache;
use steprunner::launch::TaskFactory;
use steprunner::watch::path_utils::same_file;
use steprunner::watch::{is_build_file_event, spawn_build_file_watcher, BuildFileChange};
use steprunner_test_utils::builders::{steps, ConfigFileBuilder};
use steprunner_test_utils::fakes::{FakeStepSource, ScriptedPicker};
use steprunner_test_utils::{init_tracing, with_timeout};

fn event(kind: EventKind, path: PathBuf) -> Event {
    Event::new(kind).add_path(path)
}

#[test]
fn classifies_changes_to_the_build_file() {
    let dir = tempfile::tempdir().unwrap();
    let build_file = dir.path().join("build.zig");

    let created = event(EventKind::Create(CreateKind::File), build_file.clone());
    let modified = event(
        EventKind::Modify(ModifyKind::Data(DataChange::Content)),
        build_file.clone(),
    );
    let removed = event(EventKind::Remove(RemoveKind::File), build_file.clone());

    assert_eq!(is_build_file_event(&created, &build_file), Some(BuildFileChange::Created));
    assert_eq!(is_build_file_event(&modified, &build_file), Some(BuildFileChange::Changed));
    assert_eq!(is_build_file_event(&removed, &build_file), Some(BuildFileChange::Deleted));
}

#[test]
fn ignores_other_files_and_access_events() {
    let dir = tempfile::tempdir().unwrap();
    let build_file = dir.path().join("build.zig");

    let sibling = event(
        EventKind::Modify(ModifyKind::Any),
        dir.path().join("build.zig.zon"),
    );
    let access = event(
        EventKind::Access(notify::event::AccessKind::Any),
        build_file.clone(),
    );

    assert_eq!(is_build_file_event(&sibling, &build_file), None);
    assert_eq!(is_build_file_event(&access, &build_file), None);
}

#[test]
fn same_file_resolves_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let target = dir.path().join("build.zig");
    let roundabout = dir.path().join("sub").join("..").join("build.zig");

    assert!(same_file(&target, &target));
    assert!(same_file(&target, &roundabout));
    assert!(!same_file(&target, &dir.path().join("sub").join("build.zig")));
}

#[tokio::test]
async fn writing_the_build_file_invalidates_the_cache() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let build_file = dir.path().join("build.zig");
    fs::write(&build_file, "// v1\n").unwrap();

    let cfg = ConfigFileBuilder::new().build();
    let factory = Arc::new(TaskFactory::from_config(&cfg, dir.path()).unwrap());
    let source = Arc::new(FakeStepSource::new(steps(&[("run", "Run: app", false)])));
    let cache = Arc::new(StepCache::new(
        source.clone(),
        Arc::new(ScriptedPicker::new()),
        factory,
    ));
    cache.get_steps(false).await.unwrap();
    let before = cache.generation();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = spawn_build_file_watcher(&build_file, Arc::clone(&cache), Some(tx)).unwrap();
    assert_eq!(handle.build_file(), build_file.as_path());

    // Unrelated files in the same directory do not count.
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    fs::write(&build_file, "// v2\n").unwrap();

    let change = with_timeout(rx.recv()).await.unwrap();
    assert!(matches!(
        change,
        BuildFileChange::Changed | BuildFileChange::Created
    ));
    assert!(cache.generation() > before);

    cache.get_steps(false).await.unwrap();
    assert_eq!(source.calls(), 2);
}
