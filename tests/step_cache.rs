// tests/step_cache.rs

use std::sync::Arc;

use steprunner::cache::StepCache;
use steprunner::errors::StepRunnerError;
use steprunner::launch::TaskFactory;
use steprunner_test_utils::builders::{steps, ConfigFileBuilder};
use steprunner_test_utils::fakes::{FakeStepSource, ScriptedPicker};
use steprunner_test_utils::{init_tracing, with_timeout};

const STEPS: &[(&str, &str, bool)] = &[
    ("install", "Copy build artifacts", true),
    ("docs", "Build: documentation", false),
    ("run", "Run: the app", false),
    ("test", "Test: unit tests", false),
];

fn factory() -> Arc<TaskFactory> {
    let cfg = ConfigFileBuilder::new().build();
    Arc::new(TaskFactory::from_config(&cfg, "/work").unwrap())
}

fn cache_with(
    source: &Arc<FakeStepSource>,
    picker: &Arc<ScriptedPicker>,
) -> Arc<StepCache> {
    Arc::new(StepCache::new(
        source.clone(),
        picker.clone(),
        factory(),
    ))
}

fn setup() -> (Arc<FakeStepSource>, Arc<ScriptedPicker>, Arc<StepCache>) {
    init_tracing();
    let source = Arc::new(FakeStepSource::new(steps(STEPS)));
    let picker = Arc::new(ScriptedPicker::new());
    let cache = cache_with(&source, &picker);
    (source, picker, cache)
}

#[tokio::test]
async fn repeated_reads_share_one_discovery() {
    let (source, _picker, cache) = setup();

    let first = cache.get_steps(false).await.unwrap();
    let second = cache.get_steps(false).await.unwrap();

    assert_eq!(source.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.len(), 4);
}

#[tokio::test]
async fn forced_read_rediscovers() {
    let (source, _picker, cache) = setup();

    cache.get_steps(false).await.unwrap();
    cache.get_steps(true).await.unwrap();

    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn invalidate_drops_steps_and_picked_step() {
    let (source, picker, cache) = setup();
    picker.push_answer(Some(0));

    assert_eq!(cache.get_picked_step(false).await.unwrap().as_deref(), Some("run"));
    assert_eq!(cache.picked_step().as_deref(), Some("run"));

    let before = cache.generation();
    cache.invalidate();
    assert_eq!(cache.generation(), before + 1);
    assert_eq!(cache.picked_step(), None);

    cache.get_steps(false).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn failed_discovery_is_not_cached() {
    let (source, _picker, cache) = setup();
    source.push_err("build file has errors");

    let err = cache.get_steps(false).await.unwrap_err();
    assert!(matches!(err, StepRunnerError::DiscoveryParse { .. }));

    let steps = cache.get_steps(false).await.unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn invalidation_during_discovery_discards_the_stale_result() {
    let (source, _picker, cache) = setup();
    source.push_ok(steps(&[("old", "Run: stale", false)]));
    source.set_steps(steps(&[("new", "Run: fresh", false)]));
    let gate = source.pause_next_call();

    let reader = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_steps(false).await })
    };

    with_timeout(gate.entered.notified()).await;
    cache.invalidate();
    gate.release.notify_one();

    let result = with_timeout(reader).await.unwrap().unwrap();
    assert_eq!(result[0].name, "new");
    assert_eq!(source.calls(), 2);

    let cached = cache.get_steps(false).await.unwrap();
    assert_eq!(cached[0].name, "new");
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn concurrent_readers_wait_for_the_same_discovery() {
    let (source, _picker, cache) = setup();
    let gate = source.pause_next_call();

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_steps(false).await })
        })
        .collect();

    with_timeout(gate.entered.notified()).await;
    gate.release.notify_one();

    for reader in readers {
        let steps = with_timeout(reader).await.unwrap().unwrap();
        assert_eq!(steps.len(), 4);
    }
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn picker_shows_steps_by_category() {
    let (_source, picker, cache) = setup();
    picker.push_answer(Some(2));

    let picked = cache.get_picked_step(false).await.unwrap();

    let shown = picker.last_shown().unwrap();
    let labels: Vec<&str> = shown.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["run", "test", "docs", "install"]);
    assert_eq!(shown[3].description, "(default) Copy build artifacts");
    assert_eq!(picked.as_deref(), Some("docs"));
}

#[tokio::test]
async fn picked_step_is_remembered_until_forced() {
    let (_source, picker, cache) = setup();
    picker.push_answer(Some(0));
    picker.push_answer(Some(1));

    assert_eq!(cache.get_picked_step(false).await.unwrap().as_deref(), Some("run"));
    assert_eq!(cache.get_picked_step(false).await.unwrap().as_deref(), Some("run"));
    assert_eq!(picker.prompts(), 1);

    assert_eq!(cache.get_picked_step(true).await.unwrap().as_deref(), Some("test"));
    assert_eq!(picker.prompts(), 2);
    assert_eq!(cache.picked_step().as_deref(), Some("test"));
}

#[tokio::test]
async fn dismissed_prompt_is_not_remembered() {
    let (_source, picker, cache) = setup();
    picker.push_answer(None);
    picker.push_answer(Some(0));

    assert_eq!(cache.get_picked_step(false).await.unwrap(), None);
    assert_eq!(cache.picked_step(), None);

    assert_eq!(cache.get_picked_step(false).await.unwrap().as_deref(), Some("run"));
    assert_eq!(picker.prompts(), 2);
}

#[tokio::test]
async fn out_of_range_choice_counts_as_dismissal() {
    let (_source, picker, cache) = setup();
    picker.push_answer(Some(99));

    assert_eq!(cache.get_picked_step(false).await.unwrap(), None);
    assert_eq!(cache.picked_step(), None);
}

#[tokio::test]
async fn choice_made_during_invalidation_is_returned_but_not_kept() {
    let (_source, picker, cache) = setup();
    picker.push_answer(Some(0));
    {
        let cache = Arc::clone(&cache);
        picker.before_answer(move || cache.invalidate());
    }

    assert_eq!(cache.get_picked_step(false).await.unwrap().as_deref(), Some("run"));
    assert_eq!(cache.picked_step(), None);
}

#[tokio::test]
async fn no_steps_means_no_prompt() {
    init_tracing();
    let source = Arc::new(FakeStepSource::new(Vec::new()));
    let picker = Arc::new(ScriptedPicker::answering(&[Some(0)]));
    let cache = cache_with(&source, &picker);

    assert_eq!(cache.get_picked_step(false).await.unwrap(), None);
    assert_eq!(picker.prompts(), 0);
}

#[tokio::test]
async fn tasks_are_derived_from_cached_steps() {
    let (source, _picker, cache) = setup();

    let tasks = cache.get_tasks(false).await.unwrap();
    let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["build install", "build docs", "build run", "build test"]);
    assert_eq!(tasks[2].program, "zig");
    assert_eq!(tasks[2].args[..2], ["build".to_string(), "run".to_string()]);

    let again = cache.get_tasks(false).await.unwrap();
    assert!(Arc::ptr_eq(&tasks, &again));
    assert_eq!(source.calls(), 1);

    source.set_steps(steps(&[("only", "Run: one", false)]));
    cache.invalidate();
    let fresh = cache.get_tasks(false).await.unwrap();
    assert!(!Arc::ptr_eq(&tasks, &fresh));
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].name, "build only");
}
