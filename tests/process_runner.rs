// tests/process_runner.rs

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use steprunner::errors::StepRunnerError;
use steprunner::exec::{ExitKind, ProcessRunner, RunOptions};
use steprunner_test_utils::{init_tracing, with_timeout};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn captures_stdout_and_stderr() {
    init_tracing();
    let handle = ProcessRunner::new()
        .run("sh", &args(&["-c", "'echo out; echo err >&2'"]), RunOptions::new())
        .unwrap();

    let output = with_timeout(handle.wait()).await.unwrap();
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
    assert!(!output.killed);
}

#[tokio::test]
async fn on_start_fires_before_first_chunk() {
    init_tracing();
    let events = Arc::new(Mutex::new(Vec::<String>::new()));

    let start_log = Arc::clone(&events);
    let out_log = Arc::clone(&events);
    let options = RunOptions::new()
        .on_start(move || start_log.lock().unwrap().push("start".to_string()))
        .on_stdout(move |chunk| out_log.lock().unwrap().push(format!("out:{}", chunk.trim())));

    let handle = ProcessRunner::new()
        .run("echo", &args(&["hello"]), options)
        .unwrap();
    with_timeout(handle.wait()).await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.first().map(String::as_str), Some("start"));
    assert_eq!(events.iter().filter(|e| *e == "start").count(), 1);
    assert!(events.iter().any(|e| e == "out:hello"));
}

#[tokio::test]
async fn runs_in_the_given_directory() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let handle = ProcessRunner::new()
        .run("pwd", &[], RunOptions::new().cwd(dir.path()))
        .unwrap();
    assert_eq!(handle.cwd(), Some(dir.path()));

    let output = with_timeout(handle.wait()).await.unwrap();
    let expected = std::fs::canonicalize(dir.path()).unwrap();
    let actual = std::fs::canonicalize(output.stdout.trim()).unwrap();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn arguments_with_spaces_arrive_as_one_argument() {
    init_tracing();
    let handle = ProcessRunner::new()
        .run("printf", &args(&["x%sx", "two words"]), RunOptions::new())
        .unwrap();
    assert_eq!(handle.command_line(), "printf x%sx \"two words\"");

    let output = with_timeout(handle.wait()).await.unwrap();
    assert_eq!(output.stdout, "xtwo wordsx");
}

#[tokio::test]
async fn kill_resolves_with_partial_output() {
    init_tracing();
    let handle = ProcessRunner::new()
        .run("sh", &args(&["-c", "'echo ready; exec sleep 30'"]), RunOptions::new())
        .unwrap();
    assert!(handle.is_running());

    let killer = handle.killer();
    let waiter = tokio::spawn(handle.wait());

    tokio::time::sleep(Duration::from_millis(200)).await;
    killer.kill();
    assert!(!killer.is_running());

    let output = with_timeout(waiter).await.unwrap().unwrap();
    assert!(output.killed);
    assert_eq!(output.stdout, "ready\n");
}

#[tokio::test]
async fn kill_is_idempotent() {
    init_tracing();
    let handle = ProcessRunner::new()
        .run("sleep", &args(&["30"]), RunOptions::new())
        .unwrap();

    handle.kill();
    handle.kill();
    let output = with_timeout(handle.wait()).await.unwrap();
    assert!(output.killed);
}

#[tokio::test]
async fn nonzero_exit_is_an_error_with_output() {
    init_tracing();
    let handle = ProcessRunner::new()
        .run("sh", &args(&["-c", "'echo partial; echo broken >&2; exit 4'"]), RunOptions::new())
        .unwrap();

    let err = with_timeout(handle.wait()).await.unwrap_err();
    assert_eq!(err.exit, ExitKind::Code(4));
    assert!(!err.not_found);
    assert_eq!(err.stdout, "partial\n");
    assert_eq!(err.stderr, "broken\n");
    assert!(err.message.contains("exit code 4"), "{}", err.message);

    let err = StepRunnerError::from(err);
    assert!(matches!(err, StepRunnerError::ProcessExit(_)));
    assert_eq!(err.detail().as_deref(), Some("broken"));
}

#[tokio::test]
async fn unknown_program_is_not_found() {
    init_tracing();
    let handle = ProcessRunner::new()
        .run(
            "steprunner-missing-tool",
            &args(&["--version"]),
            RunOptions::new().not_found_hint("see the install guide"),
        )
        .unwrap();

    let err = with_timeout(handle.wait()).await.unwrap_err();
    assert!(err.not_found);
    assert_eq!(err.exit, ExitKind::Code(127));
    assert_eq!(err.hint.as_deref(), Some("see the install guide"));
    assert!(err.message.contains("steprunner-missing-tool"));

    let err = StepRunnerError::from(err);
    assert!(err.is_not_found());
    assert!(err.to_string().contains("see the install guide"));
}

#[tokio::test]
async fn not_found_can_be_reported_through_a_callback() {
    init_tracing();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);

    let handle = ProcessRunner::new()
        .run(
            "steprunner-missing-tool",
            &[],
            RunOptions::new().on_not_found(move |err| {
                *sink.lock().unwrap() = Some(err.program.clone());
            }),
        )
        .unwrap();

    let output = with_timeout(handle.wait()).await.unwrap();
    assert!(!output.killed);
    assert!(!output.stderr.is_empty());
    assert_eq!(
        seen.lock().unwrap().as_deref(),
        Some("steprunner-missing-tool")
    );
}

#[tokio::test]
async fn is_running_turns_false_after_exit() {
    init_tracing();
    let handle = ProcessRunner::new().run("true", &[], RunOptions::new()).unwrap();
    let killer = handle.killer();

    with_timeout(handle.wait()).await.unwrap();
    assert!(!killer.is_running());
}

#[tokio::test]
async fn shell_metacharacters_reach_the_program_verbatim() {
    init_tracing();
    let values = [
        "foo(bar)",
        "a$HOME",
        "C:\\x",
        "semi;colon",
        "glob*.zig",
        "tick`x",
        "amp&pipe|",
        "~/x",
        "two words",
    ];
    let mut argv = vec!["%s\\n".to_string()];
    argv.extend(values.iter().map(|v| v.to_string()));

    let handle = ProcessRunner::new()
        .run("printf", &argv, RunOptions::new())
        .unwrap();
    let output = with_timeout(handle.wait()).await.unwrap();

    let lines: Vec<&str> = output.stdout.lines().collect();
    assert_eq!(lines, values);
}

#[tokio::test]
async fn kill_reaches_a_process_that_closed_its_pipes() {
    init_tracing();
    let handle = ProcessRunner::new()
        .run("sh", &args(&["-c", "'exec >&- 2>&-; exec sleep 30'"]), RunOptions::new())
        .unwrap();
    let killer = handle.killer();
    let waiter = tokio::spawn(handle.wait());

    tokio::time::sleep(Duration::from_millis(300)).await;
    killer.kill();

    let started = std::time::Instant::now();
    let output = with_timeout(waiter).await.unwrap().unwrap();
    assert!(output.killed);
    assert!(started.elapsed() < Duration::from_secs(4), "{:?}", started.elapsed());
}

#[tokio::test]
async fn multibyte_characters_split_across_writes_stay_intact() {
    init_tracing();
    let chunks = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = Arc::clone(&chunks);
    let options = RunOptions::new().on_stdout(move |chunk| sink.lock().unwrap().push(chunk.to_string()));

    let handle = ProcessRunner::new()
        .run(
            "sh",
            &args(&["-c", "'printf \"\\303\"; sleep 0.2; printf \"\\251\\n\"'"]),
            options,
        )
        .unwrap();
    let output = with_timeout(handle.wait()).await.unwrap();
    assert_eq!(output.stdout, "é\n");

    let delivered = chunks.lock().unwrap().concat();
    assert_eq!(delivered, "é\n");
    assert!(!delivered.contains('\u{FFFD}'));
}
