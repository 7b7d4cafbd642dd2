//! Agent executor tests against real child processes.
//!
//! Each test stands in for the agent with `sh -c <script>`; the task
//! descriptor lands in `$0`.

#![cfg(unix)]

use std::time::{Duration, Instant};

use serial_test::serial;
use tokio_util::sync::CancellationToken;

use shift_supervisor::orchestrator::executor::INTERRUPTED_ERROR;
use shift_supervisor::orchestrator::{TaskExecutor, TaskRunner};

fn shell(script: &str, timeout: Duration) -> TaskExecutor {
    TaskExecutor::new("sh", vec!["-c".into(), script.into()], timeout)
}

#[tokio::test]
#[serial]
async fn successful_run_captures_stdout() {
    let executor = shell(r#"printf '%s' "$0""#, Duration::from_secs(10));

    let result = executor
        .run("Refactor the parser", &CancellationToken::new())
        .await;

    assert!(result.success, "error: {}", result.error);
    assert_eq!(result.output, "Refactor the parser");
    assert!(result.duration < Duration::from_secs(10));
}

#[tokio::test]
#[serial]
async fn non_zero_exit_is_a_failure_with_stderr() {
    let executor = shell("echo 'lint failed' >&2; exit 3", Duration::from_secs(10));

    let result = executor.run("Fix lints", &CancellationToken::new()).await;

    assert!(!result.success);
    assert!(result.error.contains("lint failed"));
}

#[tokio::test]
#[serial]
async fn missing_program_is_reported_not_raised() {
    let executor = TaskExecutor::new(
        "/nonexistent/agent-cli",
        vec!["task".into(), "new".into()],
        Duration::from_secs(10),
    );

    let result = executor.run("anything", &CancellationToken::new()).await;

    assert!(!result.success);
    assert!(!result.error.is_empty());
}

#[tokio::test]
#[serial]
async fn timeout_kills_agent_and_reports_limit() {
    let executor = shell("sleep 30", Duration::from_secs(1));

    let started = Instant::now();
    let result = executor.run("Hang forever", &CancellationToken::new()).await;

    assert!(!result.success);
    assert_eq!(result.error, "exceeded 1 seconds");
    assert_eq!(result.duration, Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
#[serial]
async fn timeout_also_kills_grandchildren() {
    // The backgrounded sleep holds stdout open; only a group kill releases it.
    let executor = shell("sleep 30 & wait", Duration::from_secs(1));

    let started = Instant::now();
    let result = executor.run("Spawn helpers", &CancellationToken::new()).await;

    assert!(!result.success);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
#[serial]
async fn cancellation_interrupts_running_agent() {
    let executor = shell("sleep 30", Duration::from_secs(60));
    let cancel = CancellationToken::new();

    let trigger = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    };
    let started = Instant::now();
    let (result, ()) = tokio::join!(executor.run("Long task", &cancel), trigger);

    assert!(!result.success);
    assert_eq!(result.error, INTERRUPTED_ERROR);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
#[serial]
async fn runs_in_configured_working_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let executor = shell("pwd", Duration::from_secs(10)).with_working_dir(dir.path());

    let result = executor.run("Where am I", &CancellationToken::new()).await;

    assert!(result.success);
    let reported = std::fs::canonicalize(result.output.trim()).expect("reported dir");
    let expected = std::fs::canonicalize(dir.path()).expect("temp dir");
    assert_eq!(reported, expected);
}

#[tokio::test]
#[serial]
async fn stdin_is_closed() {
    let executor = shell("cat; echo done", Duration::from_secs(5));

    let result = executor.run("Read stdin", &CancellationToken::new()).await;

    assert!(result.success);
    assert_eq!(result.output.trim(), "done");
}
