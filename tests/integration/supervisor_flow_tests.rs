//! Session state machine tests.
//!
//! Most tests drive the supervisor with in-memory stores, a scripted runner
//! and an [`AnchoredClock`] under a paused runtime, so whole nights of
//! simulated shift time pass in milliseconds. The last two run a real agent
//! process against file-backed stores.

use std::time::{Duration, Instant};

use serial_test::serial;
use tokio_util::sync::CancellationToken;

use shift_supervisor::models::state::SupervisorState;
use shift_supervisor::orchestrator::{SessionOutcome, Supervisor, SupervisorPhase, TaskExecutor};
use shift_supervisor::persistence::memory::{MemoryQueueStore, MemoryStateStore};
use shift_supervisor::persistence::{FileQueueStore, JsonStateStore, QueueStore, StateStore};
use shift_supervisor::scheduler::AnchoredClock;

use super::test_helpers::{
    at, file_backed_config, night_config, night_config_with, no_shift_config, ScriptedRunner,
};

#[tokio::test(start_paused = true)]
async fn drains_queue_in_order_and_stops_when_shift_ends() {
    let queue = MemoryQueueStore::with_tasks(["Add docs", "Fix tests"]);
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::succeeding();
    let supervisor = Supervisor::new(
        night_config(),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(23, 0, 0)),
    );
    let phase = supervisor.subscribe();

    let report = supervisor.run(&CancellationToken::new()).await.expect("session");

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert_eq!(runner.calls(), vec!["Add docs", "Fix tests"]);
    assert_eq!(report.state.tasks_completed, 2);
    assert_eq!(report.state.tasks_failed, 0);
    assert!(queue.snapshot().is_empty());
    assert!(queue.load_claim().expect("claim").is_none());
    assert_eq!(*phase.borrow(), SupervisorPhase::Stopped);
    assert_eq!(state.snapshot(), Some(report.state));
}

#[tokio::test(start_paused = true)]
async fn failed_task_is_counted_and_not_retried() {
    let queue = MemoryQueueStore::with_tasks(["Broken task", "Good task"]);
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::with_outcomes([false, true]);
    let supervisor = Supervisor::new(
        night_config(),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(23, 0, 0)),
    );

    let report = supervisor.run(&CancellationToken::new()).await.expect("session");

    assert_eq!(runner.calls(), vec!["Broken task", "Good task"]);
    assert_eq!(report.state.tasks_completed, 1);
    assert_eq!(report.state.tasks_failed, 1);
    assert!(queue.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn state_is_saved_after_every_task() {
    let queue = MemoryQueueStore::with_tasks(["one", "two", "three"]);
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::succeeding();
    let supervisor = Supervisor::new(
        night_config(),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(23, 0, 0)),
    );

    supervisor.run(&CancellationToken::new()).await.expect("session");

    // One save at session start plus one per task.
    assert_eq!(state.save_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn counters_accumulate_across_sessions() {
    let queue = MemoryQueueStore::with_tasks(["task"]);
    let state = MemoryStateStore::with_state(SupervisorState {
        session_start: Some(at(22, 0, 0)),
        tasks_completed: 5,
        tasks_failed: 2,
        total_runtime_hours: 0.5,
        last_claimed_at: None,
    });
    let runner = ScriptedRunner::succeeding();
    let origin = at(23, 0, 0);
    let supervisor = Supervisor::new(
        night_config(),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(origin),
    );

    let report = supervisor.run(&CancellationToken::new()).await.expect("session");

    assert_eq!(report.state.tasks_completed, 6);
    assert_eq!(report.state.tasks_failed, 2);
    assert_eq!(report.state.session_start, Some(origin));
}

#[tokio::test(start_paused = true)]
async fn waits_for_shift_before_touching_the_queue() {
    let queue = MemoryQueueStore::with_tasks(["Nightly cleanup"]);
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::succeeding();
    let supervisor = Supervisor::new(
        night_config(),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(20, 0, 0)),
    );
    let phase = supervisor.subscribe();
    let cancel = CancellationToken::new();

    let observe = async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(*phase.borrow(), SupervisorPhase::WaitingForShift);
        assert_eq!(queue.snapshot(), vec!["Nightly cleanup"]);
        assert!(runner.calls().is_empty());
    };
    let (report, ()) = tokio::join!(supervisor.run(&cancel), observe);
    let report = report.expect("session");

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert_eq!(runner.calls(), vec!["Nightly cleanup"]);
    assert_eq!(report.state.tasks_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn no_shift_windows_never_starts_work() {
    let queue = MemoryQueueStore::with_tasks(["Never runs"]);
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::succeeding();
    let supervisor = Supervisor::new(
        no_shift_config(),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(12, 0, 0)),
    );
    let phase = supervisor.subscribe();
    let cancel = CancellationToken::new();

    let observe = async {
        tokio::time::sleep(Duration::from_secs(72 * 3600)).await;
        assert_eq!(*phase.borrow(), SupervisorPhase::WaitingForShift);
        cancel.cancel();
    };
    let (report, ()) = tokio::join!(supervisor.run(&cancel), observe);
    let report = report.expect("session");

    assert_eq!(report.outcome, SessionOutcome::Interrupted);
    assert!(runner.calls().is_empty());
    assert_eq!(queue.snapshot(), vec!["Never runs"]);
}

#[tokio::test(start_paused = true)]
async fn shift_ending_during_pause_leaves_remaining_tasks_queued() {
    // The first poll after 06:00:00 lands 60 s into a 120 s pause.
    let queue = MemoryQueueStore::with_tasks(["First", "Second"]);
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::succeeding();
    let supervisor = Supervisor::new(
        night_config_with(120, 60),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(5, 59, 30)),
    );

    let started = tokio::time::Instant::now();
    let report = supervisor.run(&CancellationToken::new()).await.expect("session");

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert_eq!(runner.calls(), vec!["First"]);
    assert_eq!(queue.snapshot(), vec!["Second"]);
    assert_eq!(started.elapsed(), Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn shift_still_open_at_inclusive_end_keeps_pausing() {
    // 06:00:00 is inside the window, so the pause runs to its full length.
    let queue = MemoryQueueStore::with_tasks(["First", "Second"]);
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::succeeding();
    let supervisor = Supervisor::new(
        night_config_with(120, 60),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(5, 59, 0)),
    );

    let started = tokio::time::Instant::now();
    supervisor.run(&CancellationToken::new()).await.expect("session");

    assert_eq!(runner.calls(), vec!["First"]);
    assert_eq!(started.elapsed(), Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn draining_queue_resumes_when_tasks_arrive() {
    let queue = MemoryQueueStore::default();
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::succeeding();
    let supervisor = Supervisor::new(
        night_config(),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(23, 0, 0)),
    );
    let phase = supervisor.subscribe();
    let cancel = CancellationToken::new();

    let producer = async {
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(*phase.borrow(), SupervisorPhase::DrainingEmptyQueue);
        queue.push("Late arrival").expect("push");
    };
    let (report, ()) = tokio::join!(supervisor.run(&cancel), producer);
    let report = report.expect("session");

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert_eq!(runner.calls(), vec!["Late arrival"]);
    assert_eq!(report.state.tasks_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_task_counts_failure_and_keeps_rest_of_queue() {
    let queue = MemoryQueueStore::with_tasks(["Slow task", "Next task"]);
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::with_delay(Duration::from_secs(600));
    let supervisor = Supervisor::new(
        night_config(),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(23, 0, 0)),
    );
    let cancel = CancellationToken::new();

    let interrupt = async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        cancel.cancel();
    };
    let (report, ()) = tokio::join!(supervisor.run(&cancel), interrupt);
    let report = report.expect("session");

    assert_eq!(report.outcome, SessionOutcome::Interrupted);
    assert_eq!(runner.calls(), vec!["Slow task"]);
    assert_eq!(report.state.tasks_failed, 1);
    assert_eq!(queue.snapshot(), vec!["Next task"]);
    assert!(queue.load_claim().expect("claim").is_none());
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_pause_does_not_start_next_task() {
    let queue = MemoryQueueStore::with_tasks(["First", "Second"]);
    let state = MemoryStateStore::default();
    let runner = ScriptedRunner::succeeding();
    let supervisor = Supervisor::new(
        night_config_with(300, 60),
        &queue,
        &state,
        &runner,
        AnchoredClock::starting_at(at(23, 0, 0)),
    );
    let cancel = CancellationToken::new();

    let interrupt = async {
        tokio::time::sleep(Duration::from_secs(90)).await;
        cancel.cancel();
    };
    let (report, ()) = tokio::join!(supervisor.run(&cancel), interrupt);
    let report = report.expect("session");

    assert_eq!(report.outcome, SessionOutcome::Interrupted);
    assert_eq!(runner.calls(), vec!["First"]);
    assert_eq!(report.state.tasks_completed, 1);
    assert_eq!(queue.snapshot(), vec!["Second"]);
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn real_agent_drains_file_queue_until_shift_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = file_backed_config(dir.path(), "exit 0", 0, 1);
    std::fs::write(&config.queue_file, "First task\n# skipped\n\nSecond task\n").expect("queue");

    let queue = FileQueueStore::new(&config.queue_file);
    let state = JsonStateStore::new(&config.state_file);
    let supervisor = Supervisor::new(
        config.clone(),
        &queue,
        &state,
        TaskExecutor::from_config(&config),
        AnchoredClock::starting_at(at(5, 59, 57)),
    );

    let started = Instant::now();
    let report = supervisor.run(&CancellationToken::new()).await.expect("session");

    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert_eq!(report.state.tasks_completed, 2);
    assert_eq!(report.state.tasks_failed, 0);
    assert!(queue.load().expect("queue").is_empty());
    assert!(!queue.claim_path().exists());
    assert_eq!(state.load(), report.state);
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn real_agent_failures_are_counted_and_removed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = file_backed_config(dir.path(), "echo broken >&2; exit 1", 0, 1);
    std::fs::write(&config.queue_file, "Only task\n").expect("queue");

    let queue = FileQueueStore::new(&config.queue_file);
    let state = JsonStateStore::new(&config.state_file);
    let supervisor = Supervisor::new(
        config.clone(),
        &queue,
        &state,
        TaskExecutor::from_config(&config),
        AnchoredClock::starting_at(at(5, 59, 58)),
    );

    let report = supervisor.run(&CancellationToken::new()).await.expect("session");

    assert_eq!(report.state.tasks_completed, 0);
    assert_eq!(report.state.tasks_failed, 1);
    assert!(queue.load().expect("queue").is_empty());
    assert_eq!(state.load().tasks_failed, 1);
}
