//! Session state machine.
//!
//! One [`Supervisor::run`] call serves exactly one shift session:
//!
//! ```text
//! WaitingForShift ──shift opens──▶ Running ◀──queue refilled── DrainingEmptyQueue
//!                                    │  └──────queue empty──────────▶ │
//!                                    └──shift ends──▶ Stopped ◀──shift ends──┘
//! ```
//!
//! Tasks run strictly one at a time in queue order. After each task the
//! session counters are saved and the claim cleared before the next pop.
//! Task failures are counted and never leave the loop; store failures
//! propagate as errors. Cancellation ends any wait, pause or agent run and
//! yields [`SessionOutcome::Interrupted`].

use std::sync::Arc;

use chrono::NaiveDateTime;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::executor::TaskRunner;
use super::wait::{wait_until, WaitOutcome};
use crate::config::GlobalConfig;
use crate::models::state::SupervisorState;
use crate::persistence::{ClaimRecovery, QueueStore, StateStore, TaskQueue};
use crate::scheduler::{Clock, ShiftScheduler};
use crate::util::truncate_text;
use crate::Result;

const SEPARATOR: &str =
    "================================================================================";

/// Observable supervisor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    /// Outside every shift window, polling for one to open.
    WaitingForShift,
    /// Inside a shift, popping and executing tasks.
    Running,
    /// Inside a shift with nothing queued, polling for new tasks.
    DrainingEmptyQueue,
    /// Shift over; the session is finished.
    Stopped,
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The shift window closed.
    Stopped,
    /// Cancellation was requested.
    Interrupted,
}

/// Final outcome plus the counters as last recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// Why the session ended.
    pub outcome: SessionOutcome,
    /// Session counters at exit.
    pub state: SupervisorState,
}

/// Drives the queue through the agent during configured shifts.
pub struct Supervisor<Q, S, R, C> {
    config: Arc<GlobalConfig>,
    scheduler: ShiftScheduler,
    queue: TaskQueue<Q>,
    state_store: S,
    runner: R,
    clock: C,
    phase: watch::Sender<SupervisorPhase>,
}

impl<Q, S, R, C> Supervisor<Q, S, R, C>
where
    Q: QueueStore,
    S: StateStore,
    R: TaskRunner,
    C: Clock,
{
    /// Assemble a supervisor. Shift windows and timings come from `config`.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        queue_store: Q,
        state_store: S,
        runner: R,
        clock: C,
    ) -> Self {
        let scheduler = ShiftScheduler::new(config.shifts.clone());
        let (phase, _) = watch::channel(SupervisorPhase::WaitingForShift);
        Self {
            config,
            scheduler,
            queue: TaskQueue::new(queue_store),
            state_store,
            runner,
            clock,
            phase,
        }
    }

    /// Subscribe to phase transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorPhase> {
        self.phase.subscribe()
    }

    /// Serve one session until the shift ends or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns the first queue or state store failure; the session is
    /// abandoned at that point.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<SessionReport> {
        self.run_session(cancel)
            .instrument(info_span!("supervisor_session"))
            .await
    }

    async fn run_session(&self, cancel: &CancellationToken) -> Result<SessionReport> {
        self.log_banner();

        let mut state = self.state_store.load();
        state.session_start = Some(self.clock.now());

        let recovery = self.queue.recover()?;
        match &recovery {
            Some(ClaimRecovery::Abandoned(claim)) if state.has_recorded(claim.claimed_at) => {
                info!(task = %truncate_text(&claim.task, 80), "task from previous run already recorded");
            }
            Some(ClaimRecovery::Abandoned(claim)) => {
                warn!(task = %truncate_text(&claim.task, 80), "task from previous run counted as failed");
                state.record_outcome(false);
                state.last_claimed_at = Some(claim.claimed_at);
            }
            Some(ClaimRecovery::Requeued(task)) => {
                info!(task = %truncate_text(task, 80), "task from previous run returned to queue");
            }
            None => {}
        }
        self.state_store.save(&state)?;
        if recovery.is_some() {
            self.queue.complete()?;
        }

        let mut phase = if self.is_work_hours() {
            SupervisorPhase::Running
        } else {
            SupervisorPhase::WaitingForShift
        };

        loop {
            self.enter(phase);
            phase = match phase {
                SupervisorPhase::WaitingForShift => match self.wait_for_shift(cancel).await? {
                    WaitOutcome::Cancelled => return Ok(self.interrupted(state)),
                    WaitOutcome::Ready | WaitOutcome::Elapsed => {
                        info!(
                            shift = %self.current_shift_name(),
                            "entering shift, starting work"
                        );
                        SupervisorPhase::Running
                    }
                },
                SupervisorPhase::Running => {
                    let claimed_at = self.clock.now();
                    if !self.is_work_hours() {
                        SupervisorPhase::Stopped
                    } else if let Some(task) = self.queue.pop_front(claimed_at)? {
                        let shift = self.current_shift_name();
                        self.process(&task, claimed_at, &shift, &mut state, cancel)
                            .await?;
                        if cancel.is_cancelled() {
                            return Ok(self.interrupted(state));
                        }
                        match self.pause(cancel).await? {
                            WaitOutcome::Cancelled => return Ok(self.interrupted(state)),
                            WaitOutcome::Ready => {
                                info!(shift = %shift, "shift ended, stopping work");
                                SupervisorPhase::Stopped
                            }
                            WaitOutcome::Elapsed if self.is_work_hours() => SupervisorPhase::Running,
                            WaitOutcome::Elapsed => {
                                info!(shift = %shift, "shift ended, stopping work");
                                SupervisorPhase::Stopped
                            }
                        }
                    } else {
                        SupervisorPhase::DrainingEmptyQueue
                    }
                }
                SupervisorPhase::DrainingEmptyQueue => {
                    info!("task queue empty, waiting for more tasks");
                    let outcome = wait_until(
                        || Ok(!self.is_work_hours() || !self.queue.is_empty()?),
                        self.config.queue_poll_interval(),
                        None,
                        cancel,
                    )
                    .await?;
                    match outcome {
                        WaitOutcome::Cancelled => return Ok(self.interrupted(state)),
                        WaitOutcome::Ready | WaitOutcome::Elapsed => {
                            if self.is_work_hours() {
                                SupervisorPhase::Running
                            } else {
                                SupervisorPhase::Stopped
                            }
                        }
                    }
                }
                SupervisorPhase::Stopped => {
                    self.log_summary(&state);
                    info!("supervisor stopped (work hours ended)");
                    return Ok(SessionReport {
                        outcome: SessionOutcome::Stopped,
                        state,
                    });
                }
            };
        }
    }

    /// Execute one popped task and persist its outcome.
    async fn process(
        &self,
        task: &str,
        claimed_at: NaiveDateTime,
        shift: &str,
        state: &mut SupervisorState,
        cancel: &CancellationToken,
    ) -> Result<()> {
        info!(shift, task = %truncate_text(task, 80), "processing task");
        self.queue.mark_started()?;

        let result = self.runner.run(task, cancel).await;
        if result.success {
            info!("task completed in {:.1}s", result.duration_secs());
        } else {
            error!(
                duration_secs = result.duration_secs(),
                "task failed: {}",
                truncate_text(&result.error, 200)
            );
        }

        state.record_outcome(result.success);
        state.last_claimed_at = Some(claimed_at);
        state.update_runtime(self.clock.now());
        self.state_store.save(state)?;
        self.queue.complete()?;
        Ok(())
    }

    async fn wait_for_shift(&self, cancel: &CancellationToken) -> Result<WaitOutcome> {
        let next = self.scheduler.until_next_shift(self.clock.now());
        info!(
            "outside work hours, next shift in {:.1} hours",
            next.as_secs_f64() / 3600.0
        );
        wait_until(
            || Ok(self.is_work_hours()),
            self.config.shift_poll_interval(),
            None,
            cancel,
        )
        .await
    }

    /// Inter-task pause. `Ready` means the shift closed during the pause.
    async fn pause(&self, cancel: &CancellationToken) -> Result<WaitOutcome> {
        let pause = self.config.inter_task_pause();
        debug!(pause_secs = pause.as_secs(), "pausing before next task");
        wait_until(
            || Ok(!self.is_work_hours()),
            self.config.queue_poll_interval(),
            Some(pause),
            cancel,
        )
        .await
    }

    fn is_work_hours(&self) -> bool {
        self.scheduler.is_work_hours(self.clock.now())
    }

    fn current_shift_name(&self) -> String {
        self.scheduler
            .current_shift_name(self.clock.now())
            .unwrap_or("none")
            .to_owned()
    }

    fn enter(&self, next: SupervisorPhase) {
        let previous = self.phase.send_replace(next);
        if previous != next {
            debug!(from = ?previous, to = ?next, "phase transition");
        }
    }

    fn interrupted(&self, state: SupervisorState) -> SessionReport {
        warn!("supervisor interrupted by user");
        self.log_summary(&state);
        SessionReport {
            outcome: SessionOutcome::Interrupted,
            state,
        }
    }

    fn log_banner(&self) {
        info!("{SEPARATOR}");
        info!("shift supervisor starting");
        if self.scheduler.windows().is_empty() {
            warn!("no shift windows configured, supervisor will never start work");
        }
        for window in self.scheduler.windows() {
            info!(shift = %window.name, start = %window.start, end = %window.end, "shift window");
        }
        info!("{SEPARATOR}");
    }

    fn log_summary(&self, state: &SupervisorState) {
        info!("{SEPARATOR}");
        info!("session summary");
        info!("  tasks completed: {}", state.tasks_completed);
        info!("  tasks failed: {}", state.tasks_failed);
        info!("  runtime: {:.2} hours", state.total_runtime_hours);
        info!("{SEPARATOR}");
    }
}
