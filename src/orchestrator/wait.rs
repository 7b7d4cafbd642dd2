//! Cancellable polling wait.
//!
//! The supervisor's three blocking waits (shift start, queue refill,
//! inter-task pause) all reduce to "sleep a step, re-check a condition",
//! bounded optionally by a total limit and always abortable through a
//! [`CancellationToken`].

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// How a [`wait_until`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition became true.
    Ready,
    /// The limit elapsed with the condition still false.
    Elapsed,
    /// Cancellation was requested.
    Cancelled,
}

/// Sleep in steps of `step` until `ready` returns `true`, `limit` has
/// elapsed, or `cancel` fires.
///
/// The condition is evaluated after each step, never before the first one.
/// The final step is shortened so the wait never overruns `limit`. A zero
/// `limit` returns [`WaitOutcome::Elapsed`] without sleeping.
///
/// # Errors
///
/// Propagates the first error returned by `ready`.
pub async fn wait_until<F>(
    mut ready: F,
    step: Duration,
    limit: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<WaitOutcome>
where
    F: FnMut() -> Result<bool>,
{
    let deadline = limit.map(|limit| Instant::now() + limit);

    loop {
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::Cancelled);
        }

        let nap = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(WaitOutcome::Elapsed);
                }
                step.min(remaining)
            }
            None => step,
        };

        tokio::select! {
            () = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
            () = tokio::time::sleep(nap) => {}
        }

        if ready()? {
            return Ok(WaitOutcome::Ready);
        }
    }
}
