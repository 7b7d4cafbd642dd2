//! Durable session counters.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Session record persisted after every task.
///
/// Overwritten wholesale on each save. A missing or unreadable record is
/// replaced by [`SupervisorState::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SupervisorState {
    /// Local wall-clock time the current session started.
    #[serde(default)]
    pub session_start: Option<NaiveDateTime>,
    /// Tasks whose agent run exited successfully.
    #[serde(default)]
    pub tasks_completed: u64,
    /// Tasks that timed out, exited non-zero, failed to launch, or were
    /// interrupted.
    #[serde(default)]
    pub tasks_failed: u64,
    /// Hours elapsed between `session_start` and the last recorded task.
    #[serde(default)]
    pub total_runtime_hours: f64,
    /// `claimed_at` of the last task whose outcome is counted above. Lets a
    /// restart recognise a leftover claim that was already recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_claimed_at: Option<NaiveDateTime>,
}

impl SupervisorState {
    /// Count one task outcome.
    pub fn record_outcome(&mut self, success: bool) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
    }

    /// Whether the outcome of the task claimed at `claimed_at` has already
    /// been counted.
    #[must_use]
    pub fn has_recorded(&self, claimed_at: NaiveDateTime) -> bool {
        self.last_claimed_at == Some(claimed_at)
    }

    /// Recompute `total_runtime_hours` from `session_start` to `now`.
    ///
    /// Leaves the value untouched when no session has been stamped.
    pub fn update_runtime(&mut self, now: NaiveDateTime) {
        if let Some(start) = self.session_start {
            let elapsed = now.signed_duration_since(start);
            #[allow(clippy::cast_precision_loss)]
            let hours = elapsed.num_milliseconds().max(0) as f64 / 3_600_000.0;
            self.total_runtime_hours = hours;
        }
    }
}
