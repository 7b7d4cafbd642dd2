//! Per-task execution records.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Outcome of one agent invocation. Never persisted on its own; it only
/// feeds the session counters and the progress log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    /// `true` only when the agent exited with status 0.
    pub success: bool,
    /// Captured standard output.
    pub output: String,
    /// Captured standard error, or a description of why the run failed.
    pub error: String,
    /// Wall-clock time attributed to the run.
    pub duration: Duration,
}

impl TaskResult {
    /// Build a failed result with no captured output.
    #[must_use]
    pub fn failure(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: error.into(),
            duration,
        }
    }

    /// Duration in fractional seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Write-ahead marker for a task that has left the queue but whose outcome
/// has not yet been saved to the session state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TaskClaim {
    /// Descriptor removed from the head of the queue.
    pub task: String,
    /// Local wall-clock time of the pop.
    pub claimed_at: NaiveDateTime,
    /// Set just before the agent process is launched.
    #[serde(default)]
    pub started: bool,
}

impl TaskClaim {
    /// Create an unstarted claim.
    #[must_use]
    pub fn new(task: String, claimed_at: NaiveDateTime) -> Self {
        Self {
            task,
            claimed_at,
            started: false,
        }
    }
}
