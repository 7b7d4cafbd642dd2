//! Shift window model.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A named daily time-of-day interval during which autonomous work is
/// permitted.
///
/// When `start > end` the window wraps midnight, e.g. `22:00`–`06:00`.
/// Both bounds are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ShiftWindow {
    /// Display name used in log lines (e.g. `night`).
    pub name: String,
    /// First instant of the window.
    #[serde(with = "super::time_of_day")]
    pub start: NaiveTime,
    /// Last instant of the window.
    #[serde(with = "super::time_of_day")]
    pub end: NaiveTime,
}

impl ShiftWindow {
    /// Construct a window from its name and bounds.
    #[must_use]
    pub fn new(name: impl Into<String>, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Whether the window spans midnight.
    #[must_use]
    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }
}
