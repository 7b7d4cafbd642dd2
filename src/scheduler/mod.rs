//! Shift window evaluation.
//!
//! [`ShiftScheduler`] answers two questions from a local wall-clock
//! timestamp alone: is any configured window open right now, and how long
//! until the next one opens. It holds no clock and no mutable state, so
//! the supervisor can evaluate it against whatever [`Clock`] it was given.

pub mod clock;

use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};

use crate::models::shift::ShiftWindow;

pub use clock::{AnchoredClock, Clock, SystemClock};

/// Wait reported by [`ShiftScheduler::until_next_shift`] when no window is
/// configured, so callers never spin without a target.
pub const NO_SHIFT_FALLBACK: Duration = Duration::from_secs(3600);

const SECONDS_PER_DAY: i64 = 86_400;

/// Whether `now` falls inside `window`, bounds inclusive.
#[must_use]
pub fn is_active(window: &ShiftWindow, now: NaiveTime) -> bool {
    if window.wraps_midnight() {
        now >= window.start || now <= window.end
    } else {
        window.start <= now && now <= window.end
    }
}

/// Evaluates a fixed set of shift windows.
#[derive(Debug, Clone, Default)]
pub struct ShiftScheduler {
    windows: Vec<ShiftWindow>,
}

impl ShiftScheduler {
    /// Build a scheduler over `windows`, kept in declaration order.
    #[must_use]
    pub fn new(windows: Vec<ShiftWindow>) -> Self {
        Self { windows }
    }

    /// Configured windows in declaration order.
    #[must_use]
    pub fn windows(&self) -> &[ShiftWindow] {
        &self.windows
    }

    /// `true` if any window is open at `now`. Always `false` with no
    /// windows configured.
    #[must_use]
    pub fn is_work_hours(&self, now: NaiveDateTime) -> bool {
        self.current_shift(now).is_some()
    }

    /// First window, in declaration order, that is open at `now`.
    #[must_use]
    pub fn current_shift(&self, now: NaiveDateTime) -> Option<&ShiftWindow> {
        let time = now.time();
        self.windows.iter().find(|window| is_active(window, time))
    }

    /// Name of the first open window at `now`.
    #[must_use]
    pub fn current_shift_name(&self, now: NaiveDateTime) -> Option<&str> {
        self.current_shift(now).map(|window| window.name.as_str())
    }

    /// Time until the nearest upcoming window start.
    ///
    /// A start that has already passed today counts from tomorrow's
    /// occurrence. Returns [`NO_SHIFT_FALLBACK`] when no window exists.
    #[must_use]
    pub fn until_next_shift(&self, now: NaiveDateTime) -> Duration {
        self.windows
            .iter()
            .map(|window| until_start(window.start, now))
            .min()
            .unwrap_or(NO_SHIFT_FALLBACK)
    }
}

fn until_start(start: NaiveTime, now: NaiveDateTime) -> Duration {
    let today = now.date().and_time(start);
    let mut delta = today.signed_duration_since(now);
    if delta < chrono::Duration::zero() {
        delta += chrono::Duration::seconds(SECONDS_PER_DAY);
    }
    delta.to_std().unwrap_or_default()
}
