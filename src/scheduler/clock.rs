//! Wall-clock sources.
//!
//! Shift membership is always evaluated against local wall-clock time,
//! never against elapsed durations. The supervisor reads time only through
//! [`Clock`] so tests can drive it from the runtime's timer.

use chrono::{Local, NaiveDateTime};

/// Source of the current local date and time.
pub trait Clock {
    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;
}

/// The host's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock pinned to `origin` at construction that then advances with the
/// tokio timer.
///
/// Under a paused test runtime the timer auto-advances whenever every task
/// is asleep, so a supervisor driven by this clock can cover days of
/// simulated shifts in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    origin: NaiveDateTime,
    anchor: tokio::time::Instant,
}

impl AnchoredClock {
    /// Start the clock at `origin`, anchored to the runtime's current instant.
    #[must_use]
    pub fn starting_at(origin: NaiveDateTime) -> Self {
        Self {
            origin,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = self.anchor.elapsed();
        chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|delta| self.origin.checked_add_signed(delta))
            .unwrap_or(self.origin)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}
