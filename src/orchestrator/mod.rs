//! Session orchestration.
//!
//! Covers agent invocation, the cancellable wait primitive, and the
//! supervisor state machine that ties the scheduler and stores together.

pub mod executor;
pub mod supervisor;
pub mod wait;

pub use executor::{TaskExecutor, TaskRunner};
pub use supervisor::{SessionOutcome, SessionReport, Supervisor, SupervisorPhase};
