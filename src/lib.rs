#![forbid(unsafe_code)]

//! Shift supervisor: runs a queue of coding tasks through an autonomous
//! agent CLI, one at a time, only inside configured time-of-day windows.

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod scheduler;
pub mod util;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
