//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering every failure that can escape
/// the supervisor loop.
///
/// Task-level failures (agent timeout, non-zero exit, launch failure) are
/// never represented here; they are folded into a
/// [`TaskResult`](crate::models::task::TaskResult) and counted.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Task queue store could not be read or rewritten.
    Queue(String),
    /// Session state store could not be written.
    State(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Queue(msg) => write!(f, "queue: {msg}"),
            Self::State(msg) => write!(f, "state: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::State(format!("serialization failed: {err}"))
    }
}
