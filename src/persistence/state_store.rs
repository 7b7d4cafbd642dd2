//! JSON session state file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{write_atomic, StateStore};
use crate::models::state::SupervisorState;
use crate::{AppError, Result};

/// State store backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Store at `path`. Nothing is created until the first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> SupervisorState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return SupervisorState::default(),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "state file unreadable, starting from defaults");
                return SupervisorState::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), %err, "state file unparsable, starting from defaults");
            SupervisorState::default()
        })
    }

    fn save(&self, state: &SupervisorState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &json).map_err(|err| {
            AppError::State(format!(
                "failed to write {}: {err}",
                self.path.display()
            ))
        })
    }
}
