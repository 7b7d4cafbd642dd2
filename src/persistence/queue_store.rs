//! Newline-delimited task queue file.
//!
//! One descriptor per line. Blank lines and lines starting with `#` are
//! ignored on load. Every rewrite replaces the whole file, so comments do
//! not survive a pop.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{write_atomic, QueueStore};
use crate::models::task::TaskClaim;
use crate::{AppError, Result};

/// Suffix appended to the queue path to name its claim marker.
pub const CLAIM_SUFFIX: &str = ".claim";

/// Parse raw queue text into descriptors: trimmed, non-empty, not
/// starting with `#`, in original order.
#[must_use]
pub fn parse_queue(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToOwned::to_owned)
        .collect()
}

/// Render descriptors back into queue file text.
#[must_use]
pub fn render_queue(tasks: &[String]) -> String {
    if tasks.is_empty() {
        return String::new();
    }
    let mut out = tasks.join("\n");
    out.push('\n');
    out
}

/// Check that `task` survives a write/load cycle as exactly one entry.
///
/// # Errors
///
/// Returns `AppError::Queue` if the descriptor is blank, spans multiple
/// lines, or would be read back as a comment.
pub fn validate_descriptor(task: &str) -> Result<&str> {
    let trimmed = task.trim();
    if trimmed.is_empty() {
        return Err(AppError::Queue("task descriptor must not be empty".into()));
    }
    if trimmed.contains(['\n', '\r']) {
        return Err(AppError::Queue(
            "task descriptor must fit on a single line".into(),
        ));
    }
    if trimmed.starts_with('#') {
        return Err(AppError::Queue(
            "task descriptor must not start with `#`".into(),
        ));
    }
    Ok(trimmed)
}

/// Queue store backed by a text file, with its claim marker stored as JSON
/// at `<path>.claim`.
#[derive(Debug, Clone)]
pub struct FileQueueStore {
    path: PathBuf,
    claim_path: PathBuf,
}

impl FileQueueStore {
    /// Store rooted at `path`. Nothing is created until the first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut claim: OsString = path.as_os_str().to_owned();
        claim.push(CLAIM_SUFFIX);
        Self {
            path,
            claim_path: PathBuf::from(claim),
        }
    }

    /// Location of the queue file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the claim marker.
    #[must_use]
    pub fn claim_path(&self) -> &Path {
        &self.claim_path
    }

    /// Append one descriptor to the end of the queue file, creating it if
    /// needed. Existing lines, comments included, are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Queue` if the descriptor is invalid or the file
    /// cannot be written.
    pub fn append(&self, task: &str) -> Result<()> {
        let task = validate_descriptor(task)?;
        let needs_separator = match fs::read(&self.path) {
            Ok(bytes) => bytes.last().is_some_and(|&b| b != b'\n'),
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => return Err(self.queue_error("read", &err)),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| self.queue_error("open", &err))?;
        let line = if needs_separator {
            format!("\n{task}\n")
        } else {
            format!("{task}\n")
        };
        file.write_all(line.as_bytes())
            .map_err(|err| self.queue_error("append to", &err))?;
        debug!(path = %self.path.display(), "task appended to queue");
        Ok(())
    }

    fn queue_error(&self, action: &str, err: &std::io::Error) -> AppError {
        AppError::Queue(format!(
            "failed to {action} {}: {err}",
            self.path.display()
        ))
    }
}

impl QueueStore for FileQueueStore {
    fn load(&self) -> Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(parse_queue(&raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(self.queue_error("read", &err)),
        }
    }

    fn save(&self, tasks: &[String]) -> Result<()> {
        write_atomic(&self.path, render_queue(tasks).as_bytes())
            .map_err(|err| self.queue_error("rewrite", &err))
    }

    fn load_claim(&self) -> Result<Option<TaskClaim>> {
        let raw = match fs::read_to_string(&self.claim_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(AppError::Queue(format!(
                    "failed to read claim {}: {err}",
                    self.claim_path.display()
                )))
            }
        };
        serde_json::from_str(&raw).map(Some).map_err(|err| {
            AppError::Queue(format!(
                "corrupt claim {}: {err}",
                self.claim_path.display()
            ))
        })
    }

    fn save_claim(&self, claim: Option<&TaskClaim>) -> Result<()> {
        let Some(claim) = claim else {
            return match fs::remove_file(&self.claim_path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(AppError::Queue(format!(
                    "failed to clear claim {}: {err}",
                    self.claim_path.display()
                ))),
            };
        };
        let json = serde_json::to_vec_pretty(claim)
            .map_err(|err| AppError::Queue(format!("failed to encode claim: {err}")))?;
        write_atomic(&self.claim_path, &json).map_err(|err| {
            AppError::Queue(format!(
                "failed to write claim {}: {err}",
                self.claim_path.display()
            ))
        })
    }
}
