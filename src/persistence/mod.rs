//! Persistence layer: durable task queue and session state stores.
//!
//! Both stores are plain files owned by a single supervisor process. The
//! traits exist so the supervisor loop can be driven against in-memory
//! fakes ([`memory`]) without touching the file system.

pub mod memory;
pub mod queue_store;
pub mod state_store;
pub mod task_queue;

use std::io::Write;
use std::path::Path;

use crate::models::state::SupervisorState;
use crate::models::task::TaskClaim;
use crate::Result;

pub use queue_store::FileQueueStore;
pub use state_store::JsonStateStore;
pub use task_queue::{ClaimRecovery, TaskQueue};

/// Durable ordered list of task descriptors plus the claim marker for the
/// task currently in flight.
pub trait QueueStore {
    /// Load the descriptors in order, with blank and `#` lines removed.
    /// A missing store is an empty queue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Queue` if the store exists but cannot be read.
    fn load(&self) -> Result<Vec<String>>;

    /// Replace the entire store with `tasks`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Queue` if the store cannot be rewritten.
    fn save(&self, tasks: &[String]) -> Result<()>;

    /// Load the outstanding claim, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Queue` if a claim exists but cannot be read.
    fn load_claim(&self) -> Result<Option<TaskClaim>>;

    /// Write `claim`, or remove the marker when `None`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Queue` if the marker cannot be written or removed.
    fn save_claim(&self, claim: Option<&TaskClaim>) -> Result<()>;
}

/// Durable session counters.
pub trait StateStore {
    /// Load the persisted record. Absent or unparsable records yield the
    /// zero-valued default; this never fails the caller.
    fn load(&self) -> SupervisorState;

    /// Overwrite the persisted record with `state`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` if the record cannot be written.
    fn save(&self, state: &SupervisorState) -> Result<()>;
}

impl<T: QueueStore + ?Sized> QueueStore for &T {
    fn load(&self) -> Result<Vec<String>> {
        (**self).load()
    }

    fn save(&self, tasks: &[String]) -> Result<()> {
        (**self).save(tasks)
    }

    fn load_claim(&self) -> Result<Option<TaskClaim>> {
        (**self).load_claim()
    }

    fn save_claim(&self, claim: Option<&TaskClaim>) -> Result<()> {
        (**self).save_claim(claim)
    }
}

impl<T: StateStore + ?Sized> StateStore for &T {
    fn load(&self) -> SupervisorState {
        (**self).load()
    }

    fn save(&self, state: &SupervisorState) -> Result<()> {
        (**self).save(state)
    }
}

/// Replace `path` with `contents` via a temporary sibling file and rename,
/// so readers never observe a half-written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}
