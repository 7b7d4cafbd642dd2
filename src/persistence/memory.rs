//! In-memory store implementations for driving the supervisor without a
//! file system.

use std::sync::Mutex;

use super::{QueueStore, StateStore};
use crate::models::state::SupervisorState;
use crate::models::task::TaskClaim;
use crate::{AppError, Result};

/// Queue store holding descriptors and the claim marker in memory.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    tasks: Mutex<Vec<String>>,
    claim: Mutex<Option<TaskClaim>>,
}

impl MemoryQueueStore {
    /// Store pre-loaded with `tasks`.
    #[must_use]
    pub fn with_tasks<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tasks: Mutex::new(tasks.into_iter().map(Into::into).collect()),
            claim: Mutex::new(None),
        }
    }

    /// Add a descriptor to the tail of the queue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Queue` if the internal lock is poisoned.
    pub fn push(&self, task: impl Into<String>) -> Result<()> {
        self.tasks_guard()?.push(task.into());
        Ok(())
    }

    /// Copy of the descriptors currently stored.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.tasks_guard().map(|g| g.clone()).unwrap_or_default()
    }

    fn tasks_guard(&self) -> Result<std::sync::MutexGuard<'_, Vec<String>>> {
        self.tasks
            .lock()
            .map_err(|_| AppError::Queue("memory queue mutex poisoned".into()))
    }

    fn claim_guard(&self) -> Result<std::sync::MutexGuard<'_, Option<TaskClaim>>> {
        self.claim
            .lock()
            .map_err(|_| AppError::Queue("memory claim mutex poisoned".into()))
    }
}

impl QueueStore for MemoryQueueStore {
    fn load(&self) -> Result<Vec<String>> {
        Ok(self.tasks_guard()?.clone())
    }

    fn save(&self, tasks: &[String]) -> Result<()> {
        *self.tasks_guard()? = tasks.to_vec();
        Ok(())
    }

    fn load_claim(&self) -> Result<Option<TaskClaim>> {
        Ok(self.claim_guard()?.clone())
    }

    fn save_claim(&self, claim: Option<&TaskClaim>) -> Result<()> {
        *self.claim_guard()? = claim.cloned();
        Ok(())
    }
}

/// State store holding the last saved record in memory.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<SupervisorState>>,
    saves: Mutex<usize>,
}

impl MemoryStateStore {
    /// Store pre-loaded with `state`.
    #[must_use]
    pub fn with_state(state: SupervisorState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            saves: Mutex::new(0),
        }
    }

    /// Last saved record, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<SupervisorState> {
        self.state.lock().ok().and_then(|g| g.clone())
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|g| *g).unwrap_or_default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> SupervisorState {
        self.snapshot().unwrap_or_default()
    }

    fn save(&self, state: &SupervisorState) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::State("memory state mutex poisoned".into()))?;
        *guard = Some(state.clone());
        drop(guard);
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
