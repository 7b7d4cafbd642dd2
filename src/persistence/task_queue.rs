//! FIFO task queue with destructive pop and a write-ahead claim.
//!
//! Every operation reloads the store; nothing is cached between pops.
//!
//! A pop first records a [`TaskClaim`] naming the head descriptor, then
//! rewrites the store without it. The supervisor flips the claim to
//! `started` right before launching the agent and clears it once the
//! outcome is saved. A claim found at startup therefore means the previous
//! process died mid-task, and [`TaskQueue::recover`] decides what happens
//! to that descriptor.

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::QueueStore;
use crate::models::task::TaskClaim;
use crate::Result;

/// What [`TaskQueue::recover`] did with a leftover claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimRecovery {
    /// The agent never started; the descriptor is back at the queue head.
    Requeued(String),
    /// The agent had started; the descriptor is dropped and must be counted
    /// as failed rather than run a second time, unless its outcome was
    /// already recorded.
    Abandoned(TaskClaim),
}

/// Task queue over a [`QueueStore`].
#[derive(Debug)]
pub struct TaskQueue<Q> {
    store: Q,
}

impl<Q: QueueStore> TaskQueue<Q> {
    /// Wrap `store`.
    #[must_use]
    pub fn new(store: Q) -> Self {
        Self { store }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Q {
        &self.store
    }

    /// Current descriptors in order.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub fn load(&self) -> Result<Vec<String>> {
        self.store.load()
    }

    /// Whether the queue currently holds no descriptors.
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.store.load()?.is_empty())
    }

    /// Remove and return the head descriptor.
    ///
    /// An empty queue returns `None` and leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Propagates store read or write failures.
    pub fn pop_front(&self, now: NaiveDateTime) -> Result<Option<String>> {
        let mut tasks = self.store.load()?;
        if tasks.is_empty() {
            return Ok(None);
        }

        let task = tasks.remove(0);
        self.store
            .save_claim(Some(&TaskClaim::new(task.clone(), now)))?;
        self.store.save(&tasks)?;
        debug!(remaining = tasks.len(), "task popped from queue");
        Ok(Some(task))
    }

    /// Mark the outstanding claim as started.
    ///
    /// # Errors
    ///
    /// Propagates claim read or write failures.
    pub fn mark_started(&self) -> Result<()> {
        if let Some(mut claim) = self.store.load_claim()? {
            claim.started = true;
            self.store.save_claim(Some(&claim))?;
        }
        Ok(())
    }

    /// Clear the outstanding claim after its outcome has been recorded.
    ///
    /// # Errors
    ///
    /// Propagates claim removal failures.
    pub fn complete(&self) -> Result<()> {
        self.store.save_claim(None)
    }

    /// Resolve a claim left behind by a previous process.
    ///
    /// An unstarted claim is put back at the head of the queue unless the
    /// head already holds that descriptor, which means the store rewrite
    /// never happened. A started claim is reported as
    /// [`ClaimRecovery::Abandoned`].
    ///
    /// The claim itself is left in place. The caller clears it with
    /// [`TaskQueue::complete`] once any resulting outcome is saved, so a
    /// failed save leaves the claim to be recovered again. Requeueing is
    /// idempotent across such retries.
    ///
    /// # Errors
    ///
    /// Propagates store read or write failures.
    pub fn recover(&self) -> Result<Option<ClaimRecovery>> {
        let Some(claim) = self.store.load_claim()? else {
            return Ok(None);
        };

        if claim.started {
            warn!(task = %claim.task, claimed_at = %claim.claimed_at, "found task interrupted mid-run");
            return Ok(Some(ClaimRecovery::Abandoned(claim)));
        }

        let mut tasks = self.store.load()?;
        if tasks.first() != Some(&claim.task) {
            tasks.insert(0, claim.task.clone());
            self.store.save(&tasks)?;
        }
        warn!(task = %claim.task, "requeued task claimed before a restart");
        Ok(Some(ClaimRecovery::Requeued(claim.task)))
    }
}
