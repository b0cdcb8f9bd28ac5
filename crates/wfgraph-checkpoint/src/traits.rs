//! The `Store` contract: the only way the engine talks to durable storage.
//!
//! Implementations are expected to be cheap to clone/share (`Arc<dyn Store>`)
//! and safe to call from multiple tasks concurrently — the engine itself
//! only ever has one checkpoint commit in flight per run, but a long-lived
//! process may run many workflows against the same store concurrently.

use crate::error::Result;
use crate::types::{Checkpoint, RunId, StepId};
use async_trait::async_trait;

/// Durable storage for checkpoints.
///
/// # Idempotency contract
///
/// `save_checkpoint` MUST treat a duplicate `(run_id, idempotency_key)` pair
/// as a no-op success: if a checkpoint with the same run and idempotency key
/// has already been durably saved, the call returns `Ok(())` without writing
/// anything or erroring, even if `state`/`frontier` differ in the resubmitted
/// checkpoint. This is what lets the committer retry a commit after a crash
/// without double-applying it.
#[async_trait]
pub trait Store<S>: Send + Sync
where
    S: Clone + Send + Sync + 'static,
{
    /// Durably persist `checkpoint`. See the idempotency contract above.
    async fn save_checkpoint(&self, checkpoint: Checkpoint<S>) -> Result<()>;

    /// The most recently committed checkpoint for `run_id`, if any.
    async fn load_latest(&self, run_id: &str) -> Result<Option<Checkpoint<S>>>;

    /// A specific checkpoint by run and step, if it exists.
    async fn load_checkpoint(&self, run_id: &str, step_id: StepId) -> Result<Option<Checkpoint<S>>>;

    /// All run ids known to the store, most recently active first. Default
    /// implementation is an empty list for stores that don't index by run.
    async fn list_runs(&self) -> Result<Vec<RunId>> {
        Ok(Vec::new())
    }

    /// Every checkpoint recorded for `run_id`, ordered oldest to newest.
    /// Powers time-travel inspection; default implementation degrades to
    /// just the latest checkpoint, wrapped in a one-element vec.
    async fn list_checkpoints(&self, run_id: &str) -> Result<Vec<Checkpoint<S>>> {
        Ok(self.load_latest(run_id).await?.into_iter().collect())
    }

    /// Remove all checkpoints for `run_id`. Does not imply any automatic
    /// garbage collection policy — callers decide when this is safe to call.
    async fn delete(&self, run_id: &str) -> Result<()>;
}
