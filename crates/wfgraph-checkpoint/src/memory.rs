//! A reference, process-local `Store` implementation. Not durable across
//! process restarts — useful for tests, examples, and callers who haven't
//! wired up a real backend yet.

use crate::error::Result;
use crate::traits::Store;
use crate::types::{Checkpoint, RunId, StepId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

struct RunState<S> {
    checkpoints: Vec<Checkpoint<S>>,
    seen_idempotency_keys: HashSet<String>,
}

impl<S> Default for RunState<S> {
    fn default() -> Self {
        RunState {
            checkpoints: Vec::new(),
            seen_idempotency_keys: HashSet::new(),
        }
    }
}

/// In-memory `Store`, keyed by `run_id`. Cheap to clone (internally
/// `Arc`-backed) so it can be shared across an `Engine` and its tests.
pub struct InMemoryStore<S> {
    runs: Arc<RwLock<HashMap<RunId, RunState<S>>>>,
}

impl<S> Clone for InMemoryStore<S> {
    fn clone(&self) -> Self {
        InMemoryStore { runs: self.runs.clone() }
    }
}

impl<S> Default for InMemoryStore<S> {
    fn default() -> Self {
        InMemoryStore { runs: Arc::new(RwLock::new(HashMap::new())) }
    }
}

impl<S> InMemoryStore<S> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<S> Store<S> for InMemoryStore<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn save_checkpoint(&self, checkpoint: Checkpoint<S>) -> Result<()> {
        let mut runs = self.runs.write().await;
        let run = runs.entry(checkpoint.run_id.clone()).or_default();

        if !run.seen_idempotency_keys.insert(checkpoint.idempotency_key.clone()) {
            tracing::debug!(
                run_id = %checkpoint.run_id,
                idempotency_key = %checkpoint.idempotency_key,
                "duplicate checkpoint commit, treating as no-op"
            );
            return Ok(());
        }

        tracing::debug!(
            run_id = %checkpoint.run_id,
            step_id = %checkpoint.step_id,
            "checkpoint committed"
        );
        run.checkpoints.push(checkpoint);
        Ok(())
    }

    async fn load_latest(&self, run_id: &str) -> Result<Option<Checkpoint<S>>> {
        let runs = self.runs.read().await;
        Ok(runs.get(run_id).and_then(|r| r.checkpoints.last().cloned()))
    }

    async fn load_checkpoint(&self, run_id: &str, step_id: StepId) -> Result<Option<Checkpoint<S>>> {
        let runs = self.runs.read().await;
        Ok(runs
            .get(run_id)
            .and_then(|r| r.checkpoints.iter().find(|c| c.step_id == step_id).cloned()))
    }

    async fn list_runs(&self) -> Result<Vec<RunId>> {
        let runs = self.runs.read().await;
        Ok(runs.keys().cloned().collect())
    }

    async fn list_checkpoints(&self, run_id: &str) -> Result<Vec<Checkpoint<S>>> {
        let runs = self.runs.read().await;
        Ok(runs.get(run_id).map(|r| r.checkpoints.clone()).unwrap_or_default())
    }

    async fn delete(&self, run_id: &str) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.remove(run_id);
        Ok(())
    }
}
