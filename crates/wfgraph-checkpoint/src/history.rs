//! Read-only time-travel inspection over a `Store`. Does not imply any
//! automatic cleanup — it only reads what the store already has.

use crate::error::Result;
use crate::traits::Store;
use crate::types::{Checkpoint, RunId};

/// One entry in a run's history, as returned by [`history`].
#[derive(Debug, Clone)]
pub struct HistoryEntry<S> {
    pub checkpoint: Checkpoint<S>,
}

/// Returns `run_id`'s checkpoints ordered newest first, the order a human
/// inspecting "what happened in this run" wants to read them in.
pub async fn history<S, St>(store: &St, run_id: &str) -> Result<Vec<HistoryEntry<S>>>
where
    S: Clone + Send + Sync + 'static,
    St: Store<S> + ?Sized,
{
    let mut checkpoints = store.list_checkpoints(run_id).await?;
    checkpoints.reverse();
    Ok(checkpoints.into_iter().map(|checkpoint| HistoryEntry { checkpoint }).collect())
}

/// All known run ids, for a caller building a "list my runs" view.
pub async fn known_runs<S, St>(store: &St) -> Result<Vec<RunId>>
where
    S: Clone + Send + Sync + 'static,
    St: Store<S> + ?Sized,
{
    store.list_runs().await
}
