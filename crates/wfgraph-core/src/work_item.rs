//! `WorkItem`: one unit of dispatchable work sitting in the frontier.

use wfgraph_checkpoint::{OrderKey, StepId, WorkItemSnapshot};

/// A node queued to run against a given state, tagged with everything
/// needed to place it deterministically and to derive its children's
/// ordering when it completes.
#[derive(Debug, Clone)]
pub struct WorkItem<S> {
    /// Enqueue-order sequence number — monotonically increasing, assigned
    /// when the item is created. Not used for ordering (that's `order_key`);
    /// useful for diagnostics and as a stable tiebreaker in logs.
    pub seq: StepId,
    pub order_key: OrderKey,
    /// The full path hash this item was derived from; threaded forward as
    /// the `parentPathHash` input when this item's own successors are
    /// derived.
    pub path_hash: [u8; 32],
    pub node_id: String,
    pub state: S,
    pub attempt: u32,
    pub parent_node_id: Option<String>,
    pub edge_index: u32,
}

impl<S: Clone> WorkItem<S> {
    pub fn to_snapshot(&self) -> WorkItemSnapshot<S> {
        WorkItemSnapshot {
            seq: self.seq,
            order_key: self.order_key,
            path_hash: self.path_hash,
            node_id: self.node_id.clone(),
            state: self.state.clone(),
            attempt: self.attempt,
            parent_node_id: self.parent_node_id.clone(),
            edge_index: self.edge_index,
        }
    }

    pub fn from_snapshot(snapshot: WorkItemSnapshot<S>) -> Self {
        WorkItem {
            seq: snapshot.seq,
            order_key: snapshot.order_key,
            path_hash: snapshot.path_hash,
            node_id: snapshot.node_id,
            state: snapshot.state,
            attempt: snapshot.attempt,
            parent_node_id: snapshot.parent_node_id,
            edge_index: snapshot.edge_index,
        }
    }

    /// Produces the retry attempt of this item: same position in the
    /// ordering (same `order_key`/`path_hash`), incremented attempt count.
    pub fn next_attempt(&self, state: S) -> Self {
        WorkItem {
            attempt: self.attempt + 1,
            state,
            ..self.clone()
        }
    }
}
