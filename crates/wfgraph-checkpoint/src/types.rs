//! Plain data types shared by the checkpoint contract. Everything here is
//! `Serialize`/`Deserialize` so it can cross a `Store` boundary unchanged;
//! none of it depends on the execution engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;

/// Identifies a run across its lifetime. Opaque to the checkpoint layer —
/// callers typically fill this with a UUID, but nothing here requires it.
pub type RunId = String;

/// A monotonically increasing counter. Used both as `WorkItem::seq` (the
/// enqueue-order sequence number) and as `Checkpoint::step_id` (the
/// reduce-and-commit generation number) — two distinct counters that happen
/// to share a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepId(pub u64);

impl StepId {
    pub const ZERO: StepId = StepId(0);

    pub fn next(self) -> StepId {
        StepId(self.0 + 1)
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The deterministic sort key described by the scheduling component: the
/// first 64 bits of `SHA-256(parentPathHash || NodeID || u32(EdgeIndex))`.
/// `Ord` is implemented so a min-heap (via `std::cmp::Reverse`) yields
/// ascending `OrderKey` order, which is the frontier's dequeue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderKey(pub u64);

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.0.cmp(&other.0)
    }
}

impl std::fmt::Display for OrderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Dedup key for checkpoint commits: `(RunID, IdempotencyKey)` pairs that
/// have already been committed make a subsequent `save_checkpoint` call a
/// no-op success rather than a duplicate write.
pub type IdempotencyKey = String;

/// Identifies one committed checkpoint for point lookups.
pub fn checkpoint_id(run_id: &str, step_id: StepId) -> String {
    format!("{run_id}:{step_id}")
}

/// A serializable snapshot of one frontier entry, persisted as part of a
/// checkpoint so a resumed run can rebuild its frontier exactly.
///
/// `S` is the workflow's state delta type — the same type parameter the
/// engine's `Graph<S>` is generic over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItemSnapshot<S> {
    pub seq: StepId,
    pub order_key: OrderKey,
    pub path_hash: [u8; 32],
    pub node_id: String,
    pub state: S,
    pub attempt: u32,
    pub parent_node_id: Option<String>,
    pub edge_index: u32,
}

/// One recorded request/response pair captured during a node attempt, kept
/// so a later replay can serve the same response without recontacting the
/// outside world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedIo {
    pub node_id: String,
    pub attempt: u32,
    pub request_blob: Vec<u8>,
    pub response_blob: Vec<u8>,
    /// Hex-encoded SHA-256 of `response_blob`, checked on replay.
    pub fingerprint: String,
    pub duration_ms: u64,
}

impl RecordedIo {
    pub fn fingerprint_of(response_blob: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(response_blob);
        hex::encode(digest)
    }
}

/// The atomic, durable unit the checkpoint committer writes: state, frontier,
/// recorded IOs, and the idempotency key that makes the commit safe to
/// retry. See the commit component for the transactional contract this
/// backs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint<S> {
    pub run_id: RunId,
    pub step_id: StepId,
    pub state: S,
    pub frontier: Vec<WorkItemSnapshot<S>>,
    pub rng_seed: u64,
    pub recorded_ios: Vec<RecordedIo>,
    pub idempotency_key: IdempotencyKey,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Optional human label (e.g. "pre-deploy snapshot"), never interpreted
    /// by the engine itself.
    pub label: Option<String>,
}

impl<S> Checkpoint<S> {
    pub fn id(&self) -> String {
        checkpoint_id(&self.run_id, self.step_id)
    }
}
