//! Per-attempt context handed to every node body.

use crate::replay::{ReplayController, ReplayOutcome};
use rand::RngCore;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use wfgraph_checkpoint::{OrderKey, RunId, StepId};

/// Everything a node body needs besides the state itself: identity of this
/// attempt, a cancellation signal, deterministic randomness, and access to
/// the replay controller. Cheap to clone — every field is `Arc`-backed or
/// `Copy`.
#[derive(Clone)]
pub struct NodeContext {
    pub run_id: RunId,
    pub node_id: String,
    pub attempt: u32,
    pub order_key: OrderKey,
    pub seq: StepId,
    pub idempotency_key: Option<String>,
    cancellation: CancellationToken,
    rng: Arc<Mutex<StdRng>>,
    replay: Arc<ReplayController>,
}

impl NodeContext {
    pub fn new(
        run_id: RunId,
        node_id: String,
        attempt: u32,
        order_key: OrderKey,
        seq: StepId,
        idempotency_key: Option<String>,
        cancellation: CancellationToken,
        rng: StdRng,
        replay: Arc<ReplayController>,
    ) -> Self {
        NodeContext {
            run_id,
            node_id,
            attempt,
            order_key,
            seq,
            idempotency_key,
            cancellation,
            rng: Arc::new(Mutex::new(rng)),
            replay,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Draws the next `u64` from this attempt's deterministic RNG.
    pub fn next_random_u64(&self) -> u64 {
        self.rng.lock().expect("rng mutex poisoned").next_u64()
    }

    /// Draws a `f64` in `[0, 1)` from this attempt's deterministic RNG.
    pub fn next_random_f64(&self) -> f64 {
        use rand::Rng;
        self.rng.lock().expect("rng mutex poisoned").gen()
    }

    /// Looks up a recorded response for this exact `(node_id, attempt)`,
    /// verifying that `request` matches what was recorded for it. See
    /// [`ReplayController`] for the lenient/strict distinction.
    pub fn replay(&self, request: &[u8], is_resumed_attempt: bool) -> crate::error::Result<ReplayOutcome> {
        self.replay.resolve(&self.node_id, self.attempt, request, is_resumed_attempt)
    }

    /// Reclaims this context's RNG stream so a worker can keep drawing from
    /// the same sequence across attempts instead of reseeding each time.
    /// Returns `None` if another clone of this context is still alive (a
    /// node stashed one for a spawned task, say) — the caller should
    /// reseed rather than block.
    pub fn take_rng(self) -> Option<StdRng> {
        Arc::try_unwrap(self.rng).ok().map(|m| m.into_inner().expect("rng mutex poisoned"))
    }
}
