//! The `Emitter` contract: the engine's user-facing event bus, distinct
//! from (and in addition to) its own internal `tracing` instrumentation.

use wfgraph_checkpoint::{OrderKey, StepId};

/// One observable point in a run's lifecycle. Kept small and `Clone` so
/// implementations can freely buffer, forward, or fan these out.
#[derive(Debug, Clone)]
pub enum Event {
    RunStarted { run_id: String },
    NodeStarted { run_id: String, node_id: String, attempt: u32, order_key: OrderKey },
    NodeSucceeded { run_id: String, node_id: String, attempt: u32 },
    NodeFailed { run_id: String, node_id: String, attempt: u32, message: String },
    NodeRetrying { run_id: String, node_id: String, attempt: u32, delay_ms: u64 },
    CheckpointCommitted { run_id: String, step_id: StepId },
    Backpressured { run_id: String, node_id: String },
    ReplayMismatch { run_id: String, node_id: String, attempt: u32 },
    RunCompleted { run_id: String },
    RunFailed { run_id: String, message: String },
    RunCanceled { run_id: String },
}

/// Receives lifecycle events as the engine runs. Implementations must not
/// block significantly — `emit` is called from the scheduler's hot path.
pub trait Emitter: Send + Sync {
    fn emit(&self, event: Event);
}

/// Default `Emitter`: forwards every event to `tracing` at an appropriate
/// level, so the crate is usable out of the box without forcing every
/// caller to write a no-op implementation first.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEmitter;

impl Emitter for TracingEmitter {
    fn emit(&self, event: Event) {
        match event {
            Event::RunStarted { run_id } => tracing::info!(run_id, "run started"),
            Event::NodeStarted {
                run_id,
                node_id,
                attempt,
                order_key,
            } => tracing::debug!(run_id, node_id, attempt, %order_key, "node started"),
            Event::NodeSucceeded { run_id, node_id, attempt } => {
                tracing::debug!(run_id, node_id, attempt, "node succeeded")
            }
            Event::NodeFailed {
                run_id,
                node_id,
                attempt,
                message,
            } => tracing::warn!(run_id, node_id, attempt, message, "node failed"),
            Event::NodeRetrying {
                run_id,
                node_id,
                attempt,
                delay_ms,
            } => tracing::warn!(run_id, node_id, attempt, delay_ms, "node retrying"),
            Event::CheckpointCommitted { run_id, step_id } => {
                tracing::debug!(run_id, %step_id, "checkpoint committed")
            }
            Event::Backpressured { run_id, node_id } => tracing::warn!(run_id, node_id, "backpressure"),
            Event::ReplayMismatch { run_id, node_id, attempt } => {
                tracing::error!(run_id, node_id, attempt, "replay mismatch")
            }
            Event::RunCompleted { run_id } => tracing::info!(run_id, "run completed"),
            Event::RunFailed { run_id, message } => tracing::error!(run_id, message, "run failed"),
            Event::RunCanceled { run_id } => tracing::info!(run_id, "run canceled"),
        }
    }
}

/// An `Emitter` that discards every event. Useful in benches and tests that
/// don't want `tracing`'s overhead or output noise.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl Emitter for NullEmitter {
    fn emit(&self, _event: Event) {}
}
