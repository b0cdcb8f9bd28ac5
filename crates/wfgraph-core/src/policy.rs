//! Per-node retry, timeout, and idempotency policy, plus the handful of
//! run-wide policy enums that live on [`crate::config::EngineConfig`].

use crate::error::EngineError;
use std::sync::Arc;
use std::time::Duration;

/// Decides, for a given error, whether a node attempt should be retried.
pub type RetryPredicate = Arc<dyn Fn(&EngineError) -> bool + Send + Sync>;

/// Derives a node-level idempotency string from post-delta state, handed to
/// the node body through [`crate::context::NodeContext::idempotency_key`]
/// so it can deduplicate calls to external systems across retries.
pub type IdempotencyKeyFn<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// Exponential backoff with jitter: `delay = min(base * 2^attempt, max) + uniform(0, base)`.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub is_retryable: RetryPredicate,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    /// Single attempt, no retries — a node must opt in to retrying.
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            is_retryable: Arc::new(|e: &EngineError| e.is_transient_by_default()),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_retryable<F>(mut self, f: F) -> Self
    where
        F: Fn(&EngineError) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Arc::new(f);
        self
    }

    /// Retries everything (including errors not transient by default) up
    /// to `max_attempts`. Useful in tests that simulate flaky nodes.
    pub fn retry_all(max_attempts: u32) -> Self {
        RetryPolicy::new(max_attempts).with_retryable(|_| true)
    }
}

/// Whether a node's external effects were (or must be) recorded for replay.
#[derive(Debug, Clone, Copy, Default)]
pub struct SideEffectPolicy {
    /// If true, a successful attempt's request/response are captured as a
    /// `RecordedIo` in the next checkpoint.
    pub recordable: bool,
    /// If true, `Engine::run` refuses to execute this node without an
    /// `idempotency_key` configured on its `NodePolicy`.
    pub requires_idempotency: bool,
}

/// The full per-node policy surface: timeout, retry, idempotency,
/// recording. Returned from [`crate::graph::Node::policy`].
#[derive(Clone)]
pub struct NodePolicy<S> {
    pub timeout: Option<Duration>,
    pub retry: RetryPolicy,
    pub idempotency_key: Option<IdempotencyKeyFn<S>>,
    pub side_effects: SideEffectPolicy,
}

impl<S> std::fmt::Debug for NodePolicy<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodePolicy")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("has_idempotency_key", &self.idempotency_key.is_some())
            .field("side_effects", &self.side_effects)
            .finish()
    }
}

impl<S> Default for NodePolicy<S> {
    fn default() -> Self {
        NodePolicy {
            timeout: None,
            retry: RetryPolicy::default(),
            idempotency_key: None,
            side_effects: SideEffectPolicy::default(),
        }
    }
}

impl<S> NodePolicy<S> {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_idempotency_key<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
    {
        self.idempotency_key = Some(Arc::new(f));
        self
    }

    pub fn with_side_effects(mut self, side_effects: SideEffectPolicy) -> Self {
        self.side_effects = side_effects;
        self
    }
}

/// How concurrently-completed results that touch the same state are
/// reconciled before the reducer applies them. Only [`ConflictPolicy::Fail`]
/// is implemented; the other variants exist so configuration code compiles
/// against the full surface described by the run-wide config, but
/// constructing an `EngineConfig` with them fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Concurrent writes to the same field are a hard error (implemented).
    #[default]
    Fail,
    /// Last writer (by ascending OrderKey) wins silently (not implemented).
    LastWriterWins,
    /// Merge via a CRDT-style join (not implemented).
    Crdt,
}

/// How a node's per-attempt RNG is seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RngDerivation {
    /// `PRNG(baseSeed ⊕ workerID)` — stable per worker slot, the default
    /// the scheduling component specifies.
    #[default]
    Worker,
    /// `PRNG(baseSeed ⊕ orderKey)` — stable per work item regardless of
    /// which worker executes it, for callers who need determinism even
    /// when the number of workers changes between runs.
    OrderKey,
}
