//! Run-wide configuration. Builder-style, following the `RetryPolicy`
//! builder pattern: a `Default` that gives sane defaults, `with_*` setters,
//! and a `validate()` called once at `Engine::new` time.

use crate::error::{EngineError, Result};
use crate::policy::{ConflictPolicy, RngDerivation};
use crate::replay::ReplayMode;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard ceiling on reduce-and-commit cycles before a run is aborted
    /// with `EngineError::MaxStepsExceeded`. Guards against a cyclic graph
    /// that never converges.
    pub max_steps: u64,
    /// Size of the bounded worker pool dispatching work items concurrently.
    /// `0` is a documented sentinel, not an error: it selects the
    /// single-threaded sequential path (see `scheduler::run_sequential`),
    /// used for bit-for-bit deterministic replay.
    pub max_concurrent_nodes: usize,
    /// Capacity of the frontier's internal notification channel; bounds how
    /// far ahead producers can get of the worker pool before blocking.
    pub queue_depth: usize,
    /// How long `Frontier::enqueue` waits for capacity before failing with
    /// `EngineError::Backpressure`.
    pub backpressure_timeout: Duration,
    /// Applied to a node attempt when its own `NodePolicy::timeout` is unset.
    pub default_node_timeout: Option<Duration>,
    /// Wall-clock budget for the entire run, independent of step count.
    pub run_wall_clock_budget: Option<Duration>,
    pub conflict_policy: ConflictPolicy,
    pub replay_mode: ReplayMode,
    pub rng_derivation: RngDerivation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_steps: 10_000,
            max_concurrent_nodes: 8,
            queue_depth: 256,
            backpressure_timeout: Duration::from_secs(30),
            default_node_timeout: None,
            run_wall_clock_budget: None,
            conflict_policy: ConflictPolicy::default(),
            replay_mode: ReplayMode::default(),
            rng_derivation: RngDerivation::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_concurrent_nodes(mut self, n: usize) -> Self {
        self.max_concurrent_nodes = n;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    pub fn with_backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.backpressure_timeout = timeout;
        self
    }

    pub fn with_default_node_timeout(mut self, timeout: Duration) -> Self {
        self.default_node_timeout = Some(timeout);
        self
    }

    pub fn with_run_wall_clock_budget(mut self, budget: Duration) -> Self {
        self.run_wall_clock_budget = Some(budget);
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_replay_mode(mut self, mode: ReplayMode) -> Self {
        self.replay_mode = mode;
        self
    }

    pub fn with_rng_derivation(mut self, derivation: RngDerivation) -> Self {
        self.rng_derivation = derivation;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 {
            return Err(EngineError::Configuration("queue_depth must be at least 1".to_string()));
        }
        if self.conflict_policy != ConflictPolicy::Fail {
            return Err(EngineError::Configuration(format!(
                "conflict policy {:?} is not implemented, only ConflictPolicy::Fail is",
                self.conflict_policy
            )));
        }
        Ok(())
    }
}
