//! Engine-wide error type.
//!
//! Every failure mode named by the scheduling, reducer, checkpoint, and
//! replay components funnels into [`EngineError`] so callers have exactly
//! one error type to match on. Each variant carries a stable [`EngineError::code`]
//! independent of its `Display` message, for logging and metrics.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A graph failed `validate()`: missing start node, dangling edge
    /// target, or similar structural problem.
    #[error("graph validation failed: {0}")]
    Validation(String),

    /// An operation referenced a node id that was never registered.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// `Graph::register` was called twice for the same node id.
    #[error("node {0} already registered")]
    DuplicateNode(String),

    /// `Engine::run` was called on a graph with no start node set.
    #[error("graph has no start node")]
    NoStart,

    /// A node body returned an error on its final (non-retryable or
    /// exhausted) attempt.
    #[error("node {node} failed on attempt {attempt}: {source}")]
    NodeExecution {
        node: String,
        attempt: u32,
        #[source]
        source: Box<EngineError>,
    },

    /// The run exceeded `EngineConfig::max_steps` without reaching
    /// completion.
    #[error("exceeded max steps ({0})")]
    MaxStepsExceeded(u64),

    /// A node exhausted its retry budget.
    #[error("node {node} exhausted {max_attempts} attempts")]
    MaxAttemptsExceeded { node: String, max_attempts: u32 },

    /// The frontier could not accept a new item within
    /// `EngineConfig::backpressure_timeout`.
    #[error("backpressure timeout enqueuing work for node {0}")]
    Backpressure(String),

    /// Strict replay found a recorded response whose fingerprint didn't
    /// match, or found no recording at all where one was required.
    #[error("replay mismatch for node {node} attempt {attempt}")]
    ReplayMismatch { node: String, attempt: u32 },

    /// A configuration value was structurally valid but not (yet)
    /// supported — e.g. a `ConflictPolicy` variant with no implementation.
    #[error("unsupported configuration: {0}")]
    Configuration(String),

    /// Two concurrently completed results could not be reconciled under
    /// the active `ConflictPolicy`.
    #[error("conflict on field {field}")]
    Conflict { field: String },

    /// The run was canceled, either by the caller or because another node
    /// raised a terminal error first.
    #[error("run canceled")]
    Canceled,

    /// A node attempt exceeded its timeout.
    #[error("node {node} timed out after {duration_ms}ms")]
    Timeout { node: String, duration_ms: u64 },

    #[error(transparent)]
    Checkpoint(#[from] wfgraph_checkpoint::CheckpointError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::UnknownNode(_) => "unknown_node",
            EngineError::DuplicateNode(_) => "duplicate_node",
            EngineError::NoStart => "no_start",
            EngineError::NodeExecution { .. } => "node_execution",
            EngineError::MaxStepsExceeded(_) => "max_steps_exceeded",
            EngineError::MaxAttemptsExceeded { .. } => "max_attempts_exceeded",
            EngineError::Backpressure(_) => "backpressure",
            EngineError::ReplayMismatch { .. } => "replay_mismatch",
            EngineError::Configuration(_) => "configuration",
            EngineError::Conflict { .. } => "conflict",
            EngineError::Canceled => "canceled",
            EngineError::Timeout { .. } => "timeout",
            EngineError::Checkpoint(_) => "checkpoint",
            EngineError::Serialization(_) => "serialization",
            EngineError::Io(_) => "io",
            EngineError::Custom(_) => "custom",
        }
    }

    /// Whether this error represents a condition a `RetryPolicy` should
    /// ever consider retryable in principle (distinct from whether a given
    /// policy's `is_retryable` predicate actually retries it).
    pub fn is_transient_by_default(&self) -> bool {
        matches!(self, EngineError::Timeout { .. } | EngineError::Custom(_))
    }

    /// Whether this error is already a distinctly-matchable engine variant
    /// (e.g. a `ReplayMismatch` a node surfaces via `ctx.replay()?`) that
    /// callers should be able to match directly, as opposed to a generic
    /// error from a node body's own logic that only `NodeExecution` context
    /// (which node, which attempt) makes useful.
    pub fn is_self_describing(&self) -> bool {
        !matches!(
            self,
            EngineError::Custom(_) | EngineError::Io(_) | EngineError::Serialization(_) | EngineError::Checkpoint(_) | EngineError::NodeExecution { .. }
        )
    }

    pub fn node_execution(node: impl Into<String>, attempt: u32, source: EngineError) -> Self {
        EngineError::NodeExecution {
            node: node.into(),
            attempt,
            source: Box::new(source),
        }
    }

    pub fn custom(msg: impl Into<String>) -> Self {
        EngineError::Custom(msg.into())
    }
}
