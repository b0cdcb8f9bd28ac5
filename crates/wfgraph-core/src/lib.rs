//! Graph-based workflow execution with bounded concurrent scheduling,
//! deterministic ordering, and transactional checkpointing.
//!
//! A workflow is a [`Graph<S>`] of [`Node<S>`] implementations wired
//! together with plain or conditional edges. An [`Engine<S>`] runs one
//! instance of that graph against an initial state: a bounded pool of
//! workers pulls ready work from a deterministic [`Frontier`], each node's
//! delta is folded through a [`Reducer<S>`] in ascending [`OrderKey`] order
//! regardless of completion order, and a [`wfgraph_checkpoint::Checkpoint`]
//! is committed after every reduce cycle so a crashed run can resume from
//! its last committed step instead of its start.
//!
//! See [`scheduler::Engine`] for the entry point.

pub mod backoff;
pub mod config;
pub mod context;
pub mod emitter;
pub mod error;
pub mod frontier;
pub mod graph;
pub mod node_result;
pub mod order;
pub mod policy;
pub mod reducer;
pub mod replay;
pub mod rng;
pub mod scheduler;
pub mod stream;
pub mod visualization;
pub mod work_item;

pub use config::EngineConfig;
pub use context::NodeContext;
pub use emitter::{Emitter, Event, NullEmitter, TracingEmitter};
pub use error::{EngineError, Result};
pub use frontier::Frontier;
pub use graph::{EdgePredicate, FnNode, Graph, Node, NodeId};
pub use node_result::{NodeResult, Route};
pub use policy::{ConflictPolicy, IdempotencyKeyFn, NodePolicy, RetryPolicy, RetryPredicate, RngDerivation, SideEffectPolicy};
pub use reducer::{apply_batch, AppendReducer, ConflictError, LastValueReducer, MergeReducer, OverwriteReducer, PendingDelta, Reducer, SumReducer};
pub use replay::{ReplayController, ReplayMode, ReplayOutcome};
pub use scheduler::{Engine, RunOutcome};
pub use stream::{event_stream, ChannelEmitter, EventStream};
pub use work_item::WorkItem;

pub use wfgraph_checkpoint::{
    checkpoint_id, Checkpoint, IdempotencyKey, OrderKey, RecordedIo, RunId, SerializerProtocol, StepId, Store, WorkItemSnapshot,
};
