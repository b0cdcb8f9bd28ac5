//! Checkpoint data model and `Store` contract for `wfgraph`.
//!
//! This crate holds everything the execution engine needs to agree with a
//! durable-storage backend on: the [`Checkpoint`] shape, the [`Store`]
//! trait backends implement, and a [`serializer`] protocol so the on-disk
//! format can evolve independently of the engine's in-memory types.
//!
//! It intentionally ships exactly one concrete `Store` — [`memory::InMemoryStore`]
//! — as a reference implementation and test collaborator. Production
//! backends (Postgres, SQLite, object storage, ...) live in separate crates
//! that depend on this one for the contract.

pub mod error;
pub mod history;
pub mod memory;
pub mod serializer;
pub mod traits;
pub mod types;

pub use error::{CheckpointError, Result};
pub use history::{history, known_runs, HistoryEntry};
pub use memory::InMemoryStore;
pub use serializer::{BincodeSerializer, JsonSerializer, SerializerProtocol};
pub use traits::Store;
pub use types::{checkpoint_id, Checkpoint, IdempotencyKey, OrderKey, RecordedIo, RunId, StepId, WorkItemSnapshot};
