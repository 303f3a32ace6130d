//! Runtime infrastructure: configuration, retry policies, checkpointing,
//! the superstep runner, and streaming.
//!
//! The runtime layer sits between the compiled graph
//! ([`App`](crate::app::App)) and durable storage: it executes supersteps,
//! persists checkpoints keyed by the caller's thread id, and exposes
//! per-step event streams.

pub mod checkpointer;
pub mod config;
pub mod retry;
pub(crate) mod runner;
pub mod streaming;

pub use checkpointer::{
    Checkpoint, CheckpointMetadata, CheckpointSource, CheckpointStore, CheckpointTuple,
    InMemorySaver, PendingWrite, StoreError, INTERRUPT_CHANNEL, RESUME_CHANNEL,
};
pub use config::{Configurable, RunConfig};
pub use retry::{CachePolicy, RetryOn, RetryPolicy};
pub use streaming::{DebugPayload, EventStream, StreamEvent, StreamMode};
