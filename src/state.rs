//! State containers for workflow execution.
//!
//! Execution state is a flat mapping from field names to JSON values
//! ([`StateMap`]). The executor owns the live map for the duration of an
//! invocation; nodes only ever see deep copies (`serde_json::Value::clone`
//! duplicates the full tree), so in-place mutation of a snapshot is never
//! observable by peers in the same superstep.
//!
//! [`StateSnapshot`] is the read-only view of a persisted thread returned by
//! [`App::get_state`](crate::app::App::get_state): the checkpointed values
//! together with the planned frontier, config lineage, and any pending
//! interrupts.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::control::Interrupt;
use crate::runtimes::{CheckpointMetadata, RunConfig};
use crate::types::NodeKind;

/// The state of one invocation: field name to JSON value.
///
/// Cloning a `StateMap` is a deep copy; `serde_json::Value` owns its whole
/// tree. The executor relies on this for per-superstep snapshot isolation.
pub type StateMap = FxHashMap<String, Value>;

/// Read-only view of a thread's persisted state at one checkpoint.
///
/// Returned by [`App::get_state`](crate::app::App::get_state). Never aliases
/// live executor state.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    /// Field values at the checkpoint.
    pub values: StateMap,
    /// Nodes scheduled to run next when the thread resumes.
    pub next: Vec<NodeKind>,
    /// The config addressing this checkpoint (thread, namespace, id).
    pub config: RunConfig,
    /// Checkpoint metadata (source, step, parents, write attribution).
    pub metadata: Option<CheckpointMetadata>,
    /// When the checkpoint was saved.
    pub created_at: Option<DateTime<Utc>>,
    /// Config of the parent checkpoint, if any.
    pub parent_config: Option<RunConfig>,
    /// Pending writes grouped by task.
    pub tasks: Vec<TaskDescriptor>,
    /// Interrupts recorded against this checkpoint.
    pub interrupts: Vec<Interrupt>,
}

/// Pending writes attributed to one task id within a checkpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskDescriptor {
    /// The task that produced the writes (a node name for interrupts).
    pub id: String,
    /// `(channel, value)` pairs recorded for the task.
    pub writes: Vec<(String, Value)>,
}
