//! Engine-level error taxonomy.
//!
//! Every failure the executor can surface is a [`GraphError`] variant.
//! Module-local errors ([`ChannelError`](crate::channels::ChannelError),
//! [`ReducerError`](crate::reducers::ReducerError),
//! [`NodeError`](crate::node::NodeError),
//! [`StoreError`](crate::runtimes::StoreError)) convert into it at the
//! boundary where the executor observes them.
//!
//! Propagation policy:
//! - node-body errors are retried per the node's retry policy, then wrapped
//!   in [`GraphError::NodeExecution`];
//! - interrupts and the recursion guard propagate unwrapped;
//! - reducer failures and multi-write conflicts abort the step before any
//!   state mutation;
//! - structural problems are raised synchronously from `compile`, or at run
//!   time when dynamic routing names an unknown target.

use miette::Diagnostic;
use thiserror::Error;

use crate::channels::ChannelError;
use crate::control::Interrupt;
use crate::node::NodeError;
use crate::runtimes::StoreError;

/// Failures surfaced by graph compilation and execution.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// The superstep counter reached the configured recursion limit.
    #[error("recursion limit of {limit} supersteps reached without reaching End")]
    #[diagnostic(
        code(graphloom::graph::recursion),
        help("Raise the limit via RunConfig::with_recursion_limit or fix the routing loop.")
    )]
    Recursion { limit: usize },

    /// A last-value field received more than one write in a single superstep.
    #[error("At key '{key}': Can receive only one value per step.")]
    #[diagnostic(
        code(graphloom::graph::invalid_update),
        help("Declare a reducer for '{key}' or make sure only one node writes it per step.")
    )]
    InvalidUpdate { key: String },

    /// A channel was read while holding no value.
    #[error("channel '{key}' is empty")]
    #[diagnostic(code(graphloom::graph::empty_channel))]
    EmptyChannel { key: String },

    /// Structural validation failed at compile time, or dynamic routing
    /// produced an unknown target at run time.
    #[error("invalid graph: {message}")]
    #[diagnostic(code(graphloom::graph::invalid_graph))]
    InvalidGraph { message: String },

    /// A node body failed after its retry policy was exhausted.
    #[error("node '{node}' failed: {source}")]
    #[diagnostic(
        code(graphloom::graph::node_execution),
        help("Inspect the wrapped error; the node name identifies the failing step.")
    )]
    NodeExecution {
        node: String,
        #[source]
        source: NodeError,
    },

    /// Orderly pause. State was checkpointed before this error was raised;
    /// resume by invoking again with no input and the same thread config.
    #[error("graph execution interrupted")]
    #[diagnostic(
        code(graphloom::graph::interrupted),
        help("Resume with `invoke(None, config)` using the same thread_id.")
    )]
    Interrupted { interrupts: Vec<Interrupt> },

    /// Invocation without input and without a checkpoint to resume from.
    #[error("no input provided and no checkpoint to resume from")]
    #[diagnostic(code(graphloom::graph::empty_input))]
    EmptyInput,

    /// A reference to a task unknown to the graph or checkpoint.
    #[error("task not found: {task_id}")]
    #[diagnostic(code(graphloom::graph::task_not_found))]
    TaskNotFound { task_id: String },

    /// A reducer raised while merging a field update.
    #[error("reducer failed for field '{key}': {source}")]
    #[diagnostic(code(graphloom::graph::reducer))]
    Reducer {
        key: String,
        #[source]
        source: crate::reducers::ReducerError,
    },

    /// Checkpoint store failure.
    #[error(transparent)]
    #[diagnostic(code(graphloom::graph::store))]
    Store(#[from] StoreError),

    /// A background driver task (streaming) failed to join.
    #[error("workflow task join error: {message}")]
    #[diagnostic(code(graphloom::graph::join))]
    Join { message: String },
}

impl From<ChannelError> for GraphError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::InvalidUpdate { key } => GraphError::InvalidUpdate { key },
            ChannelError::Empty { key } => GraphError::EmptyChannel { key },
            ChannelError::Operator { key, source } => GraphError::Reducer { key, source },
            ChannelError::Restore { key } => GraphError::InvalidGraph {
                message: format!("channel '{key}' cannot be restored without its operator"),
            },
        }
    }
}
