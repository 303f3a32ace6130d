//! Node execution primitives.
//!
//! A [`Node`] is one unit of work in a workflow. It receives a deep copy of
//! the pre-step state plus a [`NodeContext`] and returns a [`NodeOutput`]:
//! a state update, a [`Command`], a [`Dispatch`], or a bundle of those.
//!
//! Nodes should be stateless; anything they want remembered goes through the
//! returned update. Mutating the received snapshot is harmless; no other
//! node or step observes it.
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use graphloom::node::{Node, NodeContext, NodeError, NodeOutput};
//! use graphloom::state::StateMap;
//! use graphloom::utils::collections::state_map;
//! use serde_json::json;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Node for Greeter {
//!     async fn run(&self, _state: StateMap, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
//!         Ok(NodeOutput::update(state_map([("greeting", json!("hello"))])))
//!     }
//! }
//! ```

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::control::{Command, Dispatch, Interrupt};
use crate::runtimes::RunConfig;
use crate::state::StateMap;

/// One executable unit of work within a workflow graph.
#[async_trait]
pub trait Node: Send + Sync {
    /// Execute against a deep copy of the pre-step state.
    async fn run(&self, state: StateMap, ctx: NodeContext) -> Result<NodeOutput, NodeError>;
}

/// Execution environment handed to a node.
#[derive(Clone, Debug)]
pub struct NodeContext {
    /// Name of the node being executed.
    pub node_id: String,
    /// Current superstep number.
    pub step: u64,
    /// The invocation's config (thread id, namespace, limits).
    pub config: RunConfig,
}

/// What a node returned, classified explicitly.
///
/// The executor treats an `Update` as this node's contribution to the
/// barrier merge, a `Command` as update-plus-routing, a `Dispatch` as extra
/// same-step work, and a `Bundle` element-wise.
#[derive(Clone, Debug, Default)]
pub enum NodeOutput {
    /// No contribution.
    #[default]
    Empty,
    /// State update merged at the end of the superstep.
    Update(StateMap),
    /// Update plus successor declaration.
    Command(Command),
    /// One extra invocation within this superstep.
    Dispatch(Dispatch),
    /// Several of the above, processed in order.
    Bundle(Vec<NodeOutput>),
}

impl NodeOutput {
    #[must_use]
    pub fn empty() -> Self {
        NodeOutput::Empty
    }

    #[must_use]
    pub fn update(map: StateMap) -> Self {
        NodeOutput::Update(map)
    }
}

impl From<StateMap> for NodeOutput {
    fn from(map: StateMap) -> Self {
        NodeOutput::Update(map)
    }
}

impl From<Command> for NodeOutput {
    fn from(cmd: Command) -> Self {
        NodeOutput::Command(cmd)
    }
}

impl From<Dispatch> for NodeOutput {
    fn from(dispatch: Dispatch) -> Self {
        NodeOutput::Dispatch(dispatch)
    }
}

impl From<Vec<NodeOutput>> for NodeOutput {
    fn from(outputs: Vec<NodeOutput>) -> Self {
        NodeOutput::Bundle(outputs)
    }
}

/// Errors raised from node bodies.
///
/// These stop the workflow (after the node's retry policy is exhausted) and
/// surface wrapped in `GraphError::NodeExecution`, except `Interrupted`,
/// which propagates as an orderly pause.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state snapshot.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(graphloom::node::missing_input),
        help("Check that an upstream node produced the required data: {what}.")
    )]
    MissingInput { what: &'static str },

    /// External provider or service error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(graphloom::node::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(graphloom::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(code(graphloom::node::validation))]
    ValidationFailed(String),

    /// The node requested an orderly pause. Never retried, never wrapped.
    #[error("node raised an interrupt")]
    #[diagnostic(code(graphloom::node::interrupted))]
    Interrupted(Interrupt),

    /// Anything else.
    #[error("{0}")]
    #[diagnostic(code(graphloom::node::other))]
    Other(String),
}

/// Adapter node wrapping an async closure over `(state, ctx)`.
pub struct FnNode<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Node for FnNode<F>
where
    F: Fn(StateMap, NodeContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<NodeOutput, NodeError>> + Send,
{
    async fn run(&self, state: StateMap, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        (self.f)(state, ctx).await
    }
}

/// Wrap an async closure over `(state, ctx)` as a [`Node`].
pub fn node_fn_with_ctx<F, Fut>(f: F) -> FnNode<F>
where
    F: Fn(StateMap, NodeContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
{
    FnNode { f }
}

/// Wrap an async closure over `state` as a [`Node`]; the context is dropped.
pub fn node_fn<F, Fut>(f: F) -> impl Node + 'static
where
    F: Fn(StateMap) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
{
    node_fn_with_ctx(move |state, _ctx| f(state))
}

/// Wrap a zero-argument async closure as a [`Node`].
pub fn node_fn_stateless<F, Fut>(f: F) -> impl Node + 'static
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<NodeOutput, NodeError>> + Send + 'static,
{
    node_fn_with_ctx(move |_state, _ctx| f())
}
