//! Fluent builder for workflow graphs.
//!
//! Collect nodes, edges, a schema, a checkpoint store, and interrupt sets,
//! then [`compile`](GraphBuilder::compile) into an executable
//! [`App`](crate::app::App). All structural validation happens at compile
//! time; builder methods never fail.
//!
//! # Examples
//!
//! ```rust
//! use graphloom::graphs::GraphBuilder;
//! use graphloom::node::{node_fn, NodeOutput};
//! use graphloom::utils::collections::state_map;
//! use serde_json::json;
//!
//! let app = GraphBuilder::new()
//!     .add_node("worker", node_fn(|_state| async {
//!         Ok(NodeOutput::update(state_map([("done", json!(true))])))
//!     }))
//!     .set_entry_point("worker")
//!     .set_finish_point("worker")
//!     .compile()
//!     .unwrap();
//! assert_eq!(app.get_graph().nodes, vec!["worker".to_string()]);
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::edges::{ConditionalEdge, PathFn, WaitingEdge};
use crate::node::Node;
use crate::runtimes::{CachePolicy, CheckpointStore, RetryPolicy};
use crate::schema::StateSchema;
use crate::types::NodeKind;

/// A registered node together with its execution policies.
#[derive(Clone)]
pub struct NodeSpec {
    pub(crate) action: Arc<dyn Node>,
    pub(crate) metadata: FxHashMap<String, Value>,
    pub(crate) retry_policy: Option<RetryPolicy>,
    pub(crate) cache_policy: Option<CachePolicy>,
}

impl NodeSpec {
    /// The node's metadata map.
    #[must_use]
    pub fn metadata(&self) -> &FxHashMap<String, Value> {
        &self.metadata
    }

    /// The node's retry policy, if one was declared.
    #[must_use]
    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }
}

/// Optional per-node configuration passed to
/// [`GraphBuilder::add_node_with`].
#[derive(Clone, Default)]
pub struct NodeOptions {
    pub metadata: FxHashMap<String, Value>,
    pub retry_policy: Option<RetryPolicy>,
    pub cache_policy: Option<CachePolicy>,
}

impl NodeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }
}

/// Which nodes an interrupt set matches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum InterruptNodes {
    /// Match nothing (the default).
    #[default]
    None,
    /// The `"*"` wildcard: match every node.
    All,
    /// Match the named nodes exactly.
    Named(Vec<String>),
}

impl InterruptNodes {
    /// Build from a name list, honoring the `"*"` wildcard.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            InterruptNodes::None
        } else if names.iter().any(|n| n == "*") {
            InterruptNodes::All
        } else {
            InterruptNodes::Named(names)
        }
    }

    /// Whether `name` is covered by this set.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        match self {
            InterruptNodes::None => false,
            InterruptNodes::All => true,
            InterruptNodes::Named(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Builder for workflow graphs.
pub struct GraphBuilder {
    pub(crate) nodes: Vec<(NodeKind, NodeSpec)>,
    pub(crate) edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    pub(crate) conditional_edges: Vec<ConditionalEdge>,
    pub(crate) waiting_edges: Vec<WaitingEdge>,
    pub(crate) schema: StateSchema,
    pub(crate) checkpointer: Option<Arc<dyn CheckpointStore>>,
    pub(crate) interrupt_before: InterruptNodes,
    pub(crate) interrupt_after: InterruptNodes,
    pub(crate) debug: bool,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: FxHashMap::default(),
            conditional_edges: Vec::new(),
            waiting_edges: Vec::new(),
            schema: StateSchema::default(),
            checkpointer: None,
            interrupt_before: InterruptNodes::None,
            interrupt_after: InterruptNodes::None,
            debug: false,
        }
    }

    /// Register a node under a unique, non-sentinel name.
    ///
    /// Duplicates and sentinel names are rejected at
    /// [`compile`](Self::compile) time, not here.
    #[must_use]
    pub fn add_node(self, name: impl Into<String>, node: impl Node + 'static) -> Self {
        self.add_node_with(name, node, NodeOptions::default())
    }

    /// Register a node with metadata and retry/cache policies.
    #[must_use]
    pub fn add_node_with(
        mut self,
        name: impl Into<String>,
        node: impl Node + 'static,
        options: NodeOptions,
    ) -> Self {
        self.nodes.push((
            NodeKind::Custom(name.into()),
            NodeSpec {
                action: Arc::new(node),
                metadata: options.metadata,
                retry_policy: options.retry_policy,
                cache_policy: options.cache_policy,
            },
        ));
        self
    }

    /// Add a static edge. `NodeKind::Start` as source declares an entry
    /// point; `NodeKind::End` as target declares an exit.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<NodeKind>, to: impl Into<NodeKind>) -> Self {
        self.edges.entry(from.into()).or_default().push(to.into());
        self
    }

    /// Add a waiting edge: `target` fires only in a superstep where every
    /// source executed.
    #[must_use]
    pub fn add_waiting_edge<I, K>(mut self, sources: I, target: impl Into<NodeKind>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<NodeKind>,
    {
        self.waiting_edges.push(WaitingEdge {
            sources: sources.into_iter().map(Into::into).collect(),
            target: target.into(),
        });
        self
    }

    /// Add a conditional edge rooted at `source`.
    ///
    /// `path` is evaluated against post-merge state; its labels are
    /// translated through `path_map` when one is given (with a `"default"`
    /// key as fallback), otherwise taken as literal node names.
    #[must_use]
    pub fn add_conditional_edges(
        mut self,
        source: impl Into<NodeKind>,
        path: PathFn,
        path_map: Option<FxHashMap<String, String>>,
    ) -> Self {
        let source = source.into();
        let branch = format!("condition_{}", self.conditional_edges.len());
        self.conditional_edges.push(ConditionalEdge {
            source,
            branch,
            path,
            path_map,
        });
        self
    }

    /// Register a chain of nodes connected by static edges, in order.
    #[must_use]
    pub fn add_sequence<I>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = (String, Arc<dyn Node>)>,
    {
        let mut previous: Option<NodeKind> = None;
        for (name, action) in steps {
            let kind = NodeKind::Custom(name);
            self.nodes.push((
                kind.clone(),
                NodeSpec {
                    action,
                    metadata: FxHashMap::default(),
                    retry_policy: None,
                    cache_policy: None,
                },
            ));
            if let Some(prev) = previous.take() {
                self.edges.entry(prev).or_default().push(kind.clone());
            }
            previous = Some(kind);
        }
        self
    }

    /// Declare `name` as an entry point (`Start -> name`).
    #[must_use]
    pub fn set_entry_point(self, name: impl Into<String>) -> Self {
        self.add_edge(NodeKind::Start, NodeKind::Custom(name.into()))
    }

    /// Declare `name` as a finish point (`name -> End`).
    #[must_use]
    pub fn set_finish_point(self, name: impl Into<String>) -> Self {
        self.add_edge(NodeKind::Custom(name.into()), NodeKind::End)
    }

    /// Declare a conditional entry point (a conditional edge rooted at
    /// `Start`).
    #[must_use]
    pub fn set_conditional_entry_point(
        self,
        path: PathFn,
        path_map: Option<FxHashMap<String, String>>,
    ) -> Self {
        self.add_conditional_edges(NodeKind::Start, path, path_map)
    }

    /// Attach the state schema (fields, reducers, defaults).
    #[must_use]
    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Bind a checkpoint store; checkpoints are saved whenever the caller's
    /// config carries a thread id.
    #[must_use]
    pub fn with_checkpointer(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpointer = Some(store);
        self
    }

    /// Pause before the named nodes execute (`"*"` matches every node).
    #[must_use]
    pub fn with_interrupt_before<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interrupt_before = InterruptNodes::from_names(names);
        self
    }

    /// Pause after the named nodes executed (`"*"` matches every node).
    #[must_use]
    pub fn with_interrupt_after<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interrupt_after = InterruptNodes::from_names(names);
        self
    }

    /// Enable verbose execution tracing on the compiled app.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Number of registered nodes (virtual Start/End excluded).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of static edges, including those touching Start/End.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }
}
