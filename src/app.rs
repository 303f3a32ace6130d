//! The compiled, executable workflow.
//!
//! [`App`] owns the validated graph (nodes, edges, schema, interrupt sets,
//! optional checkpoint store) and exposes the execution surface:
//! [`invoke`](App::invoke), [`stream`](App::stream),
//! [`get_state`](App::get_state), [`update_state`](App::update_state), and
//! [`get_graph`](App::get_graph). One `App` can serve many concurrent
//! invocations; all per-run state lives in the runner.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::instrument;

use crate::errors::GraphError;
use crate::graphs::{ConditionalEdge, InterruptNodes, NodeSpec, WaitingEdge};
use crate::runtimes::checkpointer::{
    Checkpoint, CheckpointMetadata, CheckpointSource, CheckpointStore, INTERRUPT_CHANNEL,
};
use crate::runtimes::runner::Runner;
use crate::runtimes::streaming::{EventStream, StreamEmitter, StreamMode};
use crate::runtimes::RunConfig;
use crate::schema::StateSchema;
use crate::state::{StateMap, StateSnapshot, TaskDescriptor};
use crate::types::NodeKind;

/// Adjacency description returned by [`App::get_graph`].
#[derive(Clone, Debug, Serialize)]
pub struct GraphDescription {
    /// Registered node names, in declaration order.
    pub nodes: Vec<String>,
    /// Static edges as `(source, target)` name pairs, Start/End included.
    pub edges: Vec<(String, String)>,
    /// Sources carrying conditional edges, in declaration order.
    pub conditional_sources: Vec<String>,
    /// Waiting edges as `(sources, target)` name lists.
    pub waiting_edges: Vec<(Vec<String>, String)>,
}

/// A compiled workflow graph, ready to execute.
#[derive(Clone)]
pub struct App {
    nodes: FxHashMap<NodeKind, NodeSpec>,
    node_order: Vec<NodeKind>,
    edges: FxHashMap<NodeKind, Vec<NodeKind>>,
    conditional_edges: Vec<ConditionalEdge>,
    waiting_edges: Vec<WaitingEdge>,
    schema: StateSchema,
    checkpointer: Option<Arc<dyn CheckpointStore>>,
    interrupt_before: InterruptNodes,
    interrupt_after: InterruptNodes,
    debug: bool,
}

impl App {
    /// Internal factory used by `GraphBuilder::compile`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeKind, NodeSpec>,
        node_order: Vec<NodeKind>,
        edges: FxHashMap<NodeKind, Vec<NodeKind>>,
        conditional_edges: Vec<ConditionalEdge>,
        waiting_edges: Vec<WaitingEdge>,
        schema: StateSchema,
        checkpointer: Option<Arc<dyn CheckpointStore>>,
        interrupt_before: InterruptNodes,
        interrupt_after: InterruptNodes,
        debug: bool,
    ) -> Self {
        Self {
            nodes,
            node_order,
            edges,
            conditional_edges,
            waiting_edges,
            schema,
            checkpointer,
            interrupt_before,
            interrupt_after,
            debug,
        }
    }

    /// Look up a registered node.
    #[must_use]
    pub fn node(&self, kind: &NodeKind) -> Option<&NodeSpec> {
        self.nodes.get(kind)
    }

    /// Registered nodes, in declaration order.
    #[must_use]
    pub fn node_order(&self) -> &[NodeKind] {
        &self.node_order
    }

    /// Static adjacency lists.
    #[must_use]
    pub fn edges(&self) -> &FxHashMap<NodeKind, Vec<NodeKind>> {
        &self.edges
    }

    /// Conditional edges, in declaration order.
    #[must_use]
    pub fn conditional_edges(&self) -> &[ConditionalEdge] {
        &self.conditional_edges
    }

    /// Waiting edges, in declaration order.
    #[must_use]
    pub fn waiting_edges(&self) -> &[WaitingEdge] {
        &self.waiting_edges
    }

    /// The state schema (empty schema when none was attached).
    #[must_use]
    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// The bound checkpoint store, if any.
    #[must_use]
    pub fn checkpointer(&self) -> Option<&Arc<dyn CheckpointStore>> {
        self.checkpointer.as_ref()
    }

    #[must_use]
    pub fn interrupt_before(&self) -> &InterruptNodes {
        &self.interrupt_before
    }

    #[must_use]
    pub fn interrupt_after(&self) -> &InterruptNodes {
        &self.interrupt_after
    }

    #[must_use]
    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Execute to completion and return the final state.
    ///
    /// `input` is overlaid on the schema's initial state, or on the
    /// checkpointed state when the config's thread resumes. `None` input is
    /// only valid when a checkpoint exists to resume from; otherwise
    /// [`GraphError::EmptyInput`] is raised.
    ///
    /// # Errors
    ///
    /// [`GraphError::Recursion`] when the superstep limit is hit,
    /// [`GraphError::Interrupted`] on an orderly pause,
    /// [`GraphError::NodeExecution`] when a node fails after retries,
    /// [`GraphError::InvalidUpdate`] on a multi-write conflict.
    #[instrument(skip(self, input, config), err)]
    pub async fn invoke(
        &self,
        input: Option<StateMap>,
        config: &RunConfig,
    ) -> Result<StateMap, GraphError> {
        Runner::new(self.clone(), config.clone(), None).run(input).await
    }

    /// Execute on a background task, yielding per-step events.
    ///
    /// The returned [`EventStream`] is lazy: the run only advances when the
    /// consumer pulls the next event. Dropping the stream aborts the run;
    /// [`EventStream::join`] detaches and waits for the final state.
    #[must_use]
    pub fn stream(
        &self,
        input: Option<StateMap>,
        config: &RunConfig,
        mode: StreamMode,
    ) -> EventStream {
        let (tx, rx) = flume::bounded(0);
        let app = self.clone();
        let config = config.clone();
        let handle = tokio::spawn(async move {
            Runner::new(app, config, Some(StreamEmitter::new(tx, mode)))
                .run(input)
                .await
        });
        EventStream::new(rx, handle)
    }

    /// Read the persisted state of the thread addressed by `config`.
    ///
    /// Returns the checkpoint pinned by `checkpoint_id`, or the latest for
    /// the thread and namespace. `Ok(None)` when no store is bound, the
    /// config has no thread id, or nothing was saved yet.
    pub async fn get_state(
        &self,
        config: &RunConfig,
    ) -> Result<Option<StateSnapshot>, GraphError> {
        let Some(store) = &self.checkpointer else {
            return Ok(None);
        };
        if config.thread_id().is_none() {
            return Ok(None);
        }
        let Some(tuple) = store.get_tuple(config).await? else {
            return Ok(None);
        };

        let interrupts = tuple
            .pending_writes
            .iter()
            .filter(|w| w.channel == INTERRUPT_CHANNEL)
            .filter_map(|w| serde_json::from_value(w.value.clone()).ok())
            .collect();
        let mut tasks: Vec<TaskDescriptor> = Vec::new();
        for write in &tuple.pending_writes {
            match tasks.iter_mut().find(|t| t.id == write.task_id) {
                Some(task) => task.writes.push((write.channel.clone(), write.value.clone())),
                None => tasks.push(TaskDescriptor {
                    id: write.task_id.clone(),
                    writes: vec![(write.channel.clone(), write.value.clone())],
                }),
            }
        }

        Ok(Some(StateSnapshot {
            values: tuple.checkpoint.channel_values.clone(),
            next: tuple
                .checkpoint
                .next_nodes
                .iter()
                .map(|s| NodeKind::decode(s))
                .collect(),
            config: tuple.config,
            metadata: Some(tuple.metadata),
            created_at: Some(tuple.created_at),
            parent_config: tuple.parent_config,
            tasks,
            interrupts,
        }))
    }

    /// Apply `values` to the thread's checkpointed state out of band and
    /// save a new checkpoint with source `update`.
    ///
    /// `as_node` attributes the writes in the checkpoint metadata; naming a
    /// node the graph does not know is [`GraphError::TaskNotFound`]. Returns
    /// the config addressing the new checkpoint, or `Ok(None)` when there is
    /// no store, no thread id, or no checkpoint to update.
    pub async fn update_state(
        &self,
        config: &RunConfig,
        values: StateMap,
        as_node: Option<&str>,
    ) -> Result<Option<RunConfig>, GraphError> {
        let Some(store) = &self.checkpointer else {
            return Ok(None);
        };
        if config.thread_id().is_none() {
            return Ok(None);
        }
        if let Some(node) = as_node
            && self.node(&NodeKind::Custom(node.to_string())).is_none()
        {
            return Err(GraphError::TaskNotFound {
                task_id: node.to_string(),
            });
        }
        let Some(tuple) = store.get_tuple(config).await? else {
            return Ok(None);
        };

        let mut state = tuple.checkpoint.channel_values.clone();
        let mut versions = tuple.checkpoint.channel_versions.clone();
        let changed = self.schema.apply(&mut state, values.clone())?;
        for key in &changed {
            *versions.entry(key.clone()).or_insert(0) += 1;
        }

        let attribution = as_node.unwrap_or("__update__").to_string();
        let mut metadata = CheckpointMetadata::new(
            CheckpointSource::Update,
            tuple.metadata.step + 1,
        );
        metadata.writes = Some(FxHashMap::from_iter([(attribution, values)]));

        let checkpoint = Checkpoint::new(
            state,
            versions.clone(),
            tuple.checkpoint.versions_seen.clone(),
            tuple.checkpoint.next_nodes.clone(),
        );
        let new_config = store
            .put(&tuple.config, checkpoint, metadata, versions)
            .await?;
        Ok(Some(new_config))
    }

    /// Describe the graph's topology.
    #[must_use]
    pub fn get_graph(&self) -> GraphDescription {
        let nodes: Vec<String> = self
            .node_order
            .iter()
            .map(|k| k.name().to_string())
            .collect();

        let mut edges: Vec<(String, String)> = Vec::new();
        let mut sources: Vec<NodeKind> = vec![NodeKind::Start];
        sources.extend(self.node_order.iter().cloned());
        for source in &sources {
            if let Some(targets) = self.edges.get(source) {
                for target in targets {
                    edges.push((source.name().to_string(), target.name().to_string()));
                }
            }
        }

        GraphDescription {
            nodes,
            edges,
            conditional_sources: self
                .conditional_edges
                .iter()
                .map(|e| e.source.name().to_string())
                .collect(),
            waiting_edges: self
                .waiting_edges
                .iter()
                .map(|w| {
                    (
                        w.sources.iter().map(|s| s.name().to_string()).collect(),
                        w.target.name().to_string(),
                    )
                })
                .collect(),
        }
    }
}
