//! The superstep execution loop.
//!
//! One [`Runner`] drives one `invoke`/`stream` call: resolve the frontier,
//! hand every runnable node the same pre-step snapshot, classify outputs,
//! guard single-write fields, merge through the schema, resolve successors,
//! drain the same-step dispatch queue, checkpoint, repeat. The runner owns
//! the live state for the whole invocation; nodes only ever see deep copies.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::instrument;

use crate::app::App;
use crate::channels::{Channel, LastValue};
use crate::control::{Dispatch, GotoTarget, Interrupt};
use crate::errors::GraphError;
use crate::graphs::FrontierEntry;
use crate::graphs::NodeSpec;
use crate::node::{NodeContext, NodeError, NodeOutput};
use crate::runtimes::checkpointer::{
    Checkpoint, CheckpointMetadata, CheckpointSource, INTERRUPT_CHANNEL, RESUME_CHANNEL,
};
use crate::runtimes::config::RunConfig;
use crate::runtimes::streaming::StreamEmitter;
use crate::state::StateMap;
use crate::types::NodeKind;

/// Mutable execution context for one invocation.
struct ExecState {
    state: StateMap,
    step: u64,
    channel_versions: FxHashMap<String, u64>,
    versions_seen: FxHashMap<String, FxHashMap<String, u64>>,
    /// Dispatches carried into the next superstep (entry-point dispatches).
    pending_dispatches: Vec<Dispatch>,
}

struct StepOutcome {
    next_frontier: Vec<NodeKind>,
}

pub(crate) struct Runner {
    app: App,
    config: RunConfig,
    /// Present only when the app has a store and the config names a thread.
    store: Option<std::sync::Arc<dyn crate::runtimes::CheckpointStore>>,
    /// Config whose checkpoint_id tracks the latest saved checkpoint, so
    /// each save links to its parent.
    save_config: RunConfig,
    emitter: Option<StreamEmitter>,
}

impl Runner {
    pub(crate) fn new(app: App, config: RunConfig, emitter: Option<StreamEmitter>) -> Self {
        let store = if config.thread_id().is_some() {
            app.checkpointer().cloned()
        } else {
            None
        };
        let save_config = config.clone();
        Self {
            app,
            config,
            store,
            save_config,
            emitter,
        }
    }

    /// Run the graph to completion (or to an interrupt / error).
    #[instrument(skip(self, input), fields(thread = ?self.config.thread_id()), err)]
    pub(crate) async fn run(mut self, input: Option<StateMap>) -> Result<StateMap, GraphError> {
        let resumed = match &self.store {
            Some(store) => store.get_tuple(&self.config).await?,
            None => None,
        };

        let mut exec;
        let mut frontier: Vec<NodeKind>;
        let mut skip_before_once = false;

        match resumed {
            Some(tuple) => {
                let mut state = tuple.checkpoint.channel_values.clone();
                let mut channel_versions = tuple.checkpoint.channel_versions.clone();
                // Resuming an interrupted checkpoint (or one patched via
                // update_state while paused) means the pause was handled;
                // the restored frontier runs without re-firing.
                skip_before_once = matches!(
                    tuple.metadata.source,
                    CheckpointSource::Interrupt | CheckpointSource::Update
                );
                if let Some(overlay) = input {
                    let changed = self.app.schema().apply(&mut state, overlay)?;
                    bump_versions(&mut channel_versions, &changed);
                }
                frontier = tuple
                    .checkpoint
                    .next_nodes
                    .iter()
                    .map(|s| NodeKind::decode(s))
                    .collect();
                tracing::info!(
                    step = tuple.metadata.step,
                    source = ?tuple.metadata.source,
                    "resuming thread from checkpoint"
                );
                self.save_config = tuple.config.clone();
                exec = ExecState {
                    state,
                    step: tuple.metadata.step,
                    channel_versions,
                    versions_seen: tuple.checkpoint.versions_seen.clone(),
                    pending_dispatches: Vec::new(),
                };
            }
            None => {
                let overlay = input.ok_or(GraphError::EmptyInput)?;
                let mut state = self.app.schema().initial_state();
                let mut channel_versions: FxHashMap<String, u64> = FxHashMap::default();
                for field in self.app.schema().fields() {
                    if field.default.is_some() {
                        channel_versions.insert(field.name.clone(), 1);
                    }
                }
                let changed = self.app.schema().apply(&mut state, overlay)?;
                bump_versions(&mut channel_versions, &changed);

                let mut dispatches = Vec::new();
                frontier = self.initial_frontier(&state, &mut dispatches)?;
                exec = ExecState {
                    state,
                    step: 0,
                    channel_versions,
                    versions_seen: FxHashMap::default(),
                    pending_dispatches: dispatches,
                };
                self.save(&exec, &frontier, CheckpointSource::Input, None)
                    .await?;
            }
        }

        loop {
            let runnable: Vec<NodeKind> =
                frontier.iter().filter(|k| !k.is_end()).cloned().collect();
            if runnable.is_empty() && exec.pending_dispatches.is_empty() {
                break;
            }

            let limit = self.config.recursion_limit();
            if exec.step as usize >= limit {
                return Err(GraphError::Recursion { limit });
            }

            if !skip_before_once {
                for kind in &runnable {
                    if self.app.interrupt_before().matches(kind.name()) {
                        let next = vec![kind.clone()];
                        return Err(self.pause(&exec, &next, kind.name(), "before").await);
                    }
                }
            }
            skip_before_once = false;

            let outcome = self.superstep(&mut exec, &runnable).await?;

            for kind in &runnable {
                if self.app.interrupt_after().matches(kind.name()) {
                    return Err(self
                        .pause(&exec, &outcome.next_frontier, kind.name(), "after")
                        .await);
                }
            }

            frontier = outcome.next_frontier;
            exec.step += 1;
            self.save(&exec, &frontier, CheckpointSource::Loop, None)
                .await?;
        }

        self.save(&exec, &[], CheckpointSource::Exit, None).await?;
        if let Some(emitter) = &mut self.emitter {
            emitter.emit_values(exec.step, &exec.state).await;
        }
        tracing::info!(step = exec.step, "graph run complete");
        Ok(exec.state)
    }

    /// Entry frontier: static edges out of `Start` plus every conditional
    /// edge rooted there. Dispatches returned by a conditional entry point
    /// run in the first superstep.
    fn initial_frontier(
        &self,
        state: &StateMap,
        dispatches: &mut Vec<Dispatch>,
    ) -> Result<Vec<NodeKind>, GraphError> {
        let mut frontier: Vec<NodeKind> = Vec::new();
        if let Some(targets) = self.app.edges().get(&NodeKind::Start) {
            for target in targets {
                push_unique(&mut frontier, target.clone());
            }
        }
        for edge in self
            .app
            .conditional_edges()
            .iter()
            .filter(|e| e.source.is_start())
        {
            for entry in edge.resolve(state, &self.config)? {
                match entry {
                    FrontierEntry::Node(kind) => {
                        self.ensure_routable(&kind)?;
                        push_unique(&mut frontier, kind);
                    }
                    FrontierEntry::Dispatch(dispatch) => dispatches.push(dispatch),
                }
            }
        }
        if frontier.is_empty() && dispatches.is_empty() {
            return Err(GraphError::InvalidGraph {
                message: "no nodes to run from Start (empty frontier)".to_string(),
            });
        }
        Ok(frontier)
    }

    /// Execute one superstep against a frozen snapshot of `exec.state`.
    #[instrument(skip(self, exec, runnable), fields(step = exec.step), err)]
    async fn superstep(
        &mut self,
        exec: &mut ExecState,
        runnable: &[NodeKind],
    ) -> Result<StepOutcome, GraphError> {
        let step = exec.step;
        let snapshot = exec.state.clone();

        let mut buckets: Vec<(String, StateMap)> = Vec::new();
        let mut dispatches: VecDeque<Dispatch> = exec.pending_dispatches.drain(..).collect();
        let mut next_from_commands: Vec<NodeKind> = Vec::new();
        let mut resume_values: Vec<Value> = Vec::new();

        // Invoke in frontier order; every node sees the same snapshot.
        for kind in runnable {
            let name = kind.name().to_string();
            let spec = self.node_spec(kind)?;
            let ctx = NodeContext {
                node_id: name.clone(),
                step,
                config: self.config.clone(),
            };
            let output = match run_node(&spec, snapshot.clone(), ctx).await {
                Ok(output) => output,
                Err(NodeError::Interrupted(interrupt)) => {
                    let next = vec![kind.clone()];
                    self.save(exec, &next, CheckpointSource::Interrupt, None)
                        .await?;
                    self.record_interrupt(&interrupt, &name).await;
                    return Err(GraphError::Interrupted {
                        interrupts: vec![interrupt],
                    });
                }
                Err(source) => return Err(GraphError::NodeExecution { node: name, source }),
            };
            classify(
                &name,
                output,
                &mut buckets,
                &mut dispatches,
                &mut next_from_commands,
                &mut resume_values,
            )?;
        }

        // Single-write guard for reducer-less fields, before any mutation.
        let mut written_last_value = self.check_single_writes(&buckets)?;

        // Barrier merge in bucket insertion order; each bucket goes through
        // the schema's merge surface.
        let updates_event: FxHashMap<String, StateMap> = buckets.iter().cloned().collect();
        for (_, update) in buckets {
            let changed = self.app.schema().apply(&mut exec.state, update)?;
            bump_versions(&mut exec.channel_versions, &changed);
        }
        for kind in runnable {
            exec.versions_seen
                .insert(kind.name().to_string(), exec.channel_versions.clone());
        }

        if let Some(emitter) = &mut self.emitter {
            emitter.emit_updates(step, updates_event).await;
            emitter.emit_values(step, &exec.state).await;
        }

        // Successors: static edges, conditional edges (against merged
        // state), then waiting edges over the set that actually ran.
        let mut next_frontier: Vec<NodeKind> = Vec::new();
        let ran: FxHashSet<&NodeKind> = runnable.iter().collect();
        for kind in runnable {
            if let Some(targets) = self.app.edges().get(kind) {
                for target in targets {
                    push_unique(&mut next_frontier, target.clone());
                }
            }
            for edge in self
                .app
                .conditional_edges()
                .iter()
                .filter(|e| &e.source == kind)
            {
                for entry in edge.resolve(&exec.state, &self.config)? {
                    match entry {
                        FrontierEntry::Node(target) => {
                            self.ensure_routable(&target)?;
                            push_unique(&mut next_frontier, target);
                        }
                        FrontierEntry::Dispatch(dispatch) => dispatches.push_back(dispatch),
                    }
                }
            }
        }
        for waiting in self.app.waiting_edges() {
            if waiting.sources.iter().all(|s| ran.contains(s)) {
                push_unique(&mut next_frontier, waiting.target.clone());
            }
        }

        // Same-step dispatch queue, FIFO; dispatched nodes may enqueue more.
        while let Some(dispatch) = dispatches.pop_front() {
            self.run_dispatch(
                exec,
                dispatch,
                step,
                &mut dispatches,
                &mut next_from_commands,
                &mut resume_values,
                &mut written_last_value,
            )
            .await?;
        }

        if !resume_values.is_empty()
            && let Some(store) = &self.store
            && self.save_config.checkpoint_id().is_some()
        {
            let writes: Vec<(String, Value)> = resume_values
                .drain(..)
                .map(|v| (RESUME_CHANNEL.to_string(), v))
                .collect();
            store
                .put_writes(&self.save_config, writes, RESUME_CHANNEL)
                .await?;
        }

        for kind in next_from_commands {
            self.ensure_routable(&kind)?;
            push_unique(&mut next_frontier, kind);
        }

        tracing::debug!(step, next = ?next_frontier, "superstep complete");
        Ok(StepOutcome {
            next_frontier,
        })
    }

    /// Run one dispatched invocation: arg overlaid on a deep copy of the
    /// live state, result classified and merged immediately.
    #[allow(clippy::too_many_arguments)]
    async fn run_dispatch(
        &mut self,
        exec: &mut ExecState,
        dispatch: Dispatch,
        step: u64,
        queue: &mut VecDeque<Dispatch>,
        next_from_commands: &mut Vec<NodeKind>,
        resume_values: &mut Vec<Value>,
        written_last_value: &mut FxHashSet<String>,
    ) -> Result<(), GraphError> {
        let kind = NodeKind::Custom(dispatch.target.clone());
        let spec = self.node_spec(&kind).map_err(|_| GraphError::InvalidGraph {
            message: format!("dispatch targets unknown node '{}'", dispatch.target),
        })?;

        let mut base = exec.state.clone();
        if let Value::Object(overlay) = dispatch.arg {
            let overlay: StateMap = overlay.into_iter().collect();
            self.app.schema().apply(&mut base, overlay)?;
        }

        let ctx = NodeContext {
            node_id: dispatch.target.clone(),
            step,
            config: self.config.clone(),
        };
        let output = match run_node(&spec, base, ctx).await {
            Ok(output) => output,
            Err(NodeError::Interrupted(interrupt)) => {
                let next = vec![kind.clone()];
                self.save(exec, &next, CheckpointSource::Interrupt, None)
                    .await?;
                self.record_interrupt(&interrupt, &dispatch.target).await;
                return Err(GraphError::Interrupted {
                    interrupts: vec![interrupt],
                });
            }
            Err(source) => {
                return Err(GraphError::NodeExecution {
                    node: dispatch.target.clone(),
                    source,
                })
            }
        };

        let mut local: Vec<(String, StateMap)> = Vec::new();
        classify(
            &dispatch.target,
            output,
            &mut local,
            queue,
            next_from_commands,
            resume_values,
        )?;
        for (_, update) in local {
            for key in update.keys() {
                if !self.app.schema().has_reducer(key) && !written_last_value.insert(key.clone())
                {
                    return Err(GraphError::InvalidUpdate { key: key.clone() });
                }
            }
            let changed = self.app.schema().apply(&mut exec.state, update)?;
            bump_versions(&mut exec.channel_versions, &changed);
        }
        exec.versions_seen
            .insert(dispatch.target.clone(), exec.channel_versions.clone());
        Ok(())
    }

    /// Aggregate per-field writes across all buckets and push reducer-less
    /// fields through a [`LastValue`] channel, so a double write fails
    /// before any state mutates. Conflicts are reported for the
    /// lexicographically smallest key.
    fn check_single_writes(
        &self,
        buckets: &[(String, StateMap)],
    ) -> Result<FxHashSet<String>, GraphError> {
        let mut writes: FxHashMap<&String, Vec<Value>> = FxHashMap::default();
        for (_, update) in buckets {
            for (key, value) in update {
                if !self.app.schema().has_reducer(key) {
                    writes.entry(key).or_default().push(value.clone());
                }
            }
        }
        let mut keys: Vec<&&String> = writes.keys().collect();
        keys.sort();
        let mut written = FxHashSet::default();
        for key in keys {
            let mut channel = LastValue::new((**key).clone());
            channel.update(writes[*key].clone())?;
            written.insert((**key).clone());
        }
        Ok(written)
    }

    fn node_spec(&self, kind: &NodeKind) -> Result<NodeSpec, GraphError> {
        self.app
            .node(kind)
            .cloned()
            .ok_or_else(|| GraphError::InvalidGraph {
                message: format!("frontier names unknown node '{kind}'"),
            })
    }

    /// Custom routes must name registered nodes; `End` terminates a branch;
    /// `Start` is never a target.
    fn ensure_routable(&self, kind: &NodeKind) -> Result<(), GraphError> {
        match kind {
            NodeKind::End => Ok(()),
            NodeKind::Start => Err(GraphError::InvalidGraph {
                message: "routing to 'Start' is not allowed".to_string(),
            }),
            custom => {
                if self.app.node(custom).is_some() {
                    Ok(())
                } else {
                    Err(GraphError::InvalidGraph {
                        message: format!("route targets unknown node '{custom}'"),
                    })
                }
            }
        }
    }

    /// Persist a checkpoint if a store and thread are configured.
    async fn save(
        &mut self,
        exec: &ExecState,
        next_nodes: &[NodeKind],
        source: CheckpointSource,
        writes: Option<FxHashMap<String, StateMap>>,
    ) -> Result<(), GraphError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let checkpoint = Checkpoint::new(
            exec.state.clone(),
            exec.channel_versions.clone(),
            exec.versions_seen.clone(),
            next_nodes.iter().map(NodeKind::encode).collect(),
        );
        let mut metadata = CheckpointMetadata::new(source, exec.step);
        metadata.writes = writes;
        let new_config = store
            .put(
                &self.save_config,
                checkpoint,
                metadata,
                exec.channel_versions.clone(),
            )
            .await?;
        self.save_config = new_config;
        Ok(())
    }

    /// Checkpoint and build the orderly-pause error for an interrupt.
    async fn pause(
        &mut self,
        exec: &ExecState,
        next_nodes: &[NodeKind],
        node: &str,
        phase: &str,
    ) -> GraphError {
        let interrupt = Interrupt::new(Value::String(format!("Interrupted {phase} '{node}'")));
        if let Err(e) = self
            .save(exec, next_nodes, CheckpointSource::Interrupt, None)
            .await
        {
            return e;
        }
        self.record_interrupt(&interrupt, node).await;
        GraphError::Interrupted {
            interrupts: vec![interrupt],
        }
    }

    /// Attach the interrupt payload to the just-saved checkpoint so
    /// `get_state` can surface it.
    async fn record_interrupt(&self, interrupt: &Interrupt, node: &str) {
        let Some(store) = &self.store else { return };
        if self.save_config.checkpoint_id().is_none() {
            return;
        }
        let value = serde_json::to_value(interrupt).unwrap_or(Value::Null);
        if let Err(e) = store
            .put_writes(
                &self.save_config,
                vec![(INTERRUPT_CHANNEL.to_string(), value)],
                node,
            )
            .await
        {
            tracing::warn!(node, error = %e, "failed to record interrupt pending write");
        }
    }
}

/// Run one node, honoring its retry policy.
async fn run_node(
    spec: &NodeSpec,
    state: StateMap,
    ctx: NodeContext,
) -> Result<NodeOutput, NodeError> {
    let Some(policy) = spec.retry_policy() else {
        return spec.action.run(state, ctx).await;
    };
    let mut attempt: u32 = 0;
    loop {
        match spec.action.run(state.clone(), ctx.clone()).await {
            Ok(output) => return Ok(output),
            Err(error) => {
                if attempt + 1 >= policy.max_attempts || !policy.should_retry(&error) {
                    return Err(error);
                }
                let delay = policy.interval_for(attempt);
                tracing::warn!(
                    node = %ctx.node_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying node after failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Sort a node's output into update buckets, the dispatch queue, and
/// command-declared successors. Bundles are processed element-wise.
fn classify(
    node: &str,
    output: NodeOutput,
    buckets: &mut Vec<(String, StateMap)>,
    dispatches: &mut VecDeque<Dispatch>,
    next_from_commands: &mut Vec<NodeKind>,
    resume_values: &mut Vec<Value>,
) -> Result<(), GraphError> {
    match output {
        NodeOutput::Empty => {}
        NodeOutput::Update(update) => merge_bucket(buckets, node.to_string(), update),
        NodeOutput::Dispatch(dispatch) => dispatches.push_back(dispatch),
        NodeOutput::Command(command) => {
            if command.graph.is_some() {
                return Err(GraphError::InvalidGraph {
                    message: format!(
                        "node '{node}' returned a Command with a subgraph; subgraph handoff is reserved"
                    ),
                });
            }
            if let Some(update) = command.update {
                merge_bucket(buckets, format!("{node}:command"), update);
            }
            if let Some(value) = command.resume {
                resume_values.push(value);
            }
            for target in command.goto {
                match target {
                    GotoTarget::Node(kind) => next_from_commands.push(kind),
                    GotoTarget::Dispatch(dispatch) => dispatches.push_back(dispatch),
                }
            }
        }
        NodeOutput::Bundle(outputs) => {
            for output in outputs {
                classify(
                    node,
                    output,
                    buckets,
                    dispatches,
                    next_from_commands,
                    resume_values,
                )?;
            }
        }
    }
    Ok(())
}

/// Merge an update into the node's bucket, later writes winning per key.
fn merge_bucket(buckets: &mut Vec<(String, StateMap)>, key: String, update: StateMap) {
    if let Some((_, existing)) = buckets.iter_mut().find(|(k, _)| *k == key) {
        for (k, v) in update {
            existing.insert(k, v);
        }
    } else {
        buckets.push((key, update));
    }
}

fn push_unique(frontier: &mut Vec<NodeKind>, kind: NodeKind) {
    if !frontier.contains(&kind) {
        frontier.push(kind);
    }
}

fn bump_versions(versions: &mut FxHashMap<String, u64>, changed: &[String]) {
    for key in changed {
        *versions.entry(key.clone()).or_insert(0) += 1;
    }
}
