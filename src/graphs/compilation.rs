//! Graph compilation and structural validation.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::app::App;
use crate::errors::GraphError;
use crate::types::NodeKind;

impl super::builder::GraphBuilder {
    /// Validate the graph and produce an executable [`App`].
    ///
    /// Checks, each failing with [`GraphError::InvalidGraph`]:
    /// 1. at least one outbound edge (static or conditional) leaves `Start`;
    /// 2. every static and waiting edge endpoint names a registered node or
    ///    a valid sentinel (`End` never a source, `Start` never a target);
    /// 3. every registered node declares at least one outbound: a static
    ///    edge, a conditional edge, or membership in a waiting edge's
    ///    sources. Nodes reached only by dynamic dispatch still need one;
    /// 4. node names are unique, non-empty, and not sentinels; conditional
    ///    branch names are unique per source.
    pub fn compile(self) -> Result<App, GraphError> {
        let mut registered: FxHashSet<&NodeKind> = FxHashSet::default();
        for (kind, _) in &self.nodes {
            let name = match kind {
                NodeKind::Custom(name) => name,
                sentinel => {
                    return Err(invalid(format!(
                        "'{sentinel}' is a reserved sentinel and cannot be registered as a node"
                    )))
                }
            };
            if name.is_empty() {
                return Err(invalid("node names must be non-empty"));
            }
            if name == "Start" || name == "End" {
                return Err(invalid(format!(
                    "'{name}' is a reserved sentinel and cannot be used as a node name"
                )));
            }
            if !registered.insert(kind) {
                return Err(invalid(format!("duplicate node '{name}'")));
            }
        }

        let known = |kind: &NodeKind| match kind {
            NodeKind::Start | NodeKind::End => true,
            custom => registered.contains(custom),
        };

        for (from, targets) in &self.edges {
            if from.is_end() {
                return Err(invalid("'End' cannot be the source of an edge"));
            }
            if !known(from) {
                return Err(invalid(format!("edge source '{from}' is not a known node")));
            }
            for to in targets {
                if to.is_start() {
                    return Err(invalid("'Start' cannot be the target of an edge"));
                }
                if !known(to) {
                    return Err(invalid(format!(
                        "edge target '{to}' from '{from}' is not a known node"
                    )));
                }
            }
        }

        for waiting in &self.waiting_edges {
            if waiting.sources.is_empty() {
                return Err(invalid("waiting edges require at least one source"));
            }
            for source in &waiting.sources {
                match source {
                    NodeKind::Custom(_) if known(source) => {}
                    _ => {
                        return Err(invalid(format!(
                            "waiting edge source '{source}' must be a registered node"
                        )))
                    }
                }
            }
            match &waiting.target {
                NodeKind::Start => {
                    return Err(invalid("'Start' cannot be the target of a waiting edge"))
                }
                target if !known(target) => {
                    return Err(invalid(format!(
                        "waiting edge target '{target}' is not a known node"
                    )))
                }
                _ => {}
            }
        }

        let mut branches: FxHashSet<(&NodeKind, &str)> = FxHashSet::default();
        for edge in &self.conditional_edges {
            if edge.source.is_end() {
                return Err(invalid("'End' cannot be the source of a conditional edge"));
            }
            if !known(&edge.source) {
                return Err(invalid(format!(
                    "conditional edge source '{}' is not a known node",
                    edge.source
                )));
            }
            if !branches.insert((&edge.source, edge.branch.as_str())) {
                return Err(invalid(format!(
                    "duplicate conditional branch '{}' from '{}'",
                    edge.branch, edge.source
                )));
            }
        }

        let start_static = self
            .edges
            .get(&NodeKind::Start)
            .is_some_and(|targets| !targets.is_empty());
        let start_conditional = self
            .conditional_edges
            .iter()
            .any(|edge| edge.source.is_start());
        if !start_static && !start_conditional {
            return Err(invalid(
                "no entry point: add an edge or conditional edge from 'Start'",
            ));
        }

        for (kind, _) in &self.nodes {
            let has_static = self
                .edges
                .get(kind)
                .is_some_and(|targets| !targets.is_empty());
            let has_conditional = self
                .conditional_edges
                .iter()
                .any(|edge| &edge.source == kind);
            let has_waiting = self
                .waiting_edges
                .iter()
                .any(|edge| edge.sources.contains(kind));
            if !has_static && !has_conditional && !has_waiting {
                return Err(invalid(format!(
                    "node '{kind}' has no outgoing edges; route it somewhere or to 'End'"
                )));
            }
        }

        let node_order: Vec<NodeKind> = self.nodes.iter().map(|(k, _)| k.clone()).collect();
        let nodes: FxHashMap<NodeKind, super::builder::NodeSpec> =
            self.nodes.into_iter().collect();

        Ok(App::from_parts(
            nodes,
            node_order,
            self.edges,
            self.conditional_edges,
            self.waiting_edges,
            self.schema,
            self.checkpointer,
            self.interrupt_before,
            self.interrupt_after,
            self.debug,
        ))
    }
}

fn invalid(message: impl Into<String>) -> GraphError {
    GraphError::InvalidGraph {
        message: message.into(),
    }
}
