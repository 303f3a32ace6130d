//! Edge flavours and routing predicates.
//!
//! Three declared edge kinds exist besides dynamic dispatch: static edges
//! (adjacency lists on the builder), [`ConditionalEdge`]s evaluated against
//! post-merge state, and [`WaitingEdge`]s that fire only when every source
//! ran in the same superstep.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::control::Dispatch;
use crate::errors::GraphError;
use crate::runtimes::RunConfig;
use crate::state::StateMap;
use crate::types::NodeKind;

/// One routing choice produced by a conditional edge's path function.
#[derive(Clone, Debug, PartialEq)]
pub enum Route {
    /// A label, resolved through the edge's path map when one is set,
    /// otherwise taken as a literal node name.
    Label(String),
    /// Extra work dispatched within the current superstep.
    Dispatch(Dispatch),
}

impl Route {
    /// Route a branch straight to the virtual End node.
    #[must_use]
    pub fn end() -> Self {
        Route::Label("End".to_string())
    }
}

impl From<&str> for Route {
    fn from(label: &str) -> Self {
        Route::Label(label.to_string())
    }
}

impl From<String> for Route {
    fn from(label: String) -> Self {
        Route::Label(label)
    }
}

impl From<Dispatch> for Route {
    fn from(dispatch: Dispatch) -> Self {
        Route::Dispatch(dispatch)
    }
}

/// Path function for conditional routing: evaluated with the current state
/// and the invocation config, returns the routes to follow.
pub type PathFn = Arc<dyn Fn(&StateMap, &RunConfig) -> Vec<Route> + Send + Sync + 'static>;

/// A resolved frontier contribution.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum FrontierEntry {
    Node(NodeKind),
    Dispatch(Dispatch),
}

/// Conditional edge: a path function rooted at `source`, with an optional
/// label-to-node translation map.
#[derive(Clone)]
pub struct ConditionalEdge {
    /// The node whose completion triggers evaluation.
    pub source: NodeKind,
    /// Branch identifier, unique per source.
    pub branch: String,
    /// The routing function.
    pub path: PathFn,
    /// Optional label → node-name translation; a `"default"` key supplies a
    /// fallback for unknown labels.
    pub path_map: Option<FxHashMap<String, String>>,
}

impl ConditionalEdge {
    /// Evaluate the path function and translate its routes.
    ///
    /// An unknown label with no `"default"` fallback is an `InvalidGraph`
    /// error at run time.
    pub(crate) fn resolve(
        &self,
        state: &StateMap,
        config: &RunConfig,
    ) -> Result<Vec<FrontierEntry>, GraphError> {
        let routes = (self.path)(state, config);
        let mut entries = Vec::with_capacity(routes.len());
        for route in routes {
            match route {
                Route::Dispatch(dispatch) => entries.push(FrontierEntry::Dispatch(dispatch)),
                Route::Label(label) => {
                    let name = match &self.path_map {
                        Some(map) => match map.get(&label).or_else(|| map.get("default")) {
                            Some(target) => target.clone(),
                            None => {
                                return Err(GraphError::InvalidGraph {
                                    message: format!(
                                        "conditional branch '{}' from '{}' returned unknown label '{}'",
                                        self.branch, self.source, label
                                    ),
                                })
                            }
                        },
                        None => label,
                    };
                    entries.push(FrontierEntry::Node(NodeKind::from(name.as_str())));
                }
            }
        }
        Ok(entries)
    }
}

impl std::fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("source", &self.source)
            .field("branch", &self.branch)
            .field("path_map", &self.path_map)
            .finish()
    }
}

/// Multi-source waiting edge: `target` fires exactly when every node in
/// `sources` executed in the same superstep.
#[derive(Clone, Debug, PartialEq)]
pub struct WaitingEdge {
    pub sources: Vec<NodeKind>,
    pub target: NodeKind,
}
