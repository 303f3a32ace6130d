//! Control-flow values emitted by nodes to influence subsequent scheduling.
//!
//! Routing intent is kept separate from state updates: a node contributes an
//! update map and, independently, may declare successors ([`Command`]) or
//! launch extra same-step work ([`Dispatch`]). The executor aggregates these
//! in a deterministic order and reconciles them with static, conditional,
//! and waiting edges.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::StateMap;
use crate::types::NodeKind;

/// One extra invocation of a node within the current superstep.
///
/// The target runs against a deep copy of current state overlaid with
/// `arg` (when `arg` is an object). Two dispatches are equal when both the
/// target and the argument match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    /// Name of the node to invoke.
    pub target: String,
    /// State overlay applied on top of the target's snapshot.
    pub arg: Value,
}

impl Dispatch {
    #[must_use]
    pub fn new(target: impl Into<String>, arg: Value) -> Self {
        Self {
            target: target.into(),
            arg,
        }
    }
}

/// A successor named by a [`Command`]: either a node or a dispatch.
#[derive(Clone, Debug, PartialEq)]
pub enum GotoTarget {
    Node(NodeKind),
    Dispatch(Dispatch),
}

impl From<NodeKind> for GotoTarget {
    fn from(kind: NodeKind) -> Self {
        GotoTarget::Node(kind)
    }
}

impl From<&str> for GotoTarget {
    fn from(name: &str) -> Self {
        GotoTarget::Node(NodeKind::from(name))
    }
}

impl From<Dispatch> for GotoTarget {
    fn from(dispatch: Dispatch) -> Self {
        GotoTarget::Dispatch(dispatch)
    }
}

/// Node-return envelope combining a state update with successor routing.
///
/// `graph` is reserved for subgraph handoff; a non-nil value is rejected
/// with `InvalidGraph` until subgraph semantics exist.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Command {
    /// State update to contribute under this node's command bucket.
    pub update: Option<StateMap>,
    /// Successors to schedule: nodes for the next superstep, dispatches for
    /// this one.
    pub goto: Vec<GotoTarget>,
    /// Value surfaced to interrupted-and-resumed flows.
    pub resume: Option<Value>,
    /// Reserved for subgraph handoff.
    pub graph: Option<String>,
}

impl Command {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_update(mut self, update: StateMap) -> Self {
        self.update = Some(update);
        self
    }

    #[must_use]
    pub fn with_goto(mut self, target: impl Into<GotoTarget>) -> Self {
        self.goto.push(target.into());
        self
    }

    #[must_use]
    pub fn with_resume(mut self, value: Value) -> Self {
        self.resume = Some(value);
        self
    }
}

/// An orderly pause surfaced as an error after state was checkpointed.
///
/// Equality uses both the value and the id, so two interrupts carrying the
/// same payload remain distinguishable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interrupt {
    /// Payload shown to the operator (why execution paused).
    pub value: Value,
    /// Identifier; defaults to a fresh 128-bit random hex string.
    pub id: String,
}

impl Interrupt {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            value,
            id: crate::utils::ids::interrupt_id(),
        }
    }

    #[must_use]
    pub fn with_id(value: Value, id: impl Into<String>) -> Self {
        Self {
            value,
            id: id.into(),
        }
    }
}
