//! Core identifier types for workflow graphs.
//!
//! [`NodeKind`] names every vertex in a graph. The two virtual sentinels
//! `Start` and `End` frame execution: edges out of `Start` define the entry
//! frontier, routing into `End` terminates a branch. Neither sentinel may be
//! registered as a user node.
//!
//! # Examples
//!
//! ```rust
//! use graphloom::types::NodeKind;
//!
//! let start = NodeKind::Start;
//! let worker = NodeKind::Custom("worker".to_string());
//!
//! // Persistence round-trip
//! assert_eq!(NodeKind::decode(&worker.encode()), worker);
//! assert!(start.is_start());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a node within a workflow graph.
///
/// `Start` and `End` are virtual: they are never executed and never stored in
/// the node registry. They exist purely for topology, so that `Start -> a`
/// declares an entry point and `a -> End` declares an exit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Virtual source node; the first edge of every graph starts here.
    Start,
    /// Virtual sink node; routing here completes a workflow branch.
    End,
    /// User-defined node identified by a unique name.
    Custom(String),
}

impl NodeKind {
    /// Encode into the persisted string form.
    ///
    /// - `Start` → `"Start"`
    /// - `End` → `"End"`
    /// - `Custom("x")` → `"Custom:x"`
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeKind::Start => "Start".to_string(),
            NodeKind::End => "End".to_string(),
            NodeKind::Custom(s) => format!("Custom:{s}"),
        }
    }

    /// Decode a persisted string form back into a `NodeKind`.
    ///
    /// Unrecognized formats fall back to `Custom(s)` so older persisted
    /// frontiers keep round-tripping.
    pub fn decode(s: &str) -> Self {
        if s == "Start" {
            NodeKind::Start
        } else if s == "End" {
            NodeKind::End
        } else if let Some(rest) = s.strip_prefix("Custom:") {
            NodeKind::Custom(rest.to_string())
        } else {
            NodeKind::Custom(s.to_string())
        }
    }

    /// Returns `true` if this is the virtual [`Start`](Self::Start) node.
    #[must_use]
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    /// Returns `true` if this is the virtual [`End`](Self::End) node.
    #[must_use]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Returns the user-facing name: the custom name, or the sentinel label.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Start => "Start",
            Self::End => "End",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Developer experience: allow string literals wherever a NodeKind is expected.
impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "Start" => NodeKind::Start,
            "End" => NodeKind::End,
            other => NodeKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        NodeKind::from(s.as_str())
    }
}
