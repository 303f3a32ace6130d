//! # Graphloom: a stateful graph workflow engine
//!
//! Graphloom runs a directed graph of async nodes under a bulk-synchronous
//! (superstep) discipline: each step, the frontier of active nodes reads a
//! frozen snapshot of shared state, their outputs merge atomically through
//! per-field reducers, and the next frontier is planned from static,
//! conditional, waiting, and dynamic (dispatch/command) edges.
//!
//! ## Core concepts
//!
//! - **Nodes** ([`node::Node`]): async units of work over state snapshots
//! - **Schema** ([`schema::StateSchema`]): declared fields with reducers and
//!   defaults; the only merge surface
//! - **Channels** ([`channels`]): per-field storage disciplines and their
//!   checkpoint format
//! - **Graph** ([`graphs::GraphBuilder`]): declarative topology, validated
//!   at compile time
//! - **Runtime** ([`runtimes`]): thread-keyed checkpointing, interrupts,
//!   retry policies, streaming
//!
//! ## Quick start
//!
//! ```rust
//! use graphloom::graphs::GraphBuilder;
//! use graphloom::node::{node_fn, NodeOutput};
//! use graphloom::runtimes::RunConfig;
//! use graphloom::utils::collections::state_map;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), graphloom::errors::GraphError> {
//! let app = GraphBuilder::new()
//!     .add_node("greet", node_fn(|state| async move {
//!         let name = state
//!             .get("name")
//!             .and_then(|v| v.as_str())
//!             .unwrap_or("world")
//!             .to_string();
//!         Ok(NodeOutput::update(state_map([
//!             ("greeting", json!(format!("hello {name}"))),
//!         ])))
//!     }))
//!     .set_entry_point("greet")
//!     .set_finish_point("greet")
//!     .compile()?;
//!
//! let result = app
//!     .invoke(Some(state_map([("name", json!("graph"))])), &RunConfig::new())
//!     .await?;
//! assert_eq!(result.get("greeting"), Some(&json!("hello graph")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Checkpointing and resume
//!
//! Bind a [`runtimes::CheckpointStore`] at build time and pass a config with
//! a `thread_id`; every superstep is then persisted. An interrupted run
//! (`with_interrupt_before` / `with_interrupt_after`, or a node raising
//! [`node::NodeError::Interrupted`]) checkpoints before surfacing
//! [`errors::GraphError::Interrupted`]; resume by invoking again with `None`
//! input and the same config.

pub mod app;
pub mod channels;
pub mod control;
pub mod errors;
pub mod graphs;
pub mod node;
pub mod reducers;
pub mod runtimes;
pub mod schema;
pub mod state;
pub mod telemetry;
pub mod types;
pub mod utils;
