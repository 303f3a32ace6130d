//! Workflow graph definition and compilation.
//!
//! [`GraphBuilder`] collects nodes and edges with a fluent API;
//! [`GraphBuilder::compile`] validates the structure and produces an
//! executable [`App`](crate::app::App).

mod builder;
mod compilation;
mod edges;

pub use builder::{GraphBuilder, InterruptNodes, NodeOptions, NodeSpec};
pub use edges::{ConditionalEdge, PathFn, Route, WaitingEdge};

pub(crate) use edges::FrontierEntry;
