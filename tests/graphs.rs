mod common;

use std::sync::Arc;

use graphloom::errors::GraphError;
use graphloom::graphs::{GraphBuilder, PathFn, Route};
use graphloom::node::{node_fn, Node, NodeOutput};
use graphloom::state::StateMap;
use graphloom::types::NodeKind;
use graphloom::utils::collections::state_map;
use serde_json::json;

use common::set_values;

fn noop() -> impl Node + 'static {
    node_fn(|_state: StateMap| async { Ok(NodeOutput::empty()) })
}

fn assert_invalid(result: Result<graphloom::app::App, GraphError>, needle: &str) {
    match result {
        Err(GraphError::InvalidGraph { message }) => {
            assert!(
                message.contains(needle),
                "expected message containing '{needle}', got '{message}'"
            );
        }
        Err(other) => panic!("expected InvalidGraph, got {other}"),
        Ok(_) => panic!("expected InvalidGraph, graph compiled"),
    }
}

#[test]
fn compile_requires_an_entry_point() {
    let result = GraphBuilder::new()
        .add_node("a", noop())
        .set_finish_point("a")
        .compile();
    assert_invalid(result, "no entry point");
}

#[test]
fn compile_rejects_unknown_edge_endpoints() {
    let result = GraphBuilder::new()
        .add_node("a", noop())
        .set_entry_point("a")
        .add_edge("a", "ghost")
        .compile();
    assert_invalid(result, "ghost");
}

#[test]
fn compile_rejects_end_as_source_and_start_as_target() {
    let result = GraphBuilder::new()
        .add_node("a", noop())
        .set_entry_point("a")
        .set_finish_point("a")
        .add_edge(NodeKind::End, "a")
        .compile();
    assert_invalid(result, "'End' cannot be the source");

    let result = GraphBuilder::new()
        .add_node("a", noop())
        .set_entry_point("a")
        .add_edge("a", NodeKind::Start)
        .compile();
    assert_invalid(result, "'Start' cannot be the target");
}

#[test]
fn compile_rejects_dead_end_nodes() {
    let result = GraphBuilder::new()
        .add_node("a", noop())
        .add_node("stranded", noop())
        .set_entry_point("a")
        .set_finish_point("a")
        .add_edge(NodeKind::Start, "stranded")
        .compile();
    assert_invalid(result, "stranded");
}

#[test]
fn waiting_edge_membership_counts_as_an_outbound() {
    let app = GraphBuilder::new()
        .add_node("a", noop())
        .add_node("b", noop())
        .add_node("join", noop())
        .add_edge(NodeKind::Start, "a")
        .add_edge(NodeKind::Start, "b")
        .add_waiting_edge(["a", "b"], "join")
        .set_finish_point("join")
        .compile()
        .unwrap();
    assert_eq!(app.waiting_edges().len(), 1);
}

#[test]
fn compile_rejects_duplicate_node_names() {
    let result = GraphBuilder::new()
        .add_node("a", noop())
        .add_node("a", noop())
        .set_entry_point("a")
        .set_finish_point("a")
        .compile();
    assert_invalid(result, "duplicate node 'a'");
}

#[test]
fn compile_rejects_sentinel_node_names() {
    let result = GraphBuilder::new()
        .add_node("End", noop())
        .set_entry_point("End")
        .set_finish_point("End")
        .compile();
    assert_invalid(result, "reserved sentinel");
}

#[test]
fn compile_rejects_empty_node_names() {
    let result = GraphBuilder::new()
        .add_node("", noop())
        .set_entry_point("")
        .set_finish_point("")
        .compile();
    assert_invalid(result, "non-empty");
}

#[test]
fn compile_rejects_waiting_edge_with_virtual_sources() {
    let result = GraphBuilder::new()
        .add_node("a", noop())
        .set_entry_point("a")
        .set_finish_point("a")
        .add_waiting_edge([NodeKind::Start], "a")
        .compile();
    assert_invalid(result, "must be a registered node");
}

#[test]
fn conditional_edge_counts_as_entry_point() {
    let path: PathFn = Arc::new(|_state, _config| vec![Route::from("a")]);
    let app = GraphBuilder::new()
        .add_node("a", noop())
        .set_conditional_entry_point(path, None)
        .set_finish_point("a")
        .compile()
        .unwrap();
    assert_eq!(app.get_graph().conditional_sources, vec!["Start".to_string()]);
}

#[test]
fn add_sequence_chains_static_edges() {
    let steps: Vec<(String, Arc<dyn Node>)> = vec![
        ("one".to_string(), Arc::new(set_values(state_map([("a", json!(1))])))),
        ("two".to_string(), Arc::new(set_values(state_map([("b", json!(2))])))),
        ("three".to_string(), Arc::new(set_values(state_map([("c", json!(3))])))),
    ];
    let app = GraphBuilder::new()
        .add_sequence(steps)
        .set_entry_point("one")
        .set_finish_point("three")
        .compile()
        .unwrap();

    let graph = app.get_graph();
    assert_eq!(graph.nodes, vec!["one", "two", "three"]);
    assert!(graph.edges.contains(&("one".to_string(), "two".to_string())));
    assert!(graph.edges.contains(&("two".to_string(), "three".to_string())));
}

#[test]
fn get_graph_describes_topology() {
    let path: PathFn = Arc::new(|_state, _config| vec![Route::end()]);
    let app = GraphBuilder::new()
        .add_node("a", noop())
        .add_node("b", noop())
        .set_entry_point("a")
        .add_edge("a", "b")
        .add_conditional_edges("b", path, None)
        .compile()
        .unwrap();

    let graph = app.get_graph();
    assert_eq!(graph.nodes, vec!["a", "b"]);
    assert_eq!(
        graph.edges,
        vec![
            ("Start".to_string(), "a".to_string()),
            ("a".to_string(), "b".to_string()),
        ]
    );
    assert_eq!(graph.conditional_sources, vec!["b".to_string()]);
    assert!(graph.waiting_edges.is_empty());
}

#[test]
fn builder_counts_nodes_and_edges() {
    let builder = GraphBuilder::new()
        .add_node("a", noop())
        .add_node("b", noop())
        .add_edge(NodeKind::Start, "a")
        .add_edge("a", "b")
        .add_edge("b", NodeKind::End);
    assert_eq!(builder.node_count(), 2);
    assert_eq!(builder.edge_count(), 3);
}
