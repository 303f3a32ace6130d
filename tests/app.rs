mod common;

use std::sync::Arc;

use graphloom::control::{Command, Dispatch};
use graphloom::errors::GraphError;
use graphloom::graphs::{GraphBuilder, PathFn, Route};
use graphloom::node::{node_fn, NodeOutput};
use graphloom::runtimes::RunConfig;
use graphloom::schema::StateSchema;
use graphloom::reducers::SumConcat;
use graphloom::state::StateMap;
use graphloom::types::NodeKind;
use graphloom::utils::collections::state_map;
use serde_json::{json, Value};

use common::{append_text, push_item, set_values};

/// Linear chain: Start -> a -> b -> c -> End concatenates "abc".
#[tokio::test]
async fn linear_chain_concatenates_in_order() {
    let schema = StateSchema::builder().value_field("value").build().unwrap();
    let app = GraphBuilder::new()
        .add_node("a", append_text("value", "a"))
        .add_node("b", append_text("value", "b"))
        .add_node("c", append_text("value", "c"))
        .add_edge(NodeKind::Start, "a")
        .add_edge("a", "b")
        .add_edge("b", "c")
        .add_edge("c", NodeKind::End)
        .with_schema(schema)
        .compile()
        .unwrap();

    let result = app
        .invoke(Some(state_map([("value", json!(""))])), &RunConfig::new())
        .await
        .unwrap();
    assert_eq!(result.get("value"), Some(&json!("abc")));
}

/// Conditional routing picks the leaf named by the state.
#[tokio::test]
async fn conditional_routing_follows_state() {
    let path: PathFn = Arc::new(|state, _config| {
        vec![Route::from(
            state.get("route").and_then(Value::as_str).unwrap_or("left"),
        )]
    });

    let build = |path: PathFn| {
        GraphBuilder::new()
            .add_node(
                "start_node",
                node_fn(|state: StateMap| async move {
                    let route = state
                        .get("input_route")
                        .cloned()
                        .unwrap_or_else(|| json!("left"));
                    Ok(NodeOutput::update(state_map([("route", route)])))
                }),
            )
            .add_node("left", set_values(state_map([("result", json!("left"))])))
            .add_node("right", set_values(state_map([("result", json!("right"))])))
            .add_edge(NodeKind::Start, "start_node")
            .add_conditional_edges("start_node", path, None)
            .add_edge("left", NodeKind::End)
            .add_edge("right", NodeKind::End)
            .compile()
            .unwrap()
    };

    let app = build(path.clone());
    let result = app
        .invoke(
            Some(state_map([("input_route", json!("left"))])),
            &RunConfig::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.get("result"), Some(&json!("left")));

    let app = build(path);
    let result = app
        .invoke(
            Some(state_map([("input_route", json!("right"))])),
            &RunConfig::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.get("result"), Some(&json!("right")));
}

/// Reducer accumulation across supersteps: items = [1, 2].
#[tokio::test]
async fn reducer_accumulates_across_steps() {
    let schema = StateSchema::builder()
        .reduced_field("items", Arc::new(SumConcat), json!([]))
        .build()
        .unwrap();
    let app = GraphBuilder::new()
        .add_node("a", push_item(1))
        .add_node("b", push_item(2))
        .add_edge(NodeKind::Start, "a")
        .add_edge("a", "b")
        .add_edge("b", NodeKind::End)
        .with_schema(schema)
        .compile()
        .unwrap();

    let result = app.invoke(Some(StateMap::default()), &RunConfig::new()).await.unwrap();
    assert_eq!(result.get("items"), Some(&json!([1, 2])));
}

/// Map-reduce: dispatches run the worker twice within the emitting step.
#[tokio::test]
async fn dispatches_fan_out_within_the_same_step() {
    let schema = StateSchema::builder()
        .reduced_field("results", Arc::new(SumConcat), json!([]))
        .build()
        .unwrap();
    let app = GraphBuilder::new()
        .add_node(
            "fan_out",
            node_fn(|_state: StateMap| async {
                Ok(NodeOutput::Bundle(vec![
                    NodeOutput::update(state_map([("results", json!(["start"]))])),
                    NodeOutput::Dispatch(Dispatch::new("worker", json!({"task": 1}))),
                    NodeOutput::Dispatch(Dispatch::new("worker", json!({"task": 2}))),
                ]))
            }),
        )
        .add_node(
            "worker",
            node_fn(|state: StateMap| async move {
                // The dispatch overlay must be visible to the worker.
                assert!(state.get("task").is_some());
                Ok(NodeOutput::update(state_map([("results", json!(["worked"]))])))
            }),
        )
        .add_edge(NodeKind::Start, "fan_out")
        .add_edge("fan_out", NodeKind::End)
        .add_edge("worker", NodeKind::End)
        .with_schema(schema)
        .compile()
        .unwrap();

    let result = app.invoke(Some(StateMap::default()), &RunConfig::new()).await.unwrap();
    assert_eq!(
        result.get("results"),
        Some(&json!(["start", "worked", "worked"]))
    );
}

/// The recursion guard fires before executing the step at the limit.
#[tokio::test]
async fn recursion_limit_stops_loops() {
    let path: PathFn = Arc::new(|_state, _config| vec![Route::from("loop_node")]);
    let app = GraphBuilder::new()
        .add_node(
            "loop_node",
            node_fn(|state: StateMap| async move {
                let count = state.get("count").and_then(Value::as_i64).unwrap_or(0);
                Ok(NodeOutput::update(state_map([("count", json!(count + 1))])))
            }),
        )
        .add_edge(NodeKind::Start, "loop_node")
        .add_conditional_edges("loop_node", path, None)
        .compile()
        .unwrap();

    let config = RunConfig::new().with_recursion_limit(3);
    let err = app
        .invoke(Some(StateMap::default()), &config)
        .await
        .unwrap_err();
    match err {
        GraphError::Recursion { limit } => assert_eq!(limit, 3),
        other => panic!("expected Recursion, got {other}"),
    }
    assert!(err.to_string().contains('3'));
}

/// A conditional branch routing to End terminates that branch.
#[tokio::test]
async fn conditional_end_route_terminates() {
    let path: PathFn = Arc::new(|state, _config| {
        if state.get("done").is_some() {
            vec![Route::end()]
        } else {
            vec![Route::from("step")]
        }
    });
    let app = GraphBuilder::new()
        .add_node("step", set_values(state_map([("done", json!(true))])))
        .add_edge(NodeKind::Start, "step")
        .add_conditional_edges("step", path, None)
        .compile()
        .unwrap();

    let result = app.invoke(Some(StateMap::default()), &RunConfig::new()).await.unwrap();
    assert_eq!(result.get("done"), Some(&json!(true)));
}

/// Labels resolve through the path map, falling back to `default`.
#[tokio::test]
async fn path_map_translates_labels_with_default_fallback() {
    let path: PathFn = Arc::new(|state, _config| {
        vec![Route::from(
            state.get("label").and_then(Value::as_str).unwrap_or("?"),
        )]
    });
    let path_map: rustc_hash::FxHashMap<String, String> = [
        ("good".to_string(), "target".to_string()),
        ("default".to_string(), "fallback".to_string()),
    ]
    .into_iter()
    .collect();

    let app = GraphBuilder::new()
        .add_node("router", set_values(StateMap::default()))
        .add_node("target", set_values(state_map([("hit", json!("target"))])))
        .add_node("fallback", set_values(state_map([("hit", json!("fallback"))])))
        .add_edge(NodeKind::Start, "router")
        .add_conditional_edges("router", path, Some(path_map))
        .add_edge("target", NodeKind::End)
        .add_edge("fallback", NodeKind::End)
        .compile()
        .unwrap();

    let result = app
        .invoke(Some(state_map([("label", json!("good"))])), &RunConfig::new())
        .await
        .unwrap();
    assert_eq!(result.get("hit"), Some(&json!("target")));

    let result = app
        .invoke(
            Some(state_map([("label", json!("unmapped"))])),
            &RunConfig::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.get("hit"), Some(&json!("fallback")));
}

/// An unknown label with no default is a runtime structural error.
#[tokio::test]
async fn unknown_label_without_default_fails() {
    let path: PathFn = Arc::new(|_state, _config| vec![Route::from("mystery")]);
    let path_map: rustc_hash::FxHashMap<String, String> =
        [("known".to_string(), "router".to_string())].into_iter().collect();
    let app = GraphBuilder::new()
        .add_node("router", set_values(StateMap::default()))
        .add_edge(NodeKind::Start, "router")
        .add_conditional_edges("router", path, Some(path_map))
        .compile()
        .unwrap();

    let err = app
        .invoke(Some(StateMap::default()), &RunConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidGraph { ref message } if message.contains("mystery")));
}

/// A waiting edge fires only when every source ran in the same step.
#[tokio::test]
async fn waiting_edge_joins_parallel_branches() {
    let app = GraphBuilder::new()
        .add_node("a", set_values(state_map([("a_done", json!(true))])))
        .add_node("b", set_values(state_map([("b_done", json!(true))])))
        .add_node(
            "join",
            node_fn(|state: StateMap| async move {
                assert!(state.get("a_done").is_some() && state.get("b_done").is_some());
                Ok(NodeOutput::update(state_map([("joined", json!(true))])))
            }),
        )
        .add_edge(NodeKind::Start, "a")
        .add_edge(NodeKind::Start, "b")
        .add_waiting_edge(["a", "b"], "join")
        .add_edge("join", NodeKind::End)
        .compile()
        .unwrap();

    let result = app.invoke(Some(StateMap::default()), &RunConfig::new()).await.unwrap();
    assert_eq!(result.get("joined"), Some(&json!(true)));
}

/// A waiting edge stays cold when only part of its sources ran.
#[tokio::test]
async fn waiting_edge_does_not_fire_partially() {
    let app = GraphBuilder::new()
        .add_node("a", set_values(state_map([("a_done", json!(true))])))
        .add_node("b", set_values(state_map([("b_done", json!(true))])))
        .add_node("join", set_values(state_map([("joined", json!(true))])))
        .add_edge(NodeKind::Start, "a")
        .add_waiting_edge(["a", "b"], "join")
        .add_edge("join", NodeKind::End)
        .compile()
        .unwrap();

    let result = app.invoke(Some(StateMap::default()), &RunConfig::new()).await.unwrap();
    assert_eq!(result.get("a_done"), Some(&json!(true)));
    assert!(result.get("joined").is_none());
}

/// Commands contribute updates and declare successors simultaneously.
#[tokio::test]
async fn command_updates_and_routes() {
    let app = GraphBuilder::new()
        .add_node(
            "decide",
            node_fn(|_state: StateMap| async {
                Ok(NodeOutput::Command(
                    Command::new()
                        .with_update(state_map([("flag", json!(1))]))
                        .with_goto("finish"),
                ))
            }),
        )
        .add_node("finish", set_values(state_map([("done", json!(true))])))
        .add_edge(NodeKind::Start, "decide")
        .add_edge("decide", NodeKind::End)
        .add_edge("finish", NodeKind::End)
        .compile()
        .unwrap();

    let result = app.invoke(Some(StateMap::default()), &RunConfig::new()).await.unwrap();
    assert_eq!(result.get("flag"), Some(&json!(1)));
    assert_eq!(result.get("done"), Some(&json!(true)));
}

/// A command carrying a subgraph is rejected: the field is reserved.
#[tokio::test]
async fn command_subgraph_is_reserved() {
    let app = GraphBuilder::new()
        .add_node(
            "decide",
            node_fn(|_state: StateMap| async {
                let mut command = Command::new();
                command.graph = Some("sub".to_string());
                Ok(NodeOutput::Command(command))
            }),
        )
        .add_edge(NodeKind::Start, "decide")
        .add_edge("decide", NodeKind::End)
        .compile()
        .unwrap();

    let err = app
        .invoke(Some(StateMap::default()), &RunConfig::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::InvalidGraph { ref message } if message.contains("subgraph")));
}

/// Two last-value writers in one step fail fast, naming the field.
#[tokio::test]
async fn double_write_on_last_value_field_fails() {
    let app = GraphBuilder::new()
        .add_node("x", set_values(state_map([("field", json!("from_x"))])))
        .add_node("y", set_values(state_map([("field", json!("from_y"))])))
        .add_edge(NodeKind::Start, "x")
        .add_edge(NodeKind::Start, "y")
        .add_edge("x", NodeKind::End)
        .add_edge("y", NodeKind::End)
        .compile()
        .unwrap();

    let err = app
        .invoke(Some(StateMap::default()), &RunConfig::new())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "At key 'field': Can receive only one value per step."
    );
}

/// Snapshot isolation: in-place mutation by one node is invisible to its
/// peer and to later steps unless returned as an update.
#[tokio::test]
async fn snapshot_mutation_is_not_observable() {
    let app = GraphBuilder::new()
        .add_node(
            "mutator",
            node_fn(|mut state: StateMap| async move {
                state.insert("sneaky".to_string(), json!(true));
                Ok(NodeOutput::empty())
            }),
        )
        .add_node(
            "peer",
            node_fn(|state: StateMap| async move {
                Ok(NodeOutput::update(state_map([(
                    "peer_saw_sneaky",
                    json!(state.contains_key("sneaky")),
                )])))
            }),
        )
        .add_edge(NodeKind::Start, "mutator")
        .add_edge(NodeKind::Start, "peer")
        .add_edge("mutator", NodeKind::End)
        .add_edge("peer", NodeKind::End)
        .compile()
        .unwrap();

    let result = app.invoke(Some(StateMap::default()), &RunConfig::new()).await.unwrap();
    assert_eq!(result.get("peer_saw_sneaky"), Some(&json!(false)));
    assert!(result.get("sneaky").is_none());
}

/// Invoking with no input and no checkpoint to resume is an error.
#[tokio::test]
async fn missing_input_without_checkpoint_fails() {
    let app = GraphBuilder::new()
        .add_node("a", set_values(StateMap::default()))
        .set_entry_point("a")
        .set_finish_point("a")
        .compile()
        .unwrap();

    let err = app.invoke(None, &RunConfig::new()).await.unwrap_err();
    assert!(matches!(err, GraphError::EmptyInput));
}
