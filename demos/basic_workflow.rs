//! Demo: a small research-triage workflow.
//!
//! Shows the core building blocks end to end:
//! - schema with a reduced field (`notes` accumulates across steps)
//! - static and conditional edges
//! - dispatch fan-out within one superstep
//!
//! Run with `cargo run --example basic_workflow`.

use std::sync::Arc;

use graphloom::errors::GraphError;
use graphloom::control::Dispatch;
use graphloom::graphs::{GraphBuilder, PathFn, Route};
use graphloom::node::{node_fn, NodeOutput};
use graphloom::reducers::SumConcat;
use graphloom::runtimes::RunConfig;
use graphloom::schema::StateSchema;
use graphloom::state::StateMap;
use graphloom::telemetry;
use graphloom::types::NodeKind;
use graphloom::utils::collections::state_map;
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), GraphError> {
    telemetry::init_tracing();

    let schema = StateSchema::builder()
        .reduced_field("notes", Arc::new(SumConcat), json!([]))
        .value_field("verdict")
        .build()?;

    let triage: PathFn = Arc::new(|state, _config| {
        let urgent = state
            .get("priority")
            .and_then(Value::as_str)
            .is_some_and(|p| p == "high");
        if urgent {
            vec![Route::from("escalate")]
        } else {
            vec![Route::from("archive")]
        }
    });

    let app = GraphBuilder::new()
        .add_node(
            "classify",
            node_fn(|state: StateMap| async move {
                let subject = state
                    .get("subject")
                    .and_then(Value::as_str)
                    .unwrap_or("(none)")
                    .to_string();
                let priority = if subject.contains("outage") { "high" } else { "low" };
                Ok(NodeOutput::Bundle(vec![
                    NodeOutput::update(state_map([
                        ("priority", json!(priority)),
                        ("notes", json!([format!("classified as {priority}")])),
                    ])),
                    // Enrich in parallel within the same superstep.
                    NodeOutput::Dispatch(Dispatch::new("enrich", json!({"source": "crm"}))),
                    NodeOutput::Dispatch(Dispatch::new("enrich", json!({"source": "logs"}))),
                ]))
            }),
        )
        .add_node(
            "enrich",
            node_fn(|state: StateMap| async move {
                let source = state.get("source").and_then(Value::as_str).unwrap_or("?");
                Ok(NodeOutput::update(state_map([(
                    "notes",
                    json!([format!("enriched from {source}")]),
                )])))
            }),
        )
        .add_node(
            "escalate",
            node_fn(|_state: StateMap| async {
                Ok(NodeOutput::update(state_map([(
                    "verdict",
                    json!("paged on-call"),
                )])))
            }),
        )
        .add_node(
            "archive",
            node_fn(|_state: StateMap| async {
                Ok(NodeOutput::update(state_map([("verdict", json!("filed"))])))
            }),
        )
        .add_edge(NodeKind::Start, "classify")
        .add_conditional_edges("classify", triage, None)
        .add_edge("enrich", NodeKind::End)
        .add_edge("escalate", NodeKind::End)
        .add_edge("archive", NodeKind::End)
        .with_schema(schema)
        .compile()?;

    let result = app
        .invoke(
            Some(state_map([("subject", json!("database outage in eu-west"))])),
            &RunConfig::new(),
        )
        .await?;

    println!("verdict: {}", result.get("verdict").unwrap_or(&Value::Null));
    println!("notes:   {}", result.get("notes").unwrap_or(&Value::Null));
    Ok(())
}
