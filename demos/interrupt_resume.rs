//! Demo: human-in-the-loop pause and resume with checkpointing.
//!
//! A two-stage workflow pauses before the `apply` node, an operator patches
//! the thread state out of band, and the run resumes from the checkpoint.
//!
//! Run with `cargo run --example interrupt_resume`.

use std::sync::Arc;

use graphloom::errors::GraphError;
use graphloom::graphs::GraphBuilder;
use graphloom::node::{node_fn, NodeOutput};
use graphloom::runtimes::{InMemorySaver, RunConfig, StreamMode};
use graphloom::state::StateMap;
use graphloom::telemetry;
use graphloom::types::NodeKind;
use graphloom::utils::collections::state_map;
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), GraphError> {
    telemetry::init_tracing();

    let saver = Arc::new(InMemorySaver::new());
    let app = GraphBuilder::new()
        .add_node(
            "plan",
            node_fn(|state: StateMap| async move {
                let target = state
                    .get("target")
                    .and_then(Value::as_str)
                    .unwrap_or("staging")
                    .to_string();
                Ok(NodeOutput::update(state_map([(
                    "plan",
                    json!(format!("deploy to {target}")),
                )])))
            }),
        )
        .add_node(
            "apply",
            node_fn(|state: StateMap| async move {
                let approved = state
                    .get("approved")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(NodeOutput::update(state_map([(
                    "result",
                    json!(if approved { "applied" } else { "dry-run only" }),
                )])))
            }),
        )
        .add_edge(NodeKind::Start, "plan")
        .add_edge("plan", "apply")
        .add_edge("apply", NodeKind::End)
        .with_checkpointer(saver)
        .with_interrupt_before(["apply"])
        .compile()?;

    let config = RunConfig::new().with_thread_id("deploy-42");

    // First run pauses before `apply`.
    match app
        .invoke(Some(state_map([("target", json!("production"))])), &config)
        .await
    {
        Err(GraphError::Interrupted { interrupts }) => {
            println!("paused: {}", interrupts[0].value);
        }
        other => {
            println!("unexpected: {other:?}");
            return Ok(());
        }
    }

    // Inspect the paused thread, then approve out of band.
    if let Some(snapshot) = app.get_state(&config).await? {
        println!("pending next: {:?}", snapshot.next);
        println!("plan so far:  {}", snapshot.values.get("plan").unwrap_or(&Value::Null));
    }
    app.update_state(&config, state_map([("approved", json!(true))]), None)
        .await?;

    // Resume with no input, streaming per-step values.
    let mut stream = app.stream(None, &config, StreamMode::Values);
    while let Some(event) = stream.next().await {
        println!("event: {}", serde_json::to_string(&event).unwrap_or_default());
    }

    let final_state = app.get_state(&config).await?.expect("final snapshot");
    println!("result: {}", final_state.values.get("result").unwrap_or(&Value::Null));
    Ok(())
}
