//! Shared node fixtures for integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use graphloom::node::{Node, NodeContext, NodeError, NodeOutput};
use graphloom::node::node_fn;
use graphloom::state::StateMap;
use graphloom::utils::collections::state_map;
use serde_json::{json, Value};

/// Node appending `suffix` to the string field `key`.
pub fn append_text(key: &'static str, suffix: &'static str) -> impl Node + 'static {
    node_fn(move |state: StateMap| async move {
        let mut value = state
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        value.push_str(suffix);
        Ok(NodeOutput::update(state_map([(key, json!(value))])))
    })
}

/// Node writing fixed `(key, value)` pairs.
pub fn set_values(values: StateMap) -> impl Node + 'static {
    node_fn(move |_state: StateMap| {
        let values = values.clone();
        async move { Ok(NodeOutput::update(values)) }
    })
}

/// Node contributing one element to the `items` sequence.
pub fn push_item(item: i64) -> impl Node + 'static {
    node_fn(move |_state: StateMap| async move {
        Ok(NodeOutput::update(state_map([("items", json!([item]))])))
    })
}

/// Node that fails `failures` times before succeeding, counting attempts.
pub struct Flaky {
    pub attempts: Arc<AtomicU32>,
    pub failures: u32,
}

#[async_trait]
impl Node for Flaky {
    async fn run(&self, _state: StateMap, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(NodeError::Provider {
                provider: "test",
                message: format!("transient failure on attempt {attempt}"),
            });
        }
        Ok(NodeOutput::update(state_map([("ok", json!(true))])))
    }
}
