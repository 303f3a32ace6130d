//! Ordered sequence merge keyed by item id.

use serde_json::Value;

use super::{json_type, Reducer, ReducerError};

/// Merge ordered sequences of keyed items.
///
/// Items in `incoming` whose `"id"` matches an existing item replace that
/// item in place; items without an id, or with an unseen id, are appended in
/// incoming order. A `None`/`null` current value is treated as an empty
/// sequence. A bare object on either side is treated as a one-element
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageMerge;

impl Reducer for MessageMerge {
    fn merge(&self, current: Option<Value>, incoming: Value) -> Result<Value, ReducerError> {
        let mut merged = as_sequence(current.unwrap_or(Value::Null), "message_merge")?;
        let additions = as_sequence(incoming, "message_merge")?;

        for item in additions {
            let id = item.get("id").filter(|v| !v.is_null()).cloned();
            let existing = id.as_ref().and_then(|id| {
                merged
                    .iter()
                    .position(|entry| entry.get("id") == Some(id))
            });
            match existing {
                Some(pos) => merged[pos] = item,
                None => merged.push(item),
            }
        }
        Ok(Value::Array(merged))
    }
}

fn as_sequence(value: Value, op: &'static str) -> Result<Vec<Value>, ReducerError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        item @ Value::Object(_) => Ok(vec![item]),
        other => Err(ReducerError::TypeMismatch {
            op,
            current: json_type(&other),
            incoming: "array",
        }),
    }
}
