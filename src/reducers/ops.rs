//! The scalar/collection reducers: sum-concat, append, map merge, replace.

use serde_json::{Number, Value};

use super::{json_type, Reducer, ReducerError};

/// Numeric `+`, string concatenation, array concatenation.
///
/// A `None` or `null` current value is treated as absent and the incoming
/// value wins. Mixing types (e.g. a number into a string) is a
/// [`ReducerError::TypeMismatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SumConcat;

impl Reducer for SumConcat {
    fn merge(&self, current: Option<Value>, incoming: Value) -> Result<Value, ReducerError> {
        let current = match current {
            None | Some(Value::Null) => return Ok(incoming),
            Some(v) => v,
        };
        match (current, incoming) {
            (Value::Number(a), Value::Number(b)) => sum_numbers(&a, &b),
            (Value::String(mut a), Value::String(b)) => {
                a.push_str(&b);
                Ok(Value::String(a))
            }
            (Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Ok(Value::Array(a))
            }
            (cur, inc) => Err(ReducerError::TypeMismatch {
                op: "sum_concat",
                current: json_type(&cur),
                incoming: json_type(&inc),
            }),
        }
    }
}

fn sum_numbers(a: &Number, b: &Number) -> Result<Value, ReducerError> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Ok(Value::Number(sum.into()));
        }
    }
    let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
    Number::from_f64(sum)
        .map(Value::Number)
        .ok_or(ReducerError::NonFinite)
}

/// Treat both operands as sequences (wrapping scalars) and concatenate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Append;

impl Reducer for Append {
    fn merge(&self, current: Option<Value>, incoming: Value) -> Result<Value, ReducerError> {
        let mut items = to_items(current.unwrap_or(Value::Null));
        items.extend(to_items(incoming));
        Ok(Value::Array(items))
    }
}

fn to_items(value: Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Shallow merge of JSON objects; the incoming side wins on key collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapMerge;

impl Reducer for MapMerge {
    fn merge(&self, current: Option<Value>, incoming: Value) -> Result<Value, ReducerError> {
        let incoming = match incoming {
            Value::Object(map) => map,
            other => {
                return Err(ReducerError::TypeMismatch {
                    op: "map_merge",
                    current: current.as_ref().map(json_type).unwrap_or("null"),
                    incoming: json_type(&other),
                })
            }
        };
        let mut merged = match current {
            None | Some(Value::Null) => serde_json::Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(ReducerError::TypeMismatch {
                    op: "map_merge",
                    current: json_type(&other),
                    incoming: "object",
                })
            }
        };
        for (k, v) in incoming {
            merged.insert(k, v);
        }
        Ok(Value::Object(merged))
    }
}

/// Discard the current value and keep the incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Replace;

impl Reducer for Replace {
    fn merge(&self, _current: Option<Value>, incoming: Value) -> Result<Value, ReducerError> {
        Ok(incoming)
    }
}
