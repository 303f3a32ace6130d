//! State merge strategies.
//!
//! A [`Reducer`] is a binary pure function merging an incoming field value
//! into the current one. The executor applies the reducer declared for a
//! field at the end of each superstep; fields without a reducer get
//! last-value (replace) semantics with an at-most-one-write-per-step guard.
//!
//! Standard set: [`SumConcat`], [`Append`], [`MapMerge`], [`Replace`],
//! [`MessageMerge`].

mod message_merge;
mod ops;

pub use message_merge::MessageMerge;
pub use ops::{Append, MapMerge, Replace, SumConcat};

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

/// Binary merge function: `merge(current, incoming) -> merged`.
///
/// Implementations must be pure and must not mutate `current` beyond
/// consuming it; the executor hands in a clone of the live value.
pub trait Reducer: Send + Sync {
    /// Merge `incoming` into `current`. `current` is `None` when the field
    /// has never been written.
    fn merge(&self, current: Option<Value>, incoming: Value) -> Result<Value, ReducerError>;
}

/// Failures raised by reducers; surfaced as step-fatal errors naming the
/// offending field.
#[derive(Debug, Error, Diagnostic)]
pub enum ReducerError {
    /// The operand types cannot be merged by this reducer.
    #[error("cannot merge {incoming} into {current} with {op}")]
    #[diagnostic(
        code(graphloom::reducers::type_mismatch),
        help("Check that every node writing this field produces {op}-compatible values.")
    )]
    TypeMismatch {
        op: &'static str,
        current: &'static str,
        incoming: &'static str,
    },

    /// A numeric merge produced a value JSON cannot represent.
    #[error("numeric merge produced a non-finite value")]
    #[diagnostic(code(graphloom::reducers::non_finite))]
    NonFinite,
}

/// Human-readable JSON type name, used in mismatch diagnostics.
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
