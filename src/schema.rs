//! Field declarations and the state merge surface.
//!
//! A [`StateSchema`] declares the fields an invocation's state carries: each
//! [`FieldSpec`] names a field and optionally attaches a type tag
//! (advisory, never enforced at runtime), a [`Reducer`], and a default
//! value. The schema produces the initial state and owns the merge
//! operator: [`StateSchema::apply`] is the *only* surface through which the
//! executor mutates state.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use graphloom::reducers::SumConcat;
//! use graphloom::schema::{FieldSpec, StateSchema};
//! use graphloom::utils::collections::state_map;
//! use serde_json::json;
//!
//! let schema = StateSchema::builder()
//!     .field(FieldSpec::new("items").with_reducer(Arc::new(SumConcat)).with_default(json!([])))
//!     .field(FieldSpec::new("label"))
//!     .build()
//!     .unwrap();
//!
//! let mut state = schema.initial_state();
//! schema.apply(&mut state, state_map([("items", json!([1]))])).unwrap();
//! schema.apply(&mut state, state_map([("items", json!([2]))])).unwrap();
//! assert_eq!(state.get("items"), Some(&json!([1, 2])));
//! ```

use std::sync::Arc;

use rustc_hash::FxHashMap;

use serde_json::Value;

use crate::errors::GraphError;
use crate::reducers::Reducer;
use crate::state::StateMap;

/// Declaration of one state field.
#[derive(Clone)]
pub struct FieldSpec {
    /// Unique field name.
    pub name: String,
    /// Advisory type tag; recorded, never enforced.
    pub type_tag: Option<String>,
    /// Merge operator; absent means last-value semantics.
    pub reducer: Option<Arc<dyn Reducer>>,
    /// Initial value, deep-cloned into every fresh state.
    pub default: Option<Value>,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: None,
            reducer: None,
            default: None,
        }
    }

    #[must_use]
    pub fn with_type_tag(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_reducer(mut self, reducer: Arc<dyn Reducer>) -> Self {
        self.reducer = Some(reducer);
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

impl std::fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("type_tag", &self.type_tag)
            .field("has_reducer", &self.reducer.is_some())
            .field("default", &self.default)
            .finish()
    }
}

/// Declared fields of an invocation's state.
///
/// The empty schema is valid: every field written at runtime then gets
/// last-value semantics and no defaults.
#[derive(Clone, Debug, Default)]
pub struct StateSchema {
    fields: Vec<FieldSpec>,
    index: FxHashMap<String, usize>,
}

impl StateSchema {
    #[must_use]
    pub fn builder() -> StateSchemaBuilder {
        StateSchemaBuilder::default()
    }

    /// All declared fields, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up one field's declaration.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|i| &self.fields[*i])
    }

    /// The reducer declared for `name`, if any.
    #[must_use]
    pub fn reducer_for(&self, name: &str) -> Option<Arc<dyn Reducer>> {
        self.field(name).and_then(|f| f.reducer.clone())
    }

    /// Whether `name` merges through a reducer (otherwise it is last-value).
    #[must_use]
    pub fn has_reducer(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.reducer.is_some())
    }

    /// Fresh state: each declared default deep-cloned. Fields without a
    /// default are omitted so cross-invocation aliasing is impossible.
    #[must_use]
    pub fn initial_state(&self) -> StateMap {
        let mut state = StateMap::default();
        for field in &self.fields {
            if let Some(default) = &field.default {
                state.insert(field.name.clone(), default.clone());
            }
        }
        state
    }

    /// Merge `updates` into `state`: `reducer(current, incoming)` for fields
    /// with a reducer, plain replacement otherwise. Unknown keys are
    /// accepted with replacement semantics.
    ///
    /// Returns the keys whose value changed, sorted, so callers can bump
    /// channel versions deterministically.
    pub fn apply(&self, state: &mut StateMap, updates: StateMap) -> Result<Vec<String>, GraphError> {
        let mut changed = Vec::new();
        for (key, incoming) in updates {
            let current = state.get(&key).cloned();
            let next = match self.reducer_for(&key) {
                Some(reducer) => reducer
                    .merge(current.clone(), incoming)
                    .map_err(|source| GraphError::Reducer {
                        key: key.clone(),
                        source,
                    })?,
                None => incoming,
            };
            if current.as_ref() != Some(&next) {
                changed.push(key.clone());
            }
            state.insert(key, next);
        }
        changed.sort();
        Ok(changed)
    }
}

/// Fluent constructor for [`StateSchema`].
#[derive(Default)]
pub struct StateSchemaBuilder {
    fields: Vec<FieldSpec>,
}

impl StateSchemaBuilder {
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Declare a plain last-value field.
    #[must_use]
    pub fn value_field(self, name: impl Into<String>) -> Self {
        self.field(FieldSpec::new(name))
    }

    /// Declare a reduced field with a default.
    #[must_use]
    pub fn reduced_field(
        self,
        name: impl Into<String>,
        reducer: Arc<dyn Reducer>,
        default: Value,
    ) -> Self {
        self.field(
            FieldSpec::new(name)
                .with_reducer(reducer)
                .with_default(default),
        )
    }

    /// Finish the schema. Duplicate field names are a structural error.
    pub fn build(self) -> Result<StateSchema, GraphError> {
        let mut index = FxHashMap::default();
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(GraphError::InvalidGraph {
                    message: "schema field names must be non-empty".to_string(),
                });
            }
            if index.insert(field.name.clone(), i).is_some() {
                return Err(GraphError::InvalidGraph {
                    message: format!("duplicate schema field '{}'", field.name),
                });
            }
        }
        Ok(StateSchema {
            fields: self.fields,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducers::{Replace, SumConcat};
    use crate::utils::collections::state_map;
    use serde_json::json;

    #[test]
    fn initial_state_deep_clones_defaults() {
        let schema = StateSchema::builder()
            .reduced_field("items", Arc::new(SumConcat), json!([]))
            .build()
            .unwrap();
        let mut a = schema.initial_state();
        let b = schema.initial_state();
        a.get_mut("items").unwrap().as_array_mut().unwrap().push(json!(1));
        assert_eq!(b.get("items"), Some(&json!([])));
    }

    #[test]
    fn apply_uses_reducer_when_declared() {
        let schema = StateSchema::builder()
            .reduced_field("total", Arc::new(SumConcat), json!(0))
            .value_field("label")
            .build()
            .unwrap();
        let mut state = schema.initial_state();
        schema
            .apply(&mut state, state_map([("total", json!(2)), ("label", json!("x"))]))
            .unwrap();
        schema
            .apply(&mut state, state_map([("total", json!(3)), ("label", json!("y"))]))
            .unwrap();
        assert_eq!(state.get("total"), Some(&json!(5)));
        assert_eq!(state.get("label"), Some(&json!("y")));
    }

    #[test]
    fn apply_reports_changed_keys_sorted() {
        let schema = StateSchema::builder().build().unwrap();
        let mut state = state_map([("b", json!(1))]);
        let changed = schema
            .apply(&mut state, state_map([("b", json!(1)), ("a", json!(2)), ("c", json!(3))]))
            .unwrap();
        assert_eq!(changed, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn duplicate_fields_rejected() {
        let err = StateSchema::builder()
            .value_field("x")
            .field(FieldSpec::new("x").with_reducer(Arc::new(Replace)))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate schema field"));
    }
}
