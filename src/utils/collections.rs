//! Constructors for the crate's standard collection types.

use serde_json::Value;

use crate::state::StateMap;

/// Create an empty [`StateMap`] with the crate's standard hasher.
#[must_use]
pub fn new_state_map() -> StateMap {
    StateMap::default()
}

/// Build a [`StateMap`] from `(key, value)` pairs.
///
/// ```rust
/// use graphloom::utils::collections::state_map;
/// use serde_json::json;
///
/// let state = state_map([("count", json!(1)), ("label", json!("a"))]);
/// assert_eq!(state.len(), 2);
/// ```
#[must_use]
pub fn state_map<K, I>(entries: I) -> StateMap
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v))
        .collect()
}
