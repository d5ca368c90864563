//! Lookups for semantically identical fields that prompts name differently.
//!
//! Prompt templates have asked for the same data under several key names over
//! time. The priority lists below are the defaults; callers with newer
//! templates pass their own lists through the `_with` variants.

use serde_json::{Map, Value};

/// Default priority order for relationship updates.
pub const RELATIONSHIP_KEYS: &[&str] = &["updated_relationships", "relationships", "relationship_updates"];

/// Default priority order for goal lists.
pub const GOAL_KEYS: &[&str] = &["updated_goals", "goals", "goal_updates"];

/// The first relationship mapping found under the default keys.
pub fn extract_relationships(data: &Map<String, Value>) -> Option<Map<String, Value>> {
    extract_relationships_with(data, RELATIONSHIP_KEYS)
}

/// The first relationship mapping found under `keys`, in order.
///
/// A key whose value is not an object is skipped, not accepted.
pub fn extract_relationships_with<S: AsRef<str>>(
    data: &Map<String, Value>,
    keys: &[S],
) -> Option<Map<String, Value>> {
    keys.iter()
        .find_map(|key| data.get(key.as_ref()).and_then(Value::as_object))
        .cloned()
}

/// The first goal list found under the default keys.
pub fn extract_goals(data: &Map<String, Value>) -> Option<Vec<String>> {
    extract_goals_with(data, GOAL_KEYS)
}

/// The first goal list found under `keys`, in order.
///
/// Non-string entries are rendered as their JSON text.
pub fn extract_goals_with<S: AsRef<str>>(data: &Map<String, Value>, keys: &[S]) -> Option<Vec<String>> {
    let items = keys
        .iter()
        .find_map(|key| data.get(key.as_ref()).and_then(Value::as_array))?;
    Some(
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}
