//! The ordered parse strategies tried on every candidate span.
//!
//! Each strategy is a pure `&str -> Option<Map>`; the first one to return a
//! mapping wins. Only JSON objects count as success.
//!
//! Repair is kept out of [`PARSE_STRATEGIES`]: it salvages almost any span
//! that opens with `{`, so it only runs once no span parsed cleanly.

use serde_json::{Map, Value};

use crate::clean::{clean_candidate, surgical_repair};
use crate::repair::repair_object;

/// A single way of turning a candidate span into a mapping.
pub type ParseStrategy = fn(&str) -> Option<Map<String, Value>>;

/// Strategies in the order they are attempted.
pub const PARSE_STRATEGIES: &[(&str, ParseStrategy)] = &[
    ("strict", parse_strict),
    ("surgical", parse_surgical),
    ("json5", parse_json5),
];

/// Run every strategy in order, returning the first mapping and the name of
/// the strategy that produced it.
pub fn parse_candidate(span: &str) -> Option<(&'static str, Map<String, Value>)> {
    PARSE_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(span).map(|map| (*name, map)))
}

fn as_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Standard JSON after the cleaning pass.
pub fn parse_strict(span: &str) -> Option<Map<String, Value>> {
    serde_json::from_str(&clean_candidate(span)).ok().and_then(as_object)
}

/// Standard JSON after prose stripping and a second cleaning pass.
pub fn parse_surgical(span: &str) -> Option<Map<String, Value>> {
    serde_json::from_str(&surgical_repair(span)).ok().and_then(as_object)
}

/// JSON5: unquoted keys, single quotes, comments, trailing commas.
pub fn parse_json5(span: &str) -> Option<Map<String, Value>> {
    let cleaned = clean_candidate(span);
    json5::from_str::<Value>(&cleaned)
        .or_else(|_| json5::from_str::<Value>(span.trim()))
        .ok()
        .and_then(as_object)
}

/// Heuristic repair of broken syntax.
pub fn parse_repaired(span: &str) -> Option<Map<String, Value>> {
    repair_object(&clean_candidate(span))
}
