//! # entente-extract
//!
//! Recovers one JSON object from free-form model output.
//!
//! Models wrap JSON in code fences, double braces and marker lines, leave
//! trailing commas, single-quote keys and leak prose into the object.
//! [`extract_json`] works through that in a fixed order:
//!
//! 1. Preprocess the whole text (indented-key and known-field fixes)
//! 2. A well-formed object at the first `{` is returned as is
//! 3. For each span pattern in [`patterns::SPAN_PATTERNS`] that matches, run
//!    the parse strategies in [`strategies::PARSE_STRATEGIES`] on its span
//! 4. Only when no span parsed, auto-repair the matched spans in order
//! 5. If no pattern matched, try the outermost `{ ... }` of the original text
//! 6. Last resort: auto-repair the entire original text
//!
//! It never panics and is deterministic; total failure yields an empty map.

#![deny(unsafe_code)]

mod clean;
pub mod fields;
pub mod patterns;
mod repair;
pub mod strategies;

pub use fields::{
    GOAL_KEYS, RELATIONSHIP_KEYS, extract_goals, extract_goals_with, extract_relationships,
    extract_relationships_with,
};

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use entente_core::truncate_chars;

use crate::clean::{preprocess, strip_invisible};
use crate::patterns::{SPAN_PATTERNS, balanced_object, outer_braces};
use crate::repair::repair_object;
use crate::strategies::{parse_candidate, parse_repaired, parse_strict};

/// How much of an unparseable response to include in the error log.
const PREVIEW_CHARS: usize = 200;

/// Extract the JSON object embedded in `text`.
///
/// `label` names the response in log output (e.g. `"order_generation"`).
/// Returns an empty map when nothing could be recovered.
pub fn extract_json(text: &str, label: Option<&str>) -> Map<String, Value> {
    let label = label.unwrap_or("response");
    let prepared = preprocess(&strip_invisible(text));

    if let Some(map) = balanced_object(&prepared).and_then(parse_strict) {
        debug!(label, "extracted well-formed json");
        return map;
    }

    let spans: Vec<(&'static str, String)> = SPAN_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.capture(&prepared).map(|span| (pattern.name, span)))
        .collect();

    for (pattern, span) in &spans {
        if let Some((strategy, map)) = parse_candidate(span) {
            debug!(label, pattern, strategy, "extracted json");
            return map;
        }
        debug!(label, pattern, "span did not parse, trying next pattern");
    }

    for (pattern, span) in &spans {
        if let Some(map) = parse_repaired(span) {
            debug!(label, pattern, strategy = "repair", "extracted json");
            return map;
        }
    }

    if spans.is_empty() {
        if let Some(span) = outer_braces(text) {
            if let Some((strategy, map)) = parse_candidate(span) {
                debug!(label, strategy, "extracted json from outermost braces");
                return map;
            }
            if let Some(map) = parse_repaired(span) {
                debug!(label, strategy = "repair", "extracted json from outermost braces");
                return map;
            }
        }
    }

    if let Some(map) = repair_object(text) {
        warn!(label, "json recovered only by repairing the whole response");
        return map;
    }

    error!(
        label,
        preview = %truncate_chars(text, PREVIEW_CHARS),
        "failed to extract json from response"
    );
    Map::new()
}
