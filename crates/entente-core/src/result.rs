//! The non-throwing outcome of a structured call.

use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of a structured (JSON-expecting) model call.
///
/// Built once per call and never mutated. `raw_response` is always kept so
/// callers can log what the model actually said, even when parsing failed.
/// When `success` is true, `parsed_json` is present.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LlmCallResult {
    raw_response: String,
    parsed_json: Option<Map<String, Value>>,
    success: bool,
    error_message: String,
}

impl LlmCallResult {
    /// A fully successful call.
    pub fn success(raw_response: impl Into<String>, parsed_json: Map<String, Value>) -> Self {
        Self {
            raw_response: raw_response.into(),
            parsed_json: Some(parsed_json),
            success: true,
            error_message: String::new(),
        }
    }

    /// A failed call, optionally carrying whatever partial data was recovered.
    pub fn failure(
        raw_response: impl Into<String>,
        parsed_json: Option<Map<String, Value>>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            parsed_json,
            success: false,
            error_message: error_message.into(),
        }
    }

    /// What the model said, verbatim.
    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }

    /// The extracted object; present whenever the call succeeded.
    pub fn parsed_json(&self) -> Option<&Map<String, Value>> {
        self.parsed_json.as_ref()
    }

    /// Whether a JSON object was extracted.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Empty on success.
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Look up one field of the parsed mapping, regardless of overall success.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.parsed_json.as_ref().and_then(|m| m.get(key))
    }

    /// Consume the result, yielding the parsed mapping if any.
    pub fn into_parsed(self) -> Option<Map<String, Value>> {
        self.parsed_json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn success_has_empty_error() {
        let r = LlmCallResult::success("{}", map(json!({"orders": []})));
        assert!(r.is_success());
        assert!(r.error_message().is_empty());
        assert!(r.field("orders").is_some());
    }

    #[test]
    fn failure_keeps_partial_data() {
        let r = LlmCallResult::failure(
            "{\"reasoning\": \"x\"}",
            Some(map(json!({"reasoning": "x"}))),
            "missing expected fields: orders",
        );
        assert!(!r.is_success());
        assert_eq!(r.field("reasoning"), Some(&json!("x")));
        assert_eq!(r.raw_response(), "{\"reasoning\": \"x\"}");
    }

    #[test]
    fn serializes_for_cli_output() {
        let r = LlmCallResult::failure("", None, "empty response");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["parsed_json"], Value::Null);
        assert_eq!(v["error_message"], "empty response");
    }
}
