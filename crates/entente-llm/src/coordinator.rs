//! The entry point agents use to talk to models.
//!
//! A [`Coordinator`] owns the handle pool and the serialization gate. Every
//! call resolves a handle, takes the gate if the model is local, invokes it,
//! and schedules a usage write that never blocks or fails the caller.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use entente_core::{CallIdentity, Completion, LlmCallResult, LlmError, ModelClient, TokenUsage};
use entente_extract::extract_json;
use entente_settings::EntenteSettings;
use entente_store::{Database, StoreError, UsageRepo, UsageSink};
use entente_telemetry::{CallLog, CallLogEntry};

use crate::factory::{BackendFactory, ModelFactory};
use crate::gate::SerializationGate;
use crate::pool::ModelPool;

/// Error message for a structured call whose model said nothing.
pub const EMPTY_RESPONSE: &str = "empty response";
/// Error message when no JSON object could be extracted.
pub const PARSE_FAILURE: &str = "failed to parse JSON from response";

/// Issues raw and structured model calls on behalf of agents.
///
/// Shared by every agent; each call resolves its handle through the pool
/// and, for local models, waits on the serialization gate.
pub struct Coordinator {
    pool: ModelPool,
    gate: SerializationGate,
    usage: Option<Arc<dyn UsageSink>>,
    call_log: Option<Arc<CallLog>>,
    timeout: Option<Duration>,
    tracker: TaskTracker,
}

impl Coordinator {
    /// A coordinator resolving models through `factory`.
    pub fn new(factory: Arc<dyn ModelFactory>, gate: SerializationGate) -> Self {
        Self {
            pool: ModelPool::new(factory),
            gate,
            usage: None,
            call_log: None,
            timeout: None,
            tracker: TaskTracker::new(),
        }
    }

    /// Production wiring: HTTP backends, gate and timeout from settings, and
    /// the usage ledger when enabled.
    pub fn from_settings(settings: &EntenteSettings) -> Result<Self, StoreError> {
        let mut coordinator = Self::new(
            Arc::new(BackendFactory::from_settings(settings)),
            SerializationGate::from_settings(&settings.models),
        )
        .with_timeout(Duration::from_secs(settings.request.timeout_secs));

        if settings.usage.enabled {
            let db = Database::open(Path::new(&settings.usage.db_path))?;
            coordinator = coordinator.with_usage_sink(Arc::new(UsageRepo::new(db)));
        }
        Ok(coordinator)
    }

    /// Record token usage of every completed call to `sink`.
    #[must_use]
    pub fn with_usage_sink(mut self, sink: Arc<dyn UsageSink>) -> Self {
        self.usage = Some(sink);
        self
    }

    /// Append one CSV row per structured call.
    #[must_use]
    pub fn with_call_log(mut self, log: Arc<CallLog>) -> Self {
        self.call_log = Some(log);
        self
    }

    /// Fail invocations that take longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cached model handles.
    pub fn pool(&self) -> &ModelPool {
        &self.pool
    }

    /// The gate local models wait on.
    pub fn gate(&self) -> &SerializationGate {
        &self.gate
    }

    /// Invoke `model_name` and return its raw text.
    ///
    /// Handle resolution and transport failures are returned as errors.
    pub async fn call(
        &self,
        model_name: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        identity: &CallIdentity,
    ) -> Result<String, LlmError> {
        let handle = self.pool.get(model_name)?;
        let completion = {
            let _permit = self.gate.acquire(model_name).await;
            self.invoke(handle.as_ref(), prompt, system_prompt).await?
        };
        debug!(
            model = %model_name,
            game_id = %identity.game_id,
            agent_id = %identity.agent_id,
            phase = %identity.phase,
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "model call complete"
        );
        self.schedule_usage(identity, model_name, completion.usage);
        Ok(completion.text)
    }

    async fn invoke(
        &self,
        handle: &dyn ModelClient,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Completion, LlmError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, handle.generate(prompt, system_prompt))
                .await
                .map_err(|_| LlmError::Timeout(limit))?,
            None => handle.generate(prompt, system_prompt).await,
        }
    }

    /// Invoke `model_name` and parse its output as a JSON object.
    ///
    /// Never returns an error: transport failures, empty output, unparseable
    /// output and missing `expected_fields` all become a failed result.
    /// `response_type` tags the call in logs and the call log.
    pub async fn call_structured(
        &self,
        model_name: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        identity: &CallIdentity,
        expected_fields: &[&str],
        response_type: &str,
    ) -> LlmCallResult {
        let result = match self.call(model_name, prompt, system_prompt, identity).await {
            Ok(raw) => evaluate(raw, expected_fields, response_type),
            Err(e) => {
                warn!(
                    model = %model_name,
                    agent_id = %identity.agent_id,
                    phase = %identity.phase,
                    response_type,
                    error_kind = e.error_kind(),
                    error = %e,
                    "structured call failed"
                );
                LlmCallResult::failure(format!("Error: {e}"), None, e.to_string())
            }
        };

        if !result.is_success() {
            debug!(response_type, error = %result.error_message(), "structured call unsuccessful");
        }
        self.log_call(model_name, identity, response_type, &result);
        result
    }

    fn log_call(&self, model_name: &str, identity: &CallIdentity, response_type: &str, result: &LlmCallResult) {
        if let Some(log) = &self.call_log {
            log.record(&CallLogEntry::now(
                Uuid::now_v7().to_string(),
                model_name,
                identity.game_id.as_str(),
                identity.agent_id.as_str(),
                identity.phase.as_str(),
                response_type,
                result.is_success(),
                result.raw_response(),
            ));
        }
    }

    fn schedule_usage(&self, identity: &CallIdentity, model_name: &str, usage: TokenUsage) {
        let Some(sink) = self.usage.clone() else {
            return;
        };
        let identity = identity.clone();
        let model = model_name.to_string();
        let _ = self.tracker.spawn(async move {
            let outcome =
                tokio::task::spawn_blocking(move || sink.record_usage(&identity, &model, usage)).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "failed to record usage"),
                Err(e) => warn!(error = %e, "usage recording task panicked"),
            }
        });
    }

    /// Wait for every usage write scheduled so far.
    pub async fn flush_usage(&self) {
        let pending = self.tracker.len();
        let _ = self.tracker.close();
        self.tracker.wait().await;
        let _ = self.tracker.reopen();
        if pending > 0 {
            info!(pending, "usage writes flushed");
        }
    }
}

/// Steps 2-4 of a structured call on a successful raw response.
fn evaluate(raw: String, expected_fields: &[&str], response_type: &str) -> LlmCallResult {
    if raw.trim().is_empty() {
        return LlmCallResult::failure(raw, None, EMPTY_RESPONSE);
    }

    let parsed: Map<String, Value> = extract_json(&raw, Some(response_type));
    if parsed.is_empty() {
        return LlmCallResult::failure(raw, None, PARSE_FAILURE);
    }

    let missing: Vec<&str> = expected_fields
        .iter()
        .copied()
        .filter(|field| !parsed.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        let message = format!("missing required fields: {}", missing.join(", "));
        return LlmCallResult::failure(raw, Some(parsed), message);
    }

    LlmCallResult::success(raw, parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    use crate::mock::{MockClient, MockResponse, ScriptedFactory};
    use entente_settings::GateScope;

    #[derive(Default)]
    struct RecordingSink {
        rows: Mutex<Vec<(CallIdentity, String, TokenUsage)>>,
    }

    impl UsageSink for RecordingSink {
        fn record_usage(&self, identity: &CallIdentity, model: &str, usage: TokenUsage) -> Result<(), StoreError> {
            self.rows.lock().push((identity.clone(), model.to_string(), usage));
            Ok(())
        }
    }

    struct FailingSink;

    impl UsageSink for FailingSink {
        fn record_usage(&self, _: &CallIdentity, _: &str, _: TokenUsage) -> Result<(), StoreError> {
            Err(StoreError::Database("disk full".into()))
        }
    }

    fn identity() -> CallIdentity {
        CallIdentity::new("g1", "FRANCE", "S1901M")
    }

    fn coordinator(script: Vec<MockResponse>) -> Coordinator {
        let script = Arc::new(Mutex::new(Some(script)));
        let factory = ScriptedFactory::new(move |name| {
            let steps = script.lock().take().unwrap_or_default();
            Some(MockClient::scripted(name, steps))
        });
        Coordinator::new(factory, SerializationGate::new(&["ollama/"], GateScope::Global))
    }

    #[test]
    fn evaluate_outcomes() {
        let r = evaluate("   \n".into(), &[], "t");
        assert_eq!(r.error_message(), EMPTY_RESPONSE);
        assert!(r.parsed_json().is_none());

        let r = evaluate("no json here".into(), &[], "t");
        assert_eq!(r.error_message(), PARSE_FAILURE);
        assert_eq!(r.raw_response(), "no json here");

        let r = evaluate(r#"{"reasoning": "hold"}"#.into(), &["orders", "reasoning"], "t");
        assert!(!r.is_success());
        assert!(r.error_message().contains("orders"));
        assert!(!r.error_message().contains("reasoning"));
        assert_eq!(r.field("reasoning"), Some(&json!("hold")));

        let r = evaluate(r#"```json
{"orders": ["A PAR H"]}
```"#.into(), &["orders"], "t");
        assert!(r.is_success());
        assert_eq!(r.error_message(), "");
    }

    #[test]
    fn markers_quoted_in_values_keep_the_real_fields() {
        let raw = r#"{"reasoning": "reply in JSON: {orders} only", "orders": ["A PAR H"]}"#;
        let r = evaluate(raw.into(), &["orders"], "orders");
        assert!(r.is_success());
        assert_eq!(r.field("orders"), Some(&json!(["A PAR H"])));

        let raw = r#"{"msg": "use {{x}} here", "orders": ["F BRE H"]}"#;
        let r = evaluate(raw.into(), &["orders"], "orders");
        assert_eq!(r.field("orders"), Some(&json!(["F BRE H"])));
        assert!(r.field("x").is_none());
    }

    #[tokio::test]
    async fn raw_call_returns_text_and_records_usage() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(vec![MockResponse::with_usage("hello", 12, 3)]).with_usage_sink(sink.clone());

        assert_eq!(c.call("openai/gpt-4o", "hi", None, &identity()).await.unwrap(), "hello");
        c.flush_usage().await;

        let rows = sink.rows.lock();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, identity());
        assert_eq!(rows[0].1, "openai/gpt-4o");
        assert_eq!(rows[0].2, TokenUsage::new(12, 3));
    }

    #[tokio::test]
    async fn transport_error_propagates_without_usage() {
        let sink = Arc::new(RecordingSink::default());
        let c = coordinator(vec![MockResponse::Error(LlmError::Network("reset".into()))])
            .with_usage_sink(sink.clone());
        assert!(matches!(
            c.call("openai/gpt-4o", "hi", None, &identity()).await,
            Err(LlmError::Network(_))
        ));
        c.flush_usage().await;
        assert!(sink.rows.lock().is_empty());
    }

    #[tokio::test]
    async fn usage_failure_never_reaches_caller() {
        let c = coordinator(vec![MockResponse::text("fine")]).with_usage_sink(Arc::new(FailingSink));
        assert_eq!(c.call("openai/gpt-4o", "hi", None, &identity()).await.unwrap(), "fine");
        c.flush_usage().await;
    }

    #[tokio::test]
    async fn unknown_model_propagates_from_pool() {
        let factory = ScriptedFactory::new(|_| None);
        let c = Coordinator::new(factory, SerializationGate::new(&["ollama/"], GateScope::Global));
        assert!(matches!(
            c.call("nope", "hi", None, &identity()).await,
            Err(LlmError::UnknownModel(_))
        ));
        let r = c.call_structured("nope", "hi", None, &identity(), &[], "t").await;
        assert!(!r.is_success());
        assert!(r.raw_response().starts_with("Error: "));
    }

    #[tokio::test]
    async fn structured_transport_error_becomes_failure() {
        let c = coordinator(vec![MockResponse::Error(LlmError::Server { status: 503, body: "down".into() })]);
        let r = c
            .call_structured("openai/gpt-4o", "p", None, &identity(), &["orders"], "order_generation")
            .await;
        assert!(!r.is_success());
        assert_eq!(r.raw_response(), "Error: server error 503: down");
        assert!(r.parsed_json().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_surfaces_as_error() {
        let factory = ScriptedFactory::new(|name| {
            Some(MockClient::always(name, "late").with_delay(Duration::from_secs(10)))
        });
        let c = Coordinator::new(factory, SerializationGate::new(&["ollama/"], GateScope::Global))
            .with_timeout(Duration::from_secs(1));
        let err = c.call("ollama/slow", "p", None, &identity()).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(d) if d == Duration::from_secs(1)));

        // The gate was released by the timed-out call.
        let permit = tokio::time::timeout(Duration::from_millis(10), c.gate().acquire("ollama/slow")).await;
        assert!(permit.unwrap().is_some());
    }

    #[tokio::test]
    async fn call_log_rows_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.csv");
        let log = Arc::new(CallLog::open(&path).unwrap());
        let c = coordinator(vec![MockResponse::text(r#"{"orders": []}"#), MockResponse::text("")])
            .with_call_log(log);

        let ok = c.call_structured("openai/gpt-4o", "p", None, &identity(), &["orders"], "orders").await;
        let empty = c.call_structured("openai/gpt-4o", "p", None, &identity(), &[], "diary").await;
        assert!(ok.is_success());
        assert_eq!(empty.error_message(), EMPTY_RESPONSE);

        let rows = CallLog::read_all(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].success);
        assert_eq!(rows[0].response_type, "orders");
        assert_eq!(rows[0].agent_id, "FRANCE");
        assert!(!rows[1].success);
        assert_ne!(rows[0].request_id, rows[1].request_id);
    }
}
