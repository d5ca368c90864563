//! Scripted model doubles for tests.
//!
//! [`MockClient`] replays a script of responses (then a fallback) and
//! reports into a [`ConcurrencyProbe`], which several clients may share so a
//! test can observe overlap across models. [`ScriptedFactory`] builds mock
//! handles on demand and counts constructions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use entente_core::{Completion, LlmError, ModelClient, TokenUsage};

use crate::factory::ModelFactory;

/// One pre-programmed outcome.
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Succeed with this completion.
    Completion(Completion),
    /// Fail with this error.
    Error(LlmError),
}

impl MockResponse {
    /// A completion with a fixed 10/5 token usage.
    pub fn text(text: &str) -> Self {
        Self::Completion(Completion::new(text, TokenUsage::new(10, 5)))
    }

    /// A completion with explicit token counts.
    pub fn with_usage(text: &str, input_tokens: u64, output_tokens: u64) -> Self {
        Self::Completion(Completion::new(text, TokenUsage::new(input_tokens, output_tokens)))
    }
}

/// Entry and exit instants of one invocation.
#[derive(Clone, Copy, Debug)]
pub struct CallSpan {
    /// When the invocation began.
    pub start: Instant,
    /// When the invocation finished.
    pub end: Instant,
}

/// Counts in-flight invocations and remembers the peak.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    spans: Mutex<Vec<CallSpan>>,
}

impl ConcurrencyProbe {
    /// A shareable tracker with all counters at zero.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self) -> Instant {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Instant::now()
    }

    fn exit(&self, start: Instant) {
        let _ = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.spans.lock().push(CallSpan { start, end: Instant::now() });
    }

    /// Invocations started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping invocations seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Invocations currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Completed invocations, in completion order.
    pub fn spans(&self) -> Vec<CallSpan> {
        self.spans.lock().clone()
    }
}

/// Decrements the probe even when the invocation future is dropped.
struct InFlight<'a> {
    probe: &'a ConcurrencyProbe,
    start: Instant,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.probe.exit(self.start);
    }
}

/// A model handle that replays a script, then its fallback.
pub struct MockClient {
    model: String,
    script: Mutex<VecDeque<MockResponse>>,
    fallback: Option<MockResponse>,
    delay: Duration,
    probe: Arc<ConcurrencyProbe>,
    prompts: Mutex<Vec<(String, Option<String>)>>,
}

impl MockClient {
    /// Always answers with `text`.
    pub fn always(model: &str, text: &str) -> Self {
        Self::build(model, Vec::new(), Some(MockResponse::text(text)))
    }

    /// Replays `script` in order, then fails with `InvalidRequest`.
    pub fn scripted(model: &str, script: Vec<MockResponse>) -> Self {
        Self::build(model, script, None)
    }

    fn build(model: &str, script: Vec<MockResponse>, fallback: Option<MockResponse>) -> Self {
        Self {
            model: model.to_string(),
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            probe: ConcurrencyProbe::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `response` once the script runs out.
    #[must_use]
    pub fn with_fallback(mut self, response: MockResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Sleep this long inside every invocation.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Share one tracker across clients to observe overlap between them.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// The tracker this client reports to.
    pub fn probe(&self) -> Arc<ConcurrencyProbe> {
        self.probe.clone()
    }

    /// Every `(prompt, system_prompt)` received so far.
    pub fn prompts(&self) -> Vec<(String, Option<String>)> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl ModelClient for MockClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Completion, LlmError> {
        let guard = InFlight {
            probe: &self.probe,
            start: self.probe.enter(),
        };
        self.prompts
            .lock()
            .push((prompt.to_string(), system_prompt.map(str::to_string)));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().pop_front().or_else(|| self.fallback.clone());
        drop(guard);
        match next {
            Some(MockResponse::Completion(c)) => Ok(c),
            Some(MockResponse::Error(e)) => Err(e),
            None => Err(LlmError::InvalidRequest(format!(
                "MockClient {}: no response configured",
                self.model
            ))),
        }
    }
}

type BuildFn = dyn Fn(&str) -> Option<MockClient> + Send + Sync;

/// A factory that builds mock handles from a closure.
///
/// Returning `None` from the closure surfaces as `LlmError::UnknownModel`.
pub struct ScriptedFactory {
    build: Box<BuildFn>,
    builds: AtomicUsize,
}

impl ScriptedFactory {
    /// A factory that builds handles with `build`.
    pub fn new(build: impl Fn(&str) -> Option<MockClient> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            build: Box::new(build),
            builds: AtomicUsize::new(0),
        })
    }

    /// Every model answers with `text`, all reporting into `probe`.
    pub fn always(text: &str, delay: Duration, probe: Arc<ConcurrencyProbe>) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |model| {
            Some(
                MockClient::always(model, &text)
                    .with_delay(delay)
                    .with_probe(probe.clone()),
            )
        })
    }

    /// Number of handles constructed so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ModelFactory for ScriptedFactory {
    fn create(&self, model_name: &str) -> Result<Arc<dyn ModelClient>, LlmError> {
        let _ = self.builds.fetch_add(1, Ordering::SeqCst);
        match (self.build)(model_name) {
            Some(client) => Ok(Arc::new(client)),
            None => Err(LlmError::UnknownModel(model_name.to_string())),
        }
    }
}
