//! Exponential backoff for transport failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use entente_core::{Completion, LlmError, ModelClient};
use entente_settings::RetrySettings;

/// Backoff policy for transport failures.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Fraction of each delay that is randomized.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_retries: s.max_retries,
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            jitter_factor: s.jitter_factor.clamp(0.0, 1.0),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based).
    ///
    /// A server-suggested delay wins; otherwise `base * 2^attempt`, capped at
    /// `max_delay`, then spread by up to `jitter_factor` either way.
    pub fn delay_for(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        if let Some(delay) = suggested {
            return delay.min(self.max_delay);
        }
        let base = self.base_delay.as_millis() as f64;
        let capped = (base * 2f64.powi(attempt.min(31) as i32)).min(self.max_delay.as_millis() as f64);
        let jitter = capped * self.jitter_factor;
        let offset = if jitter > 0.0 {
            rand::rng().random_range(-jitter..=jitter)
        } else {
            0.0
        };
        Duration::from_millis((capped + offset).max(0.0) as u64)
    }
}

/// Retries retryable transport errors from the wrapped client.
///
/// Fatal errors (unknown model, authentication, invalid request) and
/// operational ones (timeout, malformed response) pass straight through.
pub struct RetryingClient<C> {
    inner: C,
    config: RetryConfig,
    total_retries: AtomicU64,
}

impl<C: ModelClient> RetryingClient<C> {
    /// Wrap `inner` with the `config` policy.
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            total_retries: AtomicU64::new(0),
        }
    }

    /// Retries made across every call through this client.
    pub fn total_retries(&self) -> u64 {
        self.total_retries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<C: ModelClient> ModelClient for RetryingClient<C> {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Completion, LlmError> {
        let mut attempt = 0;
        loop {
            match self.inner.generate(prompt, system_prompt).await {
                Ok(completion) => return Ok(completion),
                Err(e) if !e.is_retryable() || attempt >= self.config.max_retries => return Err(e),
                Err(e) => {
                    let delay = self.config.delay_for(attempt, e.suggested_delay());
                    let _ = self.total_retries.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        model = %self.inner.model(),
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transport error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockClient, MockResponse};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            jitter_factor: 0.0,
        }
    }

    fn server_error() -> MockResponse {
        MockResponse::Error(LlmError::Server { status: 500, body: "internal".into() })
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let mock = MockClient::scripted("m", vec![server_error(), server_error(), MockResponse::text("ok")]);
        let client = RetryingClient::new(mock, fast(3));
        assert_eq!(client.generate("p", None).await.unwrap().text, "ok");
        assert_eq!(client.total_retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_not_retried() {
        let mock = MockClient::scripted(
            "m",
            vec![
                MockResponse::Error(LlmError::Authentication("bad key".into())),
                MockResponse::text("unreachable"),
            ],
        );
        let client = RetryingClient::new(mock, fast(3));
        let err = client.generate("p", None).await.unwrap_err();
        assert!(matches!(err, LlmError::Authentication(_)));
        assert_eq!(client.total_retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let mock = MockClient::scripted("m", vec![server_error(), server_error(), server_error()]);
        let client = RetryingClient::new(mock, fast(2));
        assert!(client.generate("p", None).await.is_err());
        assert_eq!(client.total_retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_is_single_attempt() {
        let mock = MockClient::scripted("m", vec![server_error(), MockResponse::text("late")]);
        let client = RetryingClient::new(mock, fast(0));
        assert!(client.generate("p", None).await.is_err());
        assert_eq!(client.total_retries(), 0);
    }

    #[test]
    fn exponential_backoff_capped() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            jitter_factor: 0.0,
        };
        assert_eq!(config.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(config.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(config.delay_for(2, None), Duration::from_millis(400));
        assert_eq!(config.delay_for(10, None), Duration::from_millis(500));
    }

    #[test]
    fn suggested_delay_wins_but_is_capped() {
        let config = fast(1);
        assert_eq!(config.delay_for(0, Some(Duration::from_millis(30))), Duration::from_millis(30));
        assert_eq!(config.delay_for(0, Some(Duration::from_secs(60))), Duration::from_millis(50));
    }

    #[test]
    fn jitter_stays_in_range() {
        let config = RetryConfig { jitter_factor: 0.5, ..fast(1) };
        for _ in 0..100 {
            let d = config.delay_for(0, None).as_millis();
            assert!((5..=15).contains(&d), "delay {d}ms out of range");
        }
    }
}
