//! Pieces shared by the HTTP backends.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;

use entente_core::LlmError;

/// Generation parameters sent with every request.
#[derive(Clone, Debug)]
pub struct RequestParams {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Backend default when `None`.
    pub temperature: Option<f64>,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: None,
        }
    }
}

pub(crate) fn build_http_client() -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| LlmError::Network(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn map_send_error(e: &reqwest::Error) -> LlmError {
    LlmError::Network(e.to_string())
}

/// Seconds form of `Retry-After`; HTTP-date form is ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Turn a non-2xx response into an error, preferring the API's own message.
pub(crate) async fn error_from_response(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let retry = retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    let message = api_error_message(&body).unwrap_or(body);
    match LlmError::from_status(status, message) {
        LlmError::RateLimited { .. } => LlmError::RateLimited { retry_after: retry },
        other => other,
    }
}

/// `{"error": {"message": ...}}` or `{"error": "..."}`.
fn api_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    let error = json.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

pub(crate) fn token_count(value: Option<&Value>) -> u64 {
    value.and_then(Value::as_u64).unwrap_or(0)
}
