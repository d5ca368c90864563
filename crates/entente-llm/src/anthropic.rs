//! Anthropic Messages API (`POST {base}/v1/messages`).

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use tracing::debug;

use entente_core::{Completion, LlmError, ModelClient, TokenUsage};

use crate::http::{RequestParams, build_http_client, error_from_response, map_send_error, token_count};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    name: String,
    api_model: String,
    base_url: String,
    api_key: String,
    params: RequestParams,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// A client for `api_model` at `base_url`, authenticated with `api_key`.
    pub fn new(
        name: impl Into<String>,
        api_model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        params: RequestParams,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            name: name.into(),
            api_model: api_model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            params,
            client: build_http_client()?,
        })
    }

    fn build_body(&self, prompt: &str, system_prompt: Option<&str>) -> Value {
        let mut body = json!({
            "model": self.api_model,
            "max_tokens": self.params.max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });
        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            body["system"] = json!(system);
        }
        if let Some(t) = self.params.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

/// Concatenated text blocks plus token counts.
fn parse_message(body: &Value) -> Result<Completion, LlmError> {
    let blocks = body
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::InvalidResponse("response has no content array".into()))?;

    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();

    let usage = body.get("usage");
    Ok(Completion::new(
        text,
        TokenUsage::new(
            token_count(usage.and_then(|u| u.get("input_tokens"))),
            token_count(usage.and_then(|u| u.get("output_tokens"))),
        ),
    ))
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn model(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Completion, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = %self.name, prompt_chars = prompt.len(), "sending anthropic message");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_body(prompt, system_prompt))
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("malformed JSON body: {e}")))?;
        parse_message(&body)
    }
}
