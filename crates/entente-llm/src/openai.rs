//! OpenAI-compatible chat completions (`POST {base}/chat/completions`).
//!
//! Serves OpenAI itself plus OpenRouter, Together, DeepSeek, Ollama and the
//! llama.cpp server, which all speak the same request shape.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};
use tracing::debug;

use entente_core::{Completion, LlmError, ModelClient, TokenUsage};

use crate::http::{RequestParams, build_http_client, error_from_response, map_send_error, token_count};

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiCompatClient {
    /// The identifier the caller used, e.g. `ollama/llama3.1`.
    name: String,
    /// The identifier the API expects, e.g. `llama3.1`.
    api_model: String,
    base_url: String,
    api_key: Option<String>,
    params: RequestParams,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// A client for `api_model` at `base_url`; local servers need no key.
    pub fn new(
        name: impl Into<String>,
        api_model: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        params: RequestParams,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            name: name.into(),
            api_model: api_model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            params,
            client: build_http_client()?,
        })
    }

    fn build_body(&self, prompt: &str, system_prompt: Option<&str>) -> Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let mut body = json!({
            "model": self.api_model,
            "messages": messages,
            "max_tokens": self.params.max_tokens,
        });
        if let Some(t) = self.params.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

/// Text and token counts from a chat completions response body.
fn parse_completion(body: &Value) -> Result<Completion, LlmError> {
    let message = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| LlmError::InvalidResponse("response has no choices".into()))?;

    // A null content (e.g. a refusal) is treated as an empty answer.
    let text = message.get("content").and_then(Value::as_str).unwrap_or_default();

    let usage = body.get("usage");
    let usage = TokenUsage::new(
        token_count(usage.and_then(|u| u.get("prompt_tokens"))),
        token_count(usage.and_then(|u| u.get("completion_tokens"))),
    );
    Ok(Completion::new(text, usage))
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn model(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, system_prompt: Option<&str>) -> Result<Completion, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.name, url = %url, prompt_chars = prompt.len(), "sending chat completion");

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&self.build_body(prompt, system_prompt));
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| map_send_error(&e))?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("malformed JSON body: {e}")))?;
        parse_completion(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> OpenAiCompatClient {
        OpenAiCompatClient::new(
            "openai/gpt-4o",
            "gpt-4o",
            format!("{}/v1", server.uri()),
            key.map(str::to_string),
            RequestParams { max_tokens: 256, temperature: Some(0.2) },
        )
        .unwrap()
    }

    #[test]
    fn body_includes_system_prompt_only_when_given() {
        let c = OpenAiCompatClient::new("n", "m", "http://x/", None, RequestParams::default()).unwrap();
        let body = c.build_body("hi", Some("be brief"));
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][0]["role"], "system");
        let body = c.build_body("hi", None);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn null_content_is_empty_text() {
        let body = json!({"choices": [{"message": {"content": null}}]});
        let c = parse_completion(&body).unwrap();
        assert_eq!(c.text, "");
        assert_eq!(c.usage, TokenUsage::default());
    }

    #[test]
    fn no_choices_is_invalid() {
        assert!(matches!(
            parse_completion(&json!({"choices": []})),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn successful_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o", "max_tokens": 256})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"orders\": []}"}}],
                "usage": {"prompt_tokens": 42, "completion_tokens": 7}
            })))
            .mount(&server)
            .await;

        let completion = client(&server, Some("sk-test")).generate("orders?", Some("sys")).await.unwrap();
        assert_eq!(completion.text, "{\"orders\": []}");
        assert_eq!(completion.usage, TokenUsage::new(42, 7));
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "3")
                    .set_body_json(json!({"error": {"message": "slow down"}})),
            )
            .mount(&server)
            .await;

        let err = client(&server, None).generate("x", None).await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::RateLimited { retry_after: Some(d) } if d == std::time::Duration::from_secs(3)
        ));
    }

    #[tokio::test]
    async fn auth_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})))
            .mount(&server)
            .await;

        let err = client(&server, Some("wrong")).generate("x", None).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let c = OpenAiCompatClient::new("n", "m", "http://127.0.0.1:1", None, RequestParams::default()).unwrap();
        let err = c.generate("x", None).await.unwrap_err();
        assert!(matches!(err, LlmError::Network(_)));
        assert!(err.is_retryable());
    }
}
