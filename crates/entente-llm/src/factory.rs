//! Model handle construction.

use std::sync::Arc;

use tracing::info;

use entente_core::{LlmError, ModelClient};
use entente_settings::{BackendSettings, EntenteSettings};

use crate::anthropic::AnthropicClient;
use crate::http::RequestParams;
use crate::openai::OpenAiCompatClient;
use crate::retry::{RetryConfig, RetryingClient};
use crate::spec::{Backend, ModelSpec};

/// Builds a live handle for a model identifier.
///
/// Construction is synchronous and may fail with `LlmError::UnknownModel`
/// (unrecognized name) or `LlmError::Authentication` (missing key).
pub trait ModelFactory: Send + Sync {
    /// Build a handle for `model_name`.
    fn create(&self, model_name: &str) -> Result<Arc<dyn ModelClient>, LlmError>;
}

/// The production factory: parses the identifier and builds the matching
/// HTTP backend, wrapped in retry.
pub struct BackendFactory {
    backends: BackendSettings,
    params: RequestParams,
    retry: RetryConfig,
}

impl BackendFactory {
    /// A factory with explicit backends, parameters and retry policy.
    pub fn new(backends: BackendSettings, params: RequestParams, retry: RetryConfig) -> Self {
        Self { backends, params, retry }
    }

    /// Backends, request parameters and retry policy taken from `settings`.
    pub fn from_settings(settings: &EntenteSettings) -> Self {
        Self::new(
            settings.backends.clone(),
            RequestParams {
                max_tokens: settings.request.max_tokens,
                temperature: settings.request.temperature,
            },
            RetryConfig::from(&settings.retry),
        )
    }

    fn wrap<C: ModelClient + 'static>(&self, client: C) -> Arc<dyn ModelClient> {
        if self.retry.max_retries == 0 {
            Arc::new(client)
        } else {
            Arc::new(RetryingClient::new(client, self.retry.clone()))
        }
    }
}

impl ModelFactory for BackendFactory {
    fn create(&self, model_name: &str) -> Result<Arc<dyn ModelClient>, LlmError> {
        let spec = ModelSpec::parse(model_name)?;
        let endpoint = spec.backend.endpoint(&self.backends);
        let base_url = spec.base_url.clone().unwrap_or_else(|| endpoint.base_url.clone());
        let api_key = endpoint.resolve_api_key();

        if spec.backend.requires_key() && api_key.is_none() {
            let source = endpoint.api_key_env.as_deref().unwrap_or("backends.<name>.apiKey");
            return Err(LlmError::Authentication(format!(
                "no API key for {} (set {source})",
                spec.backend
            )));
        }

        info!(model = %model_name, backend = %spec.backend, base_url = %base_url, "building model handle");

        match spec.backend {
            Backend::Anthropic => Ok(self.wrap(AnthropicClient::new(
                model_name,
                spec.model,
                base_url,
                api_key.unwrap_or_default(),
                self.params.clone(),
            )?)),
            _ => Ok(self.wrap(OpenAiCompatClient::new(
                model_name,
                spec.model,
                base_url,
                api_key,
                self.params.clone(),
            )?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entente_settings::BackendEndpoint;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn factory_with(backends: BackendSettings) -> BackendFactory {
        BackendFactory::new(backends, RequestParams::default(), RetryConfig { max_retries: 0, ..Default::default() })
    }

    #[test]
    fn unknown_model_propagates() {
        let f = factory_with(BackendSettings::default());
        assert!(matches!(f.create("mystery"), Err(LlmError::UnknownModel(_))));
    }

    #[test]
    fn missing_key_is_authentication_error() {
        let mut backends = BackendSettings::default();
        backends.anthropic = BackendEndpoint {
            base_url: "http://localhost".into(),
            api_key: None,
            api_key_env: Some("ENTENTE_TEST_NEVER_SET_ANTHROPIC".into()),
        };
        let err = factory_with(backends).create("anthropic/claude-sonnet-4-5").err().unwrap();
        assert!(matches!(err, LlmError::Authentication(_)));
        assert!(err.to_string().contains("ENTENTE_TEST_NEVER_SET_ANTHROPIC"));
    }

    #[test]
    fn local_models_need_no_key() {
        let handle = factory_with(BackendSettings::default()).create("ollama/llama3.1").unwrap();
        assert_eq!(handle.model(), "ollama/llama3.1");
    }

    #[tokio::test]
    async fn base_url_override_reaches_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "qwen2.5:7b"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "hello"}}]
            })))
            .mount(&server)
            .await;

        let name = format!("ollama/qwen2.5:7b@{}/v1", server.uri());
        let handle = factory_with(BackendSettings::default()).create(&name).unwrap();
        let completion = handle.generate("hi", None).await.unwrap();
        assert_eq!(completion.text, "hello");
        assert_eq!(completion.usage.total(), 0);
    }
}
