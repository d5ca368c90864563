//! Backend endpoints and credentials.

use serde::{Deserialize, Serialize};

/// One HTTP endpoint plus where its API key comes from.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendEndpoint {
    /// API root, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Inline key; takes precedence over `api_key_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl BackendEndpoint {
    fn new(base_url: &str, api_key_env: Option<&str>) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: None,
            api_key_env: api_key_env.map(str::to_string),
        }
    }

    /// The inline key, else the named environment variable, else nothing.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|name| std::env::var(name).ok())
                    .filter(|k| !k.is_empty())
            })
    }
}

/// Endpoints for every supported backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    /// Endpoint for the `openai` backend.
    pub openai: BackendEndpoint,
    /// Endpoint for the `anthropic` backend.
    pub anthropic: BackendEndpoint,
    /// Endpoint for the `openrouter` backend.
    pub openrouter: BackendEndpoint,
    /// Endpoint for the `together` backend.
    pub together: BackendEndpoint,
    /// Endpoint for the `deepseek` backend.
    pub deepseek: BackendEndpoint,
    /// Endpoint for the `ollama` backend.
    pub ollama: BackendEndpoint,
    /// Endpoint for the `llamacpp` backend.
    pub llamacpp: BackendEndpoint,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            openai: BackendEndpoint::new("https://api.openai.com/v1", Some("OPENAI_API_KEY")),
            anthropic: BackendEndpoint::new("https://api.anthropic.com", Some("ANTHROPIC_API_KEY")),
            openrouter: BackendEndpoint::new("https://openrouter.ai/api/v1", Some("OPENROUTER_API_KEY")),
            together: BackendEndpoint::new("https://api.together.xyz/v1", Some("TOGETHER_API_KEY")),
            deepseek: BackendEndpoint::new("https://api.deepseek.com/v1", Some("DEEPSEEK_API_KEY")),
            ollama: BackendEndpoint::new("http://localhost:11434/v1", None),
            llamacpp: BackendEndpoint::new("http://localhost:8080/v1", None),
        }
    }
}
