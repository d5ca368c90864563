//! Model identifiers: `backend/model[@base_url]` or a bare well-known name.

use std::fmt;

use entente_core::LlmError;
use entente_settings::{BackendEndpoint, BackendSettings};

/// The wire protocol and default endpoint a model is served through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    /// OpenAI chat completions.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// OpenRouter's OpenAI-compatible gateway.
    OpenRouter,
    /// Together AI.
    Together,
    /// DeepSeek's OpenAI-compatible API.
    DeepSeek,
    /// A local Ollama server.
    Ollama,
    /// llama.cpp server, also reachable as `local/`.
    LlamaCpp,
}

impl Backend {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "openrouter" => Some(Self::OpenRouter),
            "together" => Some(Self::Together),
            "deepseek" => Some(Self::DeepSeek),
            "ollama" => Some(Self::Ollama),
            "llamacpp" | "local" => Some(Self::LlamaCpp),
            _ => None,
        }
    }

    /// Guess the backend of a bare model name.
    fn detect(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("gpt-")
            || lower.starts_with("chatgpt")
            || ["o1", "o3", "o4"].iter().any(|p| lower == *p || lower.starts_with(&format!("{p}-")))
        {
            Some(Self::OpenAi)
        } else if lower.starts_with("claude") {
            Some(Self::Anthropic)
        } else if lower.starts_with("deepseek") {
            Some(Self::DeepSeek)
        } else {
            None
        }
    }

    /// Prefix naming this backend in identifiers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::OpenRouter => "openrouter",
            Self::Together => "together",
            Self::DeepSeek => "deepseek",
            Self::Ollama => "ollama",
            Self::LlamaCpp => "llamacpp",
        }
    }

    /// Whether requests must carry an API key.
    pub fn requires_key(self) -> bool {
        !matches!(self, Self::Ollama | Self::LlamaCpp)
    }

    /// The configured endpoint for this backend.
    pub fn endpoint(self, backends: &BackendSettings) -> &BackendEndpoint {
        match self {
            Self::OpenAi => &backends.openai,
            Self::Anthropic => &backends.anthropic,
            Self::OpenRouter => &backends.openrouter,
            Self::Together => &backends.together,
            Self::DeepSeek => &backends.deepseek,
            Self::Ollama => &backends.ollama,
            Self::LlamaCpp => &backends.llamacpp,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed model identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    /// Backend named by the identifier's prefix.
    pub backend: Backend,
    /// The name sent to the API.
    pub model: String,
    /// Overrides the backend's configured base URL.
    pub base_url: Option<String>,
}

impl ModelSpec {
    /// Parse `backend/model[@base_url]`; an unknown backend is `UnknownModel`.
    pub fn parse(name: &str) -> Result<Self, LlmError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LlmError::UnknownModel("empty model name".into()));
        }

        let (id, base_url) = match name.split_once('@') {
            Some((id, url)) if !url.trim().is_empty() => (id.trim(), Some(url.trim().trim_end_matches('/').to_string())),
            Some((id, _)) => (id.trim(), None),
            None => (name, None),
        };

        if let Some((prefix, model)) = id.split_once('/') {
            if let Some(backend) = Backend::from_prefix(prefix) {
                if model.is_empty() {
                    return Err(LlmError::UnknownModel(format!("{name}: missing model after '{prefix}/'")));
                }
                return Ok(Self { backend, model: model.to_string(), base_url });
            }
        }

        match Backend::detect(id) {
            Some(backend) if !id.contains('/') => Ok(Self { backend, model: id.to_string(), base_url }),
            _ => Err(LlmError::UnknownModel(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(name: &str) -> ModelSpec {
        ModelSpec::parse(name).unwrap()
    }

    #[test]
    fn prefixed_names() {
        let spec = parse("openai/gpt-4o");
        assert_eq!(spec.backend, Backend::OpenAi);
        assert_eq!(spec.model, "gpt-4o");
        assert_eq!(spec.base_url, None);

        let spec = parse("openrouter/meta-llama/llama-3.1-70b-instruct");
        assert_eq!(spec.backend, Backend::OpenRouter);
        assert_eq!(spec.model, "meta-llama/llama-3.1-70b-instruct");
    }

    #[test]
    fn base_url_suffix() {
        let spec = parse("ollama/llama3.1:8b@http://gpu-box:11434/v1/");
        assert_eq!(spec.backend, Backend::Ollama);
        assert_eq!(spec.model, "llama3.1:8b");
        assert_eq!(spec.base_url.as_deref(), Some("http://gpu-box:11434/v1"));
    }

    #[test]
    fn prefix_is_case_insensitive() {
        assert_eq!(parse("Ollama/qwen2.5").backend, Backend::Ollama);
        assert_eq!(parse("LOCAL/mistral").backend, Backend::LlamaCpp);
    }

    #[test]
    fn bare_names_detected() {
        assert_eq!(parse("gpt-4o-mini").backend, Backend::OpenAi);
        assert_eq!(parse("o3-mini").backend, Backend::OpenAi);
        assert_eq!(parse("o1").backend, Backend::OpenAi);
        assert_eq!(parse("claude-sonnet-4-5").backend, Backend::Anthropic);
        assert_eq!(parse("deepseek-reasoner").backend, Backend::DeepSeek);
    }

    #[test]
    fn unknown_names_rejected() {
        for name in ["", "   ", "mystery-model", "nowhere/gpt-4o", "ollama/", "o2-large"] {
            assert!(
                matches!(ModelSpec::parse(name), Err(LlmError::UnknownModel(_))),
                "{name:?} should be unknown"
            );
        }
    }

    #[test]
    fn key_requirements() {
        assert!(Backend::Anthropic.requires_key());
        assert!(!Backend::Ollama.requires_key());
        assert!(!Backend::LlamaCpp.requires_key());
    }
}
