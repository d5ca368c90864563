//! The backend seam: one prompt in, one completion out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::LlmError;

/// Token counts reported by a backend for one invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Generated tokens.
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Counts for one invocation.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Input plus output.
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// The text payload of one model invocation plus its token accounting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    /// Generated text, possibly empty.
    pub text: String,
    /// Tokens consumed by the invocation.
    pub usage: TokenUsage,
}

impl Completion {
    /// A completion carrying `text` and its token counts.
    pub fn new(text: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            text: text.into(),
            usage,
        }
    }
}

/// A live handle to one named model.
///
/// Handles are expensive to build (HTTP clients, auth resolution) and are
/// cached by the model pool for the life of the process. Implementors must be
/// `Send + Sync` so one handle can serve concurrent tasks.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// The model identifier this handle was built for.
    fn model(&self) -> &str;

    /// Run one completion and return its text.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Completion, LlmError>;
}
