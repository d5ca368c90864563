//! Settings type definitions.
//!
//! All types use camelCase field names and `#[serde(default)]`, so a user
//! file only needs the keys it changes.

mod backends;

pub use backends::*;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};
use crate::loader::entente_home;

/// Root settings type.
///
/// ```json
/// {
///   "models": { "localPrefixes": ["ollama/", "mlx/"], "gateScope": "perModel" },
///   "retry": { "maxRetries": 4 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntenteSettings {
    /// Default model and local-model detection.
    pub models: ModelSettings,
    /// Endpoints and API keys.
    pub backends: BackendSettings,
    /// Backoff for transport failures.
    pub retry: RetrySettings,
    /// Alternate field names for structured answers.
    pub extraction: ExtractionSettings,
    /// Token usage ledger.
    pub usage: UsageSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
    /// Per-request generation parameters.
    pub request: RequestSettings,
}

impl EntenteSettings {
    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.models.local_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(SettingsError::InvalidValue("models.localPrefixes contains an empty prefix".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(SettingsError::InvalidValue(format!(
                "retry.baseDelayMs ({}) exceeds retry.maxDelayMs ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        if self.request.timeout_secs == 0 {
            return Err(SettingsError::InvalidValue("request.timeoutSecs must be positive".into()));
        }
        Ok(())
    }
}

/// Whether the serialization gate is one lock for every local model or one
/// lock per local model name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateScope {
    /// One lock shared by every local model.
    #[default]
    Global,
    /// One lock per local model name.
    PerModel,
}

impl FromStr for GateScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "global" => Ok(Self::Global),
            "permodel" => Ok(Self::PerModel),
            other => Err(format!("unknown gate scope: {other}")),
        }
    }
}

/// Model selection and local-model detection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelSettings {
    /// Model used when a caller does not name one.
    pub default_model: String,
    /// Name prefixes (matched case-insensitively) that mark a model as local.
    pub local_prefixes: Vec<String>,
    /// How local models are serialized.
    pub gate_scope: GateScope,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            default_model: "openai/gpt-4o-mini".to_string(),
            local_prefixes: vec!["ollama/".into(), "llamacpp/".into(), "local/".into()],
            gate_scope: GateScope::Global,
        }
    }
}

/// Retry configuration for transport failures.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay_ms: u64,
    /// Cap on any single delay.
    pub max_delay_ms: u64,
    /// Fraction (0.0 to 1.0) of each delay that is randomized.
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_factor: 0.2,
        }
    }
}

/// Alternate key names for fields that prompts have named differently.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionSettings {
    /// Tried in order when reading relationship updates.
    pub relationship_keys: Vec<String>,
    /// Tried in order when reading goal updates.
    pub goal_keys: Vec<String>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            relationship_keys: vec![
                "updated_relationships".into(),
                "relationships".into(),
                "relationship_updates".into(),
            ],
            goal_keys: vec!["updated_goals".into(), "goals".into(), "goal_updates".into()],
        }
    }
}

/// Usage ledger location.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageSettings {
    /// Whether usage is recorded at all.
    pub enabled: bool,
    /// SQLite file; parent directories are created on open.
    pub db_path: String,
}

impl Default for UsageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: entente_home().join("usage.db").to_string_lossy().into_owned(),
        }
    }
}

/// Log output and the structured-call CSV.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// JSON lines instead of the human format.
    pub json: bool,
    /// Append-only CSV of structured calls; disabled when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_log_path: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            call_log_path: None,
        }
    }
}

/// Per-request parameters sent to every backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestSettings {
    /// Per-invocation deadline in seconds; must be non-zero.
    pub timeout_secs: u64,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Backend default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 180,
            max_tokens: 4096,
            temperature: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let s = EntenteSettings::default();
        assert_eq!(s.models.local_prefixes, ["ollama/", "llamacpp/", "local/"]);
        assert_eq!(s.models.gate_scope, GateScope::Global);
        assert_eq!(s.retry.max_retries, 2);
        assert!(s.usage.enabled);
        assert!(s.usage.db_path.ends_with("usage.db"));
        assert!(s.logging.call_log_path.is_none());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn camel_case_wire_format() {
        let v = serde_json::to_value(EntenteSettings::default()).unwrap();
        assert!(v["models"]["localPrefixes"].is_array());
        assert_eq!(v["models"]["gateScope"], "global");
        assert!(v["retry"]["maxRetries"].is_number());
        assert!(v["extraction"]["relationshipKeys"].is_array());
        assert!(v["logging"].get("callLogPath").is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: EntenteSettings =
            serde_json::from_value(json!({"models": {"gateScope": "perModel"}})).unwrap();
        assert_eq!(s.models.gate_scope, GateScope::PerModel);
        assert_eq!(s.models.local_prefixes.len(), 3);
        assert_eq!(s.request.max_tokens, 4096);
    }

    #[test]
    fn gate_scope_from_str() {
        assert_eq!("global".parse::<GateScope>(), Ok(GateScope::Global));
        assert_eq!("per-model".parse::<GateScope>(), Ok(GateScope::PerModel));
        assert_eq!("PER_MODEL".parse::<GateScope>(), Ok(GateScope::PerModel));
        assert!("sometimes".parse::<GateScope>().is_err());
    }

    #[test]
    fn validate_rejects_empty_prefix() {
        let mut s = EntenteSettings::default();
        s.models.local_prefixes.push("  ".into());
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_rejects_inverted_delays() {
        let mut s = EntenteSettings::default();
        s.retry.base_delay_ms = 10_000;
        s.retry.max_delay_ms = 100;
        assert!(s.validate().is_err());
    }
}
