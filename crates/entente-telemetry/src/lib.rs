//! # entente-telemetry
//!
//! Tracing subscriber setup and the CSV log of structured model calls.

mod call_log;

pub use call_log::{CallLog, CallLogEntry, CallLogError, RESPONSE_PREVIEW_CHARS};

use std::path::PathBuf;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by `RUST_LOG`.
    pub log_level: Level,
    /// Per-module level overrides (e.g. `entente_extract` => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines instead of the human format.
    pub json: bool,
    /// Where to append the structured-call CSV, if anywhere.
    pub call_log_path: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
            call_log_path: None,
        }
    }
}

impl TelemetryConfig {
    /// The filter directive used when `RUST_LOG` is unset.
    pub fn filter_directive(&self) -> String {
        let mut filter = self.log_level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{module}={}", level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Handles created during initialization.
pub struct TelemetryGuard {
    call_log: Option<Arc<CallLog>>,
}

impl TelemetryGuard {
    /// The call log sink, when a path was configured and could be opened.
    pub fn call_log(&self) -> Option<Arc<CallLog>> {
        self.call_log.clone()
    }
}

/// Initialize the telemetry subsystem. Call once at startup.
///
/// A second call leaves the first subscriber in place.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    if tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }

    let call_log = config.call_log_path.as_deref().and_then(|path| match CallLog::open(path) {
        Ok(log) => Some(Arc::new(log)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to open call log");
            None
        }
    });

    TelemetryGuard { call_log }
}

/// Parse a level name (`trace` .. `error`), defaulting to INFO.
pub fn parse_level(name: &str) -> Level {
    name.trim().parse().unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_directive_includes_modules() {
        let config = TelemetryConfig {
            log_level: Level::WARN,
            module_levels: vec![("entente_llm".into(), Level::DEBUG)],
            ..Default::default()
        };
        assert_eq!(config.filter_directive(), "warn,entente_llm=debug");
    }

    #[test]
    fn level_parsing() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("ERROR"), Level::ERROR);
        assert_eq!(parse_level("chatty"), Level::INFO);
    }

    #[test]
    fn init_opens_call_log() {
        let dir = tempfile::tempdir().unwrap();
        let guard = init_telemetry(TelemetryConfig {
            call_log_path: Some(dir.path().join("calls.csv")),
            ..Default::default()
        });
        assert!(guard.call_log().is_some());
        let again = init_telemetry(TelemetryConfig::default());
        assert!(again.call_log().is_none());
    }
}
