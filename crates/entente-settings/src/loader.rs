//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`EntenteSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `ENTENTE_*` environment overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules: objects merge per key, arrays and primitives are
//! replaced, nulls in the file are skipped.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{EntenteSettings, GateScope};

/// `~/.entente`, or `/tmp/.entente` without a home directory.
pub fn entente_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".entente")
}

/// `~/.entente/settings.json`
pub fn settings_path() -> PathBuf {
    entente_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<EntenteSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env var overrides.
///
/// A missing file yields defaults; an unreadable or malformed one is an error.
pub fn load_settings_from_path(path: &Path) -> Result<EntenteSettings> {
    let mut settings = read_merged(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_merged(path: &Path) -> Result<EntenteSettings> {
    let defaults = serde_json::to_value(EntenteSettings::default())?;
    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };
    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of `source` over `target`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `ENTENTE_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut EntenteSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using `lookup` in place of the environment.
///
/// Invalid values are logged and ignored.
pub fn apply_overrides_from(settings: &mut EntenteSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = read("ENTENTE_DEFAULT_MODEL") {
        settings.models.default_model = v;
    }
    if let Some(v) = read("ENTENTE_LOCAL_PREFIXES") {
        let prefixes = parse_list(&v);
        if prefixes.is_empty() {
            warn!(key = "ENTENTE_LOCAL_PREFIXES", value = %v, "empty prefix list, ignoring");
        } else {
            settings.models.local_prefixes = prefixes;
        }
    }
    if let Some(v) = read("ENTENTE_GATE_SCOPE") {
        match v.parse::<GateScope>() {
            Ok(scope) => settings.models.gate_scope = scope,
            Err(e) => warn!(key = "ENTENTE_GATE_SCOPE", value = %v, error = %e, "ignoring"),
        }
    }
    if let Some(v) = read("ENTENTE_MAX_RETRIES") {
        match parse_u32_range(&v, 0, 20) {
            Some(n) => settings.retry.max_retries = n,
            None => warn!(key = "ENTENTE_MAX_RETRIES", value = %v, "invalid retry count, ignoring"),
        }
    }
    if let Some(v) = read("ENTENTE_USAGE_DB") {
        settings.usage.db_path = v;
    }
    if let Some(v) = read("ENTENTE_USAGE_ENABLED") {
        match parse_bool(&v) {
            Some(b) => settings.usage.enabled = b,
            None => warn!(key = "ENTENTE_USAGE_ENABLED", value = %v, "invalid boolean, ignoring"),
        }
    }
    if let Some(v) = read("ENTENTE_CALL_LOG") {
        settings.logging.call_log_path = Some(v);
    }
    if let Some(v) = read("ENTENTE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Accepts (case-insensitive) `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `val` as a `u32` within `min..=max`.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Comma-separated list with blanks dropped.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
