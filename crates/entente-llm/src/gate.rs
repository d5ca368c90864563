//! Serializes invocations of local models.
//!
//! A model is local when its name starts with one of the configured
//! prefixes (case-insensitive). Local invocations take a FIFO
//! `tokio::sync::Mutex`; everything else runs unrestricted. The permit is an
//! owned guard, so it is released when the invocation finishes, fails, or
//! is cancelled.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use entente_settings::{GateScope, ModelSettings};

/// Held for the duration of one local invocation.
#[derive(Debug)]
pub struct GatePermit {
    _guard: OwnedMutexGuard<()>,
}

/// Admits one invocation at a time to local models.
///
/// Remote models pass through untouched.
pub struct SerializationGate {
    prefixes: Vec<String>,
    scope: GateScope,
    global: Arc<Mutex<()>>,
    per_model: DashMap<String, Arc<Mutex<()>>>,
}

impl SerializationGate {
    /// `prefixes` are matched case-insensitively; blanks are dropped.
    pub fn new<S: AsRef<str>>(prefixes: &[S], scope: GateScope) -> Self {
        Self {
            prefixes: prefixes
                .iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            scope,
            global: Arc::new(Mutex::new(())),
            per_model: DashMap::new(),
        }
    }

    /// A gate configured from model settings.
    pub fn from_settings(models: &ModelSettings) -> Self {
        Self::new(&models.local_prefixes, models.gate_scope)
    }

    /// Whether local models share one lock.
    pub fn scope(&self) -> GateScope {
        self.scope
    }

    /// Whether `model_name` starts with a local prefix.
    pub fn is_local(&self, model_name: &str) -> bool {
        let lower = model_name.to_lowercase();
        self.prefixes.iter().any(|p| lower.starts_with(p.as_str()))
    }

    /// Wait for this model's turn. `None` for non-local models.
    pub async fn acquire(&self, model_name: &str) -> Option<GatePermit> {
        if !self.is_local(model_name) {
            return None;
        }
        let lock = match self.scope {
            GateScope::Global => self.global.clone(),
            GateScope::PerModel => self
                .per_model
                .entry(model_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone(),
        };
        trace!(model = %model_name, "waiting for serialization gate");
        let guard = lock.lock_owned().await;
        trace!(model = %model_name, "serialization gate acquired");
        Some(GatePermit { _guard: guard })
    }
}
