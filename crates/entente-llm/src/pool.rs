//! Cache of live model handles.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use entente_core::{LlmError, ModelClient};

use crate::factory::ModelFactory;

/// Caches one live handle per literal model identifier.
///
/// Entries are never evicted. Two tasks racing on a cold name may both build
/// a handle; the first insert wins and both callers receive it.
pub struct ModelPool {
    factory: Arc<dyn ModelFactory>,
    handles: DashMap<String, Arc<dyn ModelClient>>,
}

impl ModelPool {
    /// An empty pool that builds handles with `factory`.
    pub fn new(factory: Arc<dyn ModelFactory>) -> Self {
        Self {
            factory,
            handles: DashMap::new(),
        }
    }

    /// The cached handle for `model_name`, building it on first use.
    pub fn get(&self, model_name: &str) -> Result<Arc<dyn ModelClient>, LlmError> {
        if model_name.trim().is_empty() {
            return Err(LlmError::UnknownModel("empty model name".into()));
        }
        if let Some(handle) = self.handles.get(model_name) {
            return Ok(handle.clone());
        }

        // Built outside the map lock; construction may be slow.
        let built = self.factory.create(model_name)?;
        let handle = self
            .handles
            .entry(model_name.to_string())
            .or_insert(built)
            .clone();
        debug!(model = %model_name, cached = self.handles.len(), "model handle cached");
        Ok(handle)
    }

    /// Whether a handle for `model_name` is already cached.
    pub fn contains(&self, model_name: &str) -> bool {
        self.handles.contains_key(model_name)
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no handle has been built yet.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
