//! Read-through artifact cache

use crate::error::PipelineError;
use crate::models::{ModelStore, Regressor};
use crate::types::ModelId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Keeps artifacts loaded by an inner store so later requests skip the load.
///
/// Only the loaded artifact is shared; preprocessing state is still fitted
/// per request.
pub struct CachedModelStore<S> {
    inner: S,
    models: RwLock<HashMap<ModelId, Arc<dyn Regressor>>>,
}

impl<S: ModelStore> CachedModelStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            models: RwLock::new(HashMap::new()),
        }
    }
}

fn lock_failure(model_id: ModelId) -> PipelineError {
    PipelineError::ModelLoad {
        model_id: model_id.to_string(),
        reason: "model cache lock poisoned".to_string(),
    }
}

impl<S: ModelStore> ModelStore for CachedModelStore<S> {
    fn load(&self, model_id: ModelId) -> Result<Arc<dyn Regressor>, PipelineError> {
        {
            let models = self.models.read().map_err(|_| lock_failure(model_id))?;
            if let Some(model) = models.get(&model_id) {
                debug!(model = %model_id, "Model served from cache");
                return Ok(model.clone());
            }
        }

        let loaded = self.inner.load(model_id)?;

        let mut models = self.models.write().map_err(|_| lock_failure(model_id))?;
        // Another request may have loaded it meanwhile; keep the first one.
        let model = models.entry(model_id).or_insert(loaded).clone();
        debug!(model = %model_id, cached = models.len(), "Model cached");
        Ok(model)
    }
}
