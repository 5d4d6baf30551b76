//! Process-wide model cache
//!
//! Models are loaded on first request for their identifier and kept for the
//! lifetime of the process. There is no eviction.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::model::{EmbeddingModel, ModelLoader};
use crate::models::EmbeddingResult;

/// Lazily populated map from model identifier to loaded model
pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    models: RwLock<HashMap<String, Arc<dyn EmbeddingModel>>>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached model for `model_name`, loading it on a miss.
    ///
    /// The load itself runs without holding the lock, so two first requests
    /// for the same identifier may both load. Only the first one stored is
    /// kept and both callers get that handle. A failed load caches nothing.
    pub async fn get_or_load(&self, model_name: &str) -> EmbeddingResult<Arc<dyn EmbeddingModel>> {
        if let Some(model) = self.models.read().await.get(model_name) {
            return Ok(Arc::clone(model));
        }

        info!("Loading model '{}'", model_name);
        let loaded = self.loader.load(model_name).await?;

        let mut models = self.models.write().await;
        let model = Arc::clone(
            models
                .entry(model_name.to_string())
                .or_insert_with(|| loaded),
        );
        debug!("Model '{}' cached ({} models loaded)", model_name, models.len());
        Ok(model)
    }

    /// Check if a model is loaded
    pub async fn is_loaded(&self, model_name: &str) -> bool {
        self.models.read().await.contains_key(model_name)
    }

    /// List identifiers of all loaded models
    pub async fn loaded_models(&self) -> Vec<String> {
        self.models.read().await.keys().cloned().collect()
    }
}
