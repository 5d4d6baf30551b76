//! Model definitions and traits
//!
//! This module defines the core traits for embedding models and for the
//! loaders that turn a model identifier into a ready-to-use handle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{Embedding, EmbeddingResult, Precision};

/// Information about a loaded model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier the handle was loaded for
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Maximum sequence length in tokens
    pub max_sequence_length: usize,
    /// Precision outputs are served at
    pub precision: Precision,
}

/// Core embedding model trait
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Generate the embedding for a single text
    async fn embed_text(&self, text: &str) -> EmbeddingResult<Embedding>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize {
        self.info().dimension
    }
}

/// Turns a model identifier into a loaded model running on the CPU.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, model_name: &str) -> EmbeddingResult<Arc<dyn EmbeddingModel>>;
}

/// ONNX-based embedding model implementation
#[cfg(feature = "onnx")]
pub mod onnx {
    use super::*;
    use crate::models::config::ModelsConfig;
    use crate::models::EmbeddingError;
    use crate::onnx::{OnnxConfig, OnnxEmbeddingEngine};
    use tokio::sync::Mutex;
    use tracing::info;

    /// ONNX embedding model
    pub struct OnnxEmbeddingModel {
        info: ModelInfo,
        engine: Mutex<OnnxEmbeddingEngine>,
    }

    impl OnnxEmbeddingModel {
        /// Load the model files for `model_name` and probe its output dimension.
        pub fn load(model_name: &str, config: &ModelsConfig) -> EmbeddingResult<Self> {
            let files = config.resolve(model_name)?;
            if !files.model_path.exists() {
                return Err(EmbeddingError::ModelNotFound {
                    model_name: model_name.to_string(),
                });
            }

            let onnx_config = OnnxConfig::from_models_config(config);
            let mut engine = OnnxEmbeddingEngine::new(
                &files.model_path,
                &files.tokenizer_path,
                &onnx_config,
            )
            .map_err(|e| EmbeddingError::ModelLoadError {
                model_name: model_name.to_string(),
                error: e.to_string(),
            })?;

            let dimension = engine
                .embed_text("dimension probe")
                .map_err(|e| EmbeddingError::ModelLoadError {
                    model_name: model_name.to_string(),
                    error: e.to_string(),
                })?
                .len();
            info!("Loaded model '{}' ({} dimensions)", model_name, dimension);

            Ok(Self {
                info: ModelInfo {
                    name: model_name.to_string(),
                    dimension,
                    max_sequence_length: config.max_sequence_length,
                    precision: Precision::Full,
                },
                engine: Mutex::new(engine),
            })
        }

        /// Switch this model to a reduced precision. Consumes the handle, so
        /// the full-precision model is gone afterwards.
        ///
        /// Only the produced vectors are rounded. The ONNX session itself
        /// keeps running in f32, so this saves no memory or compute.
        pub fn with_precision(mut self, precision: Precision) -> Self {
            self.info.precision = precision;
            self
        }
    }

    #[async_trait]
    impl EmbeddingModel for OnnxEmbeddingModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn embed_text(&self, text: &str) -> EmbeddingResult<Embedding> {
            let mut engine = self.engine.lock().await;
            let mut embedding = engine
                .embed_text(text)
                .map_err(|e| EmbeddingError::InferenceError {
                    model_name: self.info.name.clone(),
                    error: e.to_string(),
                })?;
            self.info.precision.apply(&mut embedding);
            Ok(embedding)
        }
    }

    /// Loads models from `ModelsConfig::models_dir`
    pub struct OnnxModelLoader {
        config: ModelsConfig,
    }

    impl OnnxModelLoader {
        pub fn new(config: ModelsConfig) -> Self {
            Self { config }
        }
    }

    #[async_trait]
    impl ModelLoader for OnnxModelLoader {
        async fn load(&self, model_name: &str) -> EmbeddingResult<Arc<dyn EmbeddingModel>> {
            let name = model_name.to_string();
            let config = self.config.clone();
            // session creation reads and optimizes the whole graph
            let model = tokio::task::spawn_blocking(move || OnnxEmbeddingModel::load(&name, &config))
                .await
                .map_err(|e| EmbeddingError::ModelLoadError {
                    model_name: model_name.to_string(),
                    error: e.to_string(),
                })??;
            Ok(Arc::new(model))
        }
    }
}
