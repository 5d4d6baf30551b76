//! Mock model and loader for testing without an ONNX runtime.
//!
//! The model produces deterministic vectors from a hash of the text, and the
//! loader counts how many times it was asked to load.

use async_trait::async_trait;
use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::models::model::{EmbeddingModel, ModelInfo, ModelLoader};
use crate::models::{Embedding, EmbeddingError, EmbeddingResult, Precision};

/// A mock model that produces deterministic vectors from text hashes.
pub struct MockEmbeddingModel {
    info: ModelInfo,
    fail_on: Option<String>,
}

impl MockEmbeddingModel {
    pub fn new(name: &str, dimension: usize) -> Self {
        Self {
            info: ModelInfo {
                name: name.to_string(),
                dimension,
                max_sequence_length: 256,
                precision: Precision::Full,
            },
            fail_on: None,
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.info.precision = precision;
        self
    }

    /// Make `embed_text` fail for exactly this input.
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    async fn embed_text(&self, text: &str) -> EmbeddingResult<Embedding> {
        if self.fail_on.as_deref() == Some(text) {
            return Err(EmbeddingError::InferenceError {
                model_name: self.info.name.clone(),
                error: "mock inference failure".to_string(),
            });
        }

        let mut hasher = DefaultHasher::new();
        self.info.name.hash(&mut hasher);
        text.hash(&mut hasher);
        let bytes = hasher.finish().to_le_bytes();

        let mut embedding: Vec<f32> = (0..self.info.dimension)
            .map(|i| (bytes[i % 8] as f32 + i as f32) / 255.0)
            .collect();

        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }
        self.info.precision.apply(&mut embedding);

        Ok(embedding)
    }
}

/// Loader handing out `MockEmbeddingModel`s and counting loads.
pub struct MockModelLoader {
    dimension: usize,
    failing: HashSet<String>,
    loads: AtomicUsize,
}

impl MockModelLoader {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            failing: HashSet::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Make loads of `model_name` fail as if the identifier were unknown.
    pub fn failing_for(mut self, model_name: &str) -> Self {
        self.failing.insert(model_name.to_string());
        self
    }

    /// Number of `load` calls so far, failed ones included
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for MockModelLoader {
    async fn load(&self, model_name: &str) -> EmbeddingResult<Arc<dyn EmbeddingModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(model_name) {
            return Err(EmbeddingError::ModelNotFound {
                model_name: model_name.to_string(),
            });
        }
        Ok(Arc::new(MockEmbeddingModel::new(model_name, self.dimension)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embed_dimensions() {
        let model = MockEmbeddingModel::new("mock", 384);
        assert_eq!(model.embed_text("hello world").await.unwrap().len(), 384);
        assert_eq!(model.dimension(), 384);
    }

    #[tokio::test]
    async fn test_mock_embed_deterministic() {
        let model = MockEmbeddingModel::new("mock", 16);
        let a = model.embed_text("hello").await.unwrap();
        let b = model.embed_text("hello").await.unwrap();
        let c = model.embed_text("world").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let model = MockEmbeddingModel::new("mock", 4).failing_on("boom");
        assert!(model.embed_text("boom").await.is_err());
        assert!(model.embed_text("fine").await.is_ok());
    }
}
