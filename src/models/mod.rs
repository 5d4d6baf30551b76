//! Embedding models: the model trait, the loader seam and the process-wide cache

pub mod cache;
pub mod config;
pub mod mock;
pub mod model;
pub mod precision;
pub mod subprocess;

// Re-exports
pub use cache::ModelCache;
pub use config::ModelsConfig;
pub use model::{EmbeddingModel, ModelInfo, ModelLoader};
pub use precision::Precision;
pub use subprocess::{SubprocessConfig, SubprocessEmbeddingModel};

#[cfg(feature = "onnx")]
pub use model::onnx::{OnnxEmbeddingModel, OnnxModelLoader};

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Result type for embedding models operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Errors that can occur in embedding models operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model not found: {model_name}")]
    ModelNotFound { model_name: String },

    #[error("Model loading failed: {model_name} - {error}")]
    ModelLoadError { model_name: String, error: String },

    #[error("Model load failed: {error}")]
    ModelLoadFailed { error: String },

    #[error("Inference failed: {model_name} - {error}")]
    InferenceError { model_name: String, error: String },

    #[error("Embedding failed: {error}")]
    EmbeddingFailed { error: String },

    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    #[error("IO error: {error}")]
    IoError { error: std::io::Error },

    #[error("JSON error: {error}")]
    JsonError { error: serde_json::Error },
}

impl From<std::io::Error> for EmbeddingError {
    fn from(error: std::io::Error) -> Self {
        EmbeddingError::IoError { error }
    }
}

impl From<serde_json::Error> for EmbeddingError {
    fn from(error: serde_json::Error) -> Self {
        EmbeddingError::JsonError { error }
    }
}

#[cfg(feature = "onnx")]
impl From<ort::Error> for EmbeddingError {
    fn from(error: ort::Error) -> Self {
        EmbeddingError::ModelLoadFailed { error: error.to_string() }
    }
}
