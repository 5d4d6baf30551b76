//! ONNX Runtime backend
//!
//! Session + tokenizer wrapper that produces mean-pooled sentence embeddings.

#[cfg(feature = "onnx")]
pub mod onnx_engine;
#[cfg(feature = "onnx")]
pub use onnx_engine::{OnnxConfig, OnnxEmbeddingEngine};

pub mod pooling;
