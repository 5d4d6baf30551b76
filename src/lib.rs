//! Embedding Service Library
//!
//! Sentence embeddings over HTTP and over a sentinel-framed stdio protocol

pub mod logging;
pub mod models;
pub mod onnx;
pub mod protocol;
pub mod server;

// Re-exports
pub use models::{Embedding, EmbeddingError, EmbeddingModel, ModelCache, ModelLoader};
pub use server::{start_hyper_http_server, ServerConfig, StdioConfig, StdioServer};
pub use protocol::FramedResponse;
