//! # ONNX Embedding Engine
//!
//! Embedding generation using ONNX Runtime and a HuggingFace tokenizer.
//! Sentence-transformers exports (all-MiniLM-L6-v2, paraphrase-MiniLM-L3-v2,
//! ...) produce `last_hidden_state`, which is mean-pooled over real tokens
//! and optionally L2-normalized.
//!
//! Sessions always run on the CPU execution provider.

use std::path::Path;

use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, instrument};

use crate::models::config::ModelsConfig;
use crate::models::EmbeddingError;
use crate::onnx::pooling::{mean_pooling, normalize_embedding};

/// Configuration for ONNX Runtime sessions
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// Thread pool size for inference
    pub thread_pool_size: usize,
    /// Tokens beyond this are truncated
    pub max_seq_length: usize,
    /// L2-normalize pooled vectors
    pub normalize: bool,
}

impl OnnxConfig {
    pub fn from_models_config(config: &ModelsConfig) -> Self {
        Self {
            thread_pool_size: config.intra_threads.max(1),
            max_seq_length: config.max_sequence_length,
            normalize: config.normalize,
        }
    }
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self::from_models_config(&ModelsConfig::default())
    }
}

/// ONNX-based embedding engine for generating text embeddings
#[derive(Debug)]
pub struct OnnxEmbeddingEngine {
    /// ONNX Runtime session for model inference
    session: Session,
    /// HuggingFace tokenizer for text preprocessing
    tokenizer: Tokenizer,
    /// Whether the graph declares a `token_type_ids` input
    wants_token_type_ids: bool,
    config: OnnxConfig,
}

impl OnnxEmbeddingEngine {
    /// Create a new ONNX embedding engine
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file (model.onnx)
    /// * `tokenizer_path` - Path to the tokenizer configuration file (tokenizer.json)
    /// * `onnx_config` - ONNX Runtime configuration
    pub fn new(model_path: &Path, tokenizer_path: &Path, onnx_config: &OnnxConfig) -> Result<Self, EmbeddingError> {
        info!("Initializing ONNX embedding engine with model: {}", model_path.display());

        let session = Session::builder()?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_config.thread_pool_size)?
            .commit_from_file(model_path)
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                error: format!("Failed to load ONNX model: {}", e),
            })?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                error: format!("Failed to load tokenizer: {}", e),
            })?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: onnx_config.max_seq_length,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                error: format!("Failed to configure truncation: {}", e),
            })?;
        tokenizer.with_padding(None);

        let wants_token_type_ids = session.inputs.iter().any(|i| i.name == "token_type_ids");

        info!("ONNX embedding engine initialized with {} threads", onnx_config.thread_pool_size);
        Ok(Self {
            session,
            tokenizer,
            wants_token_type_ids,
            config: onnx_config.clone(),
        })
    }

    /// Generate the embedding for one text
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn embed_text(&mut self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let encoding = self.tokenizer.encode(text, true)
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Tokenization failed: {}", e),
            })?;

        let attention_mask = encoding.get_attention_mask();
        let input_ids_vec: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let attention_mask_vec: Vec<i64> = attention_mask.iter().map(|&x| x as i64).collect();
        let seq_len = input_ids_vec.len() as i64;

        let input_ids_tensor = Tensor::from_array(([1i64, seq_len], input_ids_vec))
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Failed to create input_ids tensor: {}", e),
            })?;

        let attention_mask_tensor = Tensor::from_array(([1i64, seq_len], attention_mask_vec))
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Failed to create attention_mask tensor: {}", e),
            })?;

        let mut inputs = vec![
            ("input_ids", input_ids_tensor),
            ("attention_mask", attention_mask_tensor),
        ];
        if self.wants_token_type_ids {
            // single sequence, all zeros
            let token_type_ids_tensor = Tensor::from_array(([1i64, seq_len], vec![0i64; seq_len as usize]))
                .map_err(|e| EmbeddingError::EmbeddingFailed {
                    error: format!("Failed to create token_type_ids tensor: {}", e),
                })?;
            inputs.push(("token_type_ids", token_type_ids_tensor));
        }

        let outputs = self.session.run(inputs)
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("ONNX inference failed: {}", e),
            })?;

        let (shape, data) = outputs["last_hidden_state"]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Failed to extract output tensor: {}", e),
            })?;

        let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
        let output_array = ndarray::ArrayView::from_shape(dims.as_slice(), data)
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Failed to create output array view: {:?}", e),
            })?;

        let embedding = mean_pooling(&output_array, attention_mask)?;
        let embedding = if self.config.normalize {
            normalize_embedding(&embedding)?
        } else {
            embedding
        };

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }
}
