//! Configuration for locating and running embedding models
//!
//! Models are resolved by identifier under `models_dir`: the identifier
//! `all-MiniLM-L6-v2` maps to `models/all-MiniLM-L6-v2/model.onnx` and
//! `models/all-MiniLM-L6-v2/tokenizer.json`. Identifiers may contain `/`
//! (e.g. `sentence-transformers/all-MiniLM-L6-v2`) and map to nested
//! directories.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::models::{EmbeddingError, EmbeddingResult};

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

fn default_models_dir() -> String {
    "models".to_string()
}

fn default_intra_threads() -> usize {
    4
}

fn default_max_sequence_length() -> usize {
    256
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    /// Root directory that model identifiers resolve under
    #[serde(default = "default_models_dir")]
    pub models_dir: String,
    /// ONNX Runtime intra-op thread count
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
    /// Inputs are truncated to this many tokens
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
    /// L2-normalize pooled vectors
    #[serde(default = "default_true")]
    pub normalize: bool,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            intra_threads: default_intra_threads(),
            max_sequence_length: default_max_sequence_length(),
            normalize: true,
        }
    }
}

/// Files backing one model on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl ModelsConfig {
    /// Map a model identifier to its files under `models_dir`.
    ///
    /// Identifiers that are empty, absolute, or try to leave `models_dir`
    /// resolve to `ModelNotFound`.
    pub fn resolve(&self, model_name: &str) -> EmbeddingResult<ModelFiles> {
        let relative = Path::new(model_name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if model_name.trim().is_empty() || escapes {
            return Err(EmbeddingError::ModelNotFound {
                model_name: model_name.to_string(),
            });
        }

        let dir = Path::new(&self.models_dir).join(relative);
        Ok(ModelFiles {
            model_path: dir.join(MODEL_FILE),
            tokenizer_path: dir.join(TOKENIZER_FILE),
        })
    }
}
