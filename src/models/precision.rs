//! Numeric precision of served embeddings

use half::bf16;
use serde::{Deserialize, Serialize};

/// Precision a model's outputs are served at.
///
/// `BFloat16` keeps the f32 exponent range and an 8-bit mantissa, halving the
/// information carried per value. Values are rounded after inference; the
/// model still computes in f32. Once a model is switched to it, there is no
/// way back for that handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Full,
    BFloat16,
}

impl Precision {
    /// Apply this precision to a freshly computed vector in place.
    pub fn apply(self, embedding: &mut [f32]) {
        if self == Precision::BFloat16 {
            for value in embedding.iter_mut() {
                *value = round_to_bf16(*value);
            }
        }
    }
}

/// Round an f32 to the nearest bfloat16, returned widened back to f32.
pub fn round_to_bf16(value: f32) -> f32 {
    bf16::from_f32(value).to_f32()
}
