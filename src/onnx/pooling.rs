//! Pooling of token embeddings into one sentence vector

use ndarray::ArrayViewD;

use crate::models::EmbeddingError;

/// Apply mean pooling to the token embeddings
///
/// # Arguments
/// * `output_tensor` - Output tensor from the model [batch_size, seq_len, hidden_size]
/// * `attention_mask` - Attention mask indicating which tokens are real (1) vs padding (0)
///
/// # Returns
/// Mean-pooled embedding vector of the first batch row
pub fn mean_pooling(output_tensor: &ArrayViewD<f32>, attention_mask: &[u32]) -> Result<Vec<f32>, EmbeddingError> {
    let shape = output_tensor.shape();
    if shape.len() != 3 {
        return Err(EmbeddingError::EmbeddingFailed {
            error: format!("Expected 3D output tensor, got {}D", shape.len()),
        });
    }

    let seq_len = shape[1];
    let hidden_size = shape[2];

    if attention_mask.len() != seq_len {
        return Err(EmbeddingError::EmbeddingFailed {
            error: format!("Attention mask length {} doesn't match sequence length {}", attention_mask.len(), seq_len),
        });
    }

    let mut pooled = vec![0.0f32; hidden_size];
    let mut valid_tokens = 0;

    for (seq_idx, &mask) in attention_mask.iter().enumerate() {
        if mask == 1 {
            for (hidden_idx, value) in pooled.iter_mut().enumerate() {
                *value += output_tensor[[0, seq_idx, hidden_idx]];
            }
            valid_tokens += 1;
        }
    }

    if valid_tokens == 0 {
        return Err(EmbeddingError::EmbeddingFailed {
            error: "No valid tokens found in attention mask".to_string(),
        });
    }

    for val in &mut pooled {
        *val /= valid_tokens as f32;
    }

    Ok(pooled)
}

/// L2-normalize an embedding. Zero vectors are an error, since they carry no
/// direction to normalize.
pub fn normalize_embedding(embedding: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm == 0.0 {
        return Err(EmbeddingError::EmbeddingFailed {
            error: "Cannot normalize zero vector".to_string(),
        });
    }

    Ok(embedding.iter().map(|x| x / norm).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    fn hidden(seq_len: usize, hidden_size: usize, data: Vec<f32>) -> Array<f32, IxDyn> {
        Array::from_shape_vec(IxDyn(&[1, seq_len, hidden_size]), data).unwrap()
    }

    #[test]
    fn test_mean_pooling_skips_padding() {
        let output = hidden(3, 2, vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0]);
        let pooled = mean_pooling(&output.view(), &[1, 1, 0]).unwrap();
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn test_mean_pooling_rejects_mask_length_mismatch() {
        let output = hidden(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(mean_pooling(&output.view(), &[1]).is_err());
    }

    #[test]
    fn test_mean_pooling_rejects_all_padding() {
        let output = hidden(2, 1, vec![1.0, 2.0]);
        assert!(mean_pooling(&output.view(), &[0, 0]).is_err());
    }

    #[test]
    fn test_mean_pooling_rejects_2d_output() {
        let output = Array::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(mean_pooling(&output.view(), &[1, 1]).is_err());
    }

    #[test]
    fn test_normalize_embedding() {
        let normed = normalize_embedding(&[3.0, 4.0]).unwrap();
        assert!((normed[0] - 0.6).abs() < 1e-6);
        assert!((normed[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert!(normalize_embedding(&[0.0, 0.0]).is_err());
    }
}
