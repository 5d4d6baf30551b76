//! HTTP REST API Protocol
//!
//! - `POST /embedding` with `{"text": "...", "model_name": "..."}`
//! - Response body: `{"embedding": [0.1, 0.2, 0.3, ...]}`
//! - Client errors: `{"error": "..."}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TEXT_REQUIRED: &str = "text parameter is required";
pub const MODEL_NAME_REQUIRED: &str = "model_name parameter is required";

/// HTTP Embedding Request
///
/// Both fields are required, but are optional here so that a missing field
/// becomes a 400 with a specific message instead of a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpEmbedRequest {
    /// Text to embed
    #[serde(default)]
    pub text: Option<String>,

    /// Model identifier
    #[serde(default)]
    pub model_name: Option<String>,
}

impl HttpEmbedRequest {
    /// Parse a request body field by field. A field that is absent, `null`
    /// or not a string counts as missing on its own. Bodies that are not a
    /// JSON object parse as an empty request, which then fails validation
    /// on `text`.
    pub fn from_body(body: &[u8]) -> Self {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(_) => return Self::default(),
        };
        let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            text: field("text"),
            model_name: field("model_name"),
        }
    }

    /// Validate the request, returning `(text, model_name)`.
    pub fn validate(&self) -> Result<(&str, &str), HttpErrorResponse> {
        let Some(text) = self.text.as_deref() else {
            return Err(HttpErrorResponse::new(TEXT_REQUIRED));
        };
        match self.model_name.as_deref() {
            Some(model_name) => Ok((text, model_name)),
            None => Err(HttpErrorResponse::new(MODEL_NAME_REQUIRED)),
        }
    }
}

/// HTTP Embedding Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpEmbedResponse {
    /// The embedding vector
    pub embedding: Vec<f32>,
}

impl HttpEmbedResponse {
    pub fn new(embedding: Vec<f32>) -> Self {
        Self { embedding }
    }
}

/// HTTP Error Response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error message
    pub error: String,
}

impl HttpErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }

    pub fn not_found() -> Self {
        Self::new("Not Found")
    }
}
