//! Embedding client
//!
//! Converts a user utterance into a fixed-dimension vector via the
//! HuggingFace Inference API. A request that fails at the transport level,
//! returns a non-2xx status, or produces anything other than a nonempty
//! numeric array is a hard failure; no retry is attempted here.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Fixed-dimension vector representation of text. Dimensionality is
/// determined by the configured embedding model and constant per deployment.
pub type EmbeddingVector = Vec<f32>;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding service returned an empty vector")]
    EmptyEmbedding,
}

/// Text-to-vector boundary. Implemented by the production HuggingFace
/// client and by test doubles.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError>;
}

/// HuggingFace Inference API client for feature-extraction models.
pub struct HfEmbeddingClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HfEmbeddingClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for HfEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        let url = format!(
            "{}/models/{}",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "inputs": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;
        parse_vector(value)
    }
}

/// Extract the vector from the service response. Accepts a flat numeric
/// array or the single-row nested form some feature-extraction models
/// return; everything else is malformed regardless of HTTP status.
fn parse_vector(value: Value) -> Result<EmbeddingVector, EmbeddingError> {
    let Value::Array(items) = value else {
        return Err(EmbeddingError::MalformedResponse(
            "expected a JSON array".to_string(),
        ));
    };
    if items.is_empty() {
        return Err(EmbeddingError::EmptyEmbedding);
    }

    let row = if items.iter().all(|v| v.is_array()) {
        if items.len() != 1 {
            return Err(EmbeddingError::MalformedResponse(format!(
                "expected a single embedding row, got {}",
                items.len()
            )));
        }
        match items.into_iter().next() {
            Some(Value::Array(row)) => row,
            _ => unreachable!("checked all elements are arrays"),
        }
    } else {
        items
    };

    if row.is_empty() {
        return Err(EmbeddingError::EmptyEmbedding);
    }

    row.into_iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| EmbeddingError::MalformedResponse("non-numeric array element".to_string()))
        })
        .collect()
}
