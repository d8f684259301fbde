//! Retrieval engine
//!
//! Queries a namespace-scoped Pinecone-style similarity index with a query
//! vector and returns the top-K matches with full review metadata. Match
//! order is exactly the index's order; no client-side re-ranking. Zero
//! matches is a valid, empty result.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::embedding::EmbeddingVector;

/// Hard ceiling on the number of matches requested per query.
pub const MAX_TOP_K: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("index query failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("index returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed index response: {0}")]
    MalformedResponse(String),
}

/// Per-match review metadata as stored in the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub origin: String,
    /// Ratings are stored as numbers by some ingest paths and as strings
    /// by others; accept both.
    #[serde(default, deserialize_with = "string_or_number")]
    pub rating: String,
    #[serde(default)]
    pub roaster: String,
}

/// One scored match from the index, in the index's intrinsic order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMatch {
    pub score: f32,
    #[serde(default)]
    pub metadata: ReviewMetadata,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Vector similarity search boundary. Implemented by the production
/// Pinecone client and by test doubles.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn query(
        &self,
        vector: &EmbeddingVector,
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>, RetrievalError>;
}

/// Pinecone index client scoped to one namespace.
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    namespace: String,
}

impl PineconeIndex {
    pub fn new(
        client: Client,
        host: impl Into<String>,
        api_key: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            client,
            host: host.into(),
            api_key: api_key.into(),
            namespace: namespace.into(),
        }
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RetrievalMatch>,
}

#[async_trait]
impl VectorSearch for PineconeIndex {
    async fn query(
        &self,
        vector: &EmbeddingVector,
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>, RetrievalError> {
        let url = format!("{}/query", self.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&QueryRequest {
                vector,
                top_k: top_k.min(MAX_TOP_K),
                include_metadata: true,
                namespace: &self.namespace,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| RetrievalError::MalformedResponse(e.to_string()))?;
        Ok(parsed.matches)
    }
}
