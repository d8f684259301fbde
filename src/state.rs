use std::sync::Arc;
use std::time::Duration;

use crate::completion::{CompletionBackend, OpenRouterClient};
use crate::config::AppConfig;
use crate::embedding::{Embedder, HfEmbeddingClient};
use crate::retrieval::{PineconeIndex, VectorSearch};

/// Shared application state
///
/// Holds the read-only configuration and the three upstream service
/// handles. Constructed once at startup; every field is behind an `Arc`,
/// so cloning is cheap and nothing here is mutated after construction.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,

    pub embedder: Arc<dyn Embedder>,

    pub index: Arc<dyn VectorSearch>,

    pub completion: Arc<dyn CompletionBackend>,
}

impl AppState {
    /// Build production state: one shared connection pool across all three
    /// upstream clients.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let embedder = Arc::new(HfEmbeddingClient::new(
            client.clone(),
            config.embedding.base_url.clone(),
            config.embedding.api_key.clone(),
            config.embedding.model.clone(),
        ));

        let index = Arc::new(PineconeIndex::new(
            client.clone(),
            config.index.host.clone(),
            config.index.api_key.clone(),
            config.index.namespace.clone(),
        ));

        let completion = Arc::new(OpenRouterClient::new(
            client,
            config.completion.base_url.clone(),
            config.completion.api_key.clone(),
            config.completion.model.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            embedder,
            index,
            completion,
        })
    }

    /// Assemble state from explicit service handles. Used by tests to
    /// substitute doubles for the upstream clients.
    pub fn with_services(
        config: AppConfig,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorSearch>,
        completion: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            embedder,
            index,
            completion,
        }
    }
}
