//! Service configuration
//!
//! Loaded once at startup from an optional `cuppa.toml` file, overridden by
//! `CUPPA_*` environment variables (a `.env` file is honored in
//! development). Upstream credentials are read here and treated as
//! immutable for the process lifetime; missing credentials fail startup,
//! never individual requests.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prompt;
use crate::retrieval::MAX_TOP_K;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub completion: CompletionSettings,

    /// System instruction sent as the first message of every prompt.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bounds time to the first response byte, not body streaming.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub api_key: String,

    /// Query URL of the index, e.g. `https://reviews-abc123.svc.pinecone.io`.
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// When true, a retrieval failure aborts the request like an embedding
    /// failure. Default is to degrade gracefully and answer without
    /// grounded context.
    #[serde(default)]
    pub retrieval_required: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionSettings {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
            completion: CompletionSettings::default(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            host: String::new(),
            namespace: String::new(),
            top_k: default_top_k(),
            retrieval_required: false,
        }
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_completion_model(),
            base_url: default_completion_base_url(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `cuppa.toml` (if present) and the
    /// environment, then validate it.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("cuppa").required(false))
            .add_source(config::Environment::with_prefix("CUPPA").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot serve a single request.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.embedding.api_key.is_empty() {
            anyhow::bail!("embedding.api_key is not set");
        }
        if self.index.api_key.is_empty() {
            anyhow::bail!("index.api_key is not set");
        }
        if self.index.host.is_empty() {
            anyhow::bail!("index.host is not set");
        }
        if self.completion.api_key.is_empty() {
            anyhow::bail!("completion.api_key is not set");
        }
        if self.index.top_k == 0 || self.index.top_k > MAX_TOP_K {
            anyhow::bail!("index.top_k must be between 1 and {MAX_TOP_K}");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.bind_addr, self.server.port);
        Ok(addr.parse()?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs)
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_top_k() -> usize {
    MAX_TOP_K
}

fn default_completion_model() -> String {
    "meta-llama/llama-3.1-8b-instruct:free".to_string()
}

fn default_completion_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_system_prompt() -> String {
    prompt::DEFAULT_SYSTEM_PROMPT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.timeout_secs, 30);
        assert_eq!(cfg.index.top_k, 5);
        assert!(!cfg.index.retrieval_required);
        assert!(cfg.server.enable_cors);
        assert_eq!(cfg.system_prompt, prompt::DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_socket_addr() {
        let cfg = AppConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_excessive_top_k() {
        let mut cfg = AppConfig::default();
        cfg.embedding.api_key = "k".to_string();
        cfg.index.api_key = "k".to_string();
        cfg.index.host = "https://example.test".to_string();
        cfg.completion.api_key = "k".to_string();
        cfg.index.top_k = 50;
        assert!(cfg.validate().is_err());

        cfg.index.top_k = 5;
        assert!(cfg.validate().is_ok());
    }
}
