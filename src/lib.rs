//! Cuppa - streaming retrieval-augmented chat over coffee reviews
//!
//! This crate serves one job: answer a natural-language question about
//! coffee by grounding a generative model in the nearest stored reviews and
//! streaming the answer back as it is produced.
//!
//! Per request the pipeline runs strictly in sequence:
//!
//! 1. **Embedding** ([`embedding`]): latest user utterance → vector, via
//!    the HuggingFace Inference API.
//! 2. **Retrieval** ([`retrieval`]): vector → top-K review matches from a
//!    namespace-scoped Pinecone index.
//! 3. **Assembly** ([`prompt`]): system instruction + history + optional
//!    grounded context, deterministically ordered.
//! 4. **Relay** ([`completion`]): streaming chat completion (OpenRouter),
//!    fragments forwarded in arrival order with backpressure and
//!    cancellation propagation.
//!
//! [`pipeline`] sequences the stages; [`server`] and [`routes`] expose the
//! HTTP surface. All upstream handles are injected through [`state`], so
//! tests substitute doubles per request.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use cuppa::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     cuppa::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `POST /api/v1/chat` - Grounded streaming chat (chunked UTF-8 text)

pub mod completion;
pub mod config;
pub mod embedding;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod prompt;
pub mod retrieval;
pub mod routes;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::AppState;
