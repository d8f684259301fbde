//! API route handlers
//!
//! - `health`: liveness and readiness probes
//! - `chat`: the grounded streaming chat endpoint

pub mod chat;
pub mod health;

use crate::error::{ServerError, ServerResult};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API version and base info (GET /, no authentication)
pub async fn api_info() -> ServerResult<impl IntoResponse> {
    Ok(Json(json!({
        "name": "Cuppa",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1",
        "endpoints": [
            "/api/v1/chat",
            "/health",
            "/ready"
        ]
    })))
}

/// 404 Not Found handler for undefined routes
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
