//! Server initialization and routing
//!
//! Axum router construction with the middleware stack, plus startup and
//! graceful shutdown handling.

use crate::config::AppConfig;
use crate::middleware::{log_requests, request_id};
use crate::routes::{api_info, chat, health, not_found};
use crate::state::AppState;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Build the Axum router with all routes and middleware
///
/// The timeout layer bounds time spent producing the response head; once a
/// chat stream has started, the body is delivered for as long as the model
/// keeps producing fragments.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.server.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let timeout = Duration::from_secs(state.config.server.timeout_secs);

    Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/api/v1/chat", post(chat::chat))
        .fallback(not_found)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(cors)
        .layer(from_fn(request_id))
        .layer(from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
///
/// Initializes tracing, builds shared state (configuration plus the three
/// upstream clients), binds the listener, and serves until SIGTERM or
/// Ctrl+C.
pub async fn start_server(config: AppConfig) -> anyhow::Result<()> {
    init_tracing(&config);

    let addr: SocketAddr = config.socket_addr()?;
    let state = Arc::new(AppState::new(config)?);
    let app = build_router(state.clone());

    tracing::info!(
        "Starting cuppa on {} (embedding model {}, completion model {}, top_k {})",
        addr,
        state.config.embedding.model,
        state.config.completion.model,
        state.config.index.top_k
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if config.server.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
