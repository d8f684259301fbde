//! Streaming chat endpoint
//!
//! Accepts the full conversation history and responds with a chunked
//! stream of raw UTF-8 text fragments, written in the order the completion
//! service produces them. A pipeline failure before the stream opens maps
//! to a non-200 JSON error; a mid-stream abort becomes a body error, which
//! terminates the connection so the caller can distinguish truncation from
//! a clean close.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures::TryStreamExt;
use serde::Deserialize;

use crate::error::{ServerError, ServerResult};
use crate::pipeline;
use crate::prompt::ChatMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> ServerResult<Response> {
    if request.messages.is_empty() {
        return Err(ServerError::BadRequest(
            "messages must not be empty".to_string(),
        ));
    }

    let stream = pipeline::run_chat(&state, &request.messages).await?;
    let body = Body::from_stream(stream.map_ok(Bytes::from));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}
