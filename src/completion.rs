//! Completion streaming relay
//!
//! Opens one streaming chat-completion request (OpenRouter, OpenAI wire
//! format) and relays the incremental text deltas to the caller as a lazy,
//! finite, non-restartable fragment stream.
//!
//! The relay decouples upstream receive from downstream delivery through a
//! bounded channel: a spawned task reads SSE events and sends nonempty
//! deltas onward. A full channel suspends the upstream read (backpressure,
//! nothing is dropped); a dropped receiver stops the task, which drops the
//! in-flight response and aborts the upstream call.

use std::pin::Pin;

use async_trait::async_trait;
use eventsource_stream::{Event, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::prompt::ChatMessage;

/// One nonempty chunk of generated text, in upstream arrival order.
pub type StreamFragment = String;

/// Lazy fragment sequence handed to the transport. An `Err` item means the
/// upstream stream terminated abnormally; the transport must surface that
/// as an aborted response, not a clean close.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamFragment, StreamAbortError>> + Send>>;

/// Failure to open the stream. Surfaces as a request-level error since no
/// output has been sent yet.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Failure after the stream opened. Carried inside the fragment stream
/// because bytes may already be in flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamAbortError {
    #[error("completion stream transport failure: {0}")]
    Transport(String),

    #[error("malformed completion chunk: {0}")]
    MalformedChunk(String),
}

/// Streaming completion boundary. Implemented by the production OpenRouter
/// client and by test doubles.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<CompletionStream, CompletionError>;
}

/// OpenRouter chat-completions client.
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
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

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Bound on in-flight fragments between upstream receive and downstream
/// delivery. Small on purpose: a slow consumer must suspend the upstream
/// read instead of buffering the whole response.
const FRAGMENT_CHANNEL_CAPACITY: usize = 16;

#[async_trait]
impl CompletionBackend for OpenRouterClient {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<CompletionStream, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                stream: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(relay(response.bytes_stream().eventsource()))
    }
}

/// Spawn the relay task over a parsed SSE event stream and return the
/// downstream fragment stream.
///
/// Termination rules:
/// - `data: [DONE]` or natural end of events closes the stream cleanly;
/// - an event-stream error or unparseable chunk emits one `Err` fragment
///   and stops;
/// - a closed receiver stops the task immediately, dropping `events` and
///   with it the upstream connection.
fn relay<S, E>(events: S) -> CompletionStream
where
    S: Stream<Item = Result<Event, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        tokio::pin!(events);
        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => return,
                next = events.next() => next,
            };
            let event = match next {
                Some(Ok(event)) => event,
                Some(Err(err)) => {
                    let _ = tx.send(Err(StreamAbortError::Transport(err.to_string()))).await;
                    return;
                }
                None => return,
            };

            if event.data.trim() == "[DONE]" {
                return;
            }

            let chunk: ChatChunk = match serde_json::from_str(&event.data) {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = tx
                        .send(Err(StreamAbortError::MalformedChunk(err.to_string())))
                        .await;
                    return;
                }
            };

            // Empty or absent deltas are control-only events, not content.
            let Some(content) = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
            else {
                continue;
            };
            if content.is_empty() {
                continue;
            }

            if tx.send(Ok(content)).await.is_err() {
                return;
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}
