//! Shared test doubles for the upstream service boundaries.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cuppa::completion::{CompletionBackend, CompletionError, CompletionStream, StreamAbortError};
use cuppa::config::AppConfig;
use cuppa::embedding::{Embedder, EmbeddingError, EmbeddingVector};
use cuppa::prompt::ChatMessage;
use cuppa::retrieval::{RetrievalError, RetrievalMatch, ReviewMetadata, VectorSearch};
use cuppa::state::AppState;

/// Counting embedder double. Fails with a malformed-response error when
/// constructed via [`StubEmbedder::failing`].
pub struct StubEmbedder {
    pub calls: AtomicUsize,
    fail: bool,
}

impl StubEmbedder {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(EmbeddingError::MalformedResponse(
                "expected a JSON array".to_string(),
            ))
        } else {
            Ok(vec![0.1, 0.2, 0.3])
        }
    }
}

/// Counting index double. Records the last requested K.
pub struct StubIndex {
    pub calls: AtomicUsize,
    pub last_top_k: AtomicUsize,
    matches: Vec<RetrievalMatch>,
    fail: bool,
}

impl StubIndex {
    pub fn with_matches(matches: Vec<RetrievalMatch>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_top_k: AtomicUsize::new(0),
            matches,
            fail: false,
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with_matches(Vec::new())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_top_k: AtomicUsize::new(0),
            matches: Vec::new(),
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorSearch for StubIndex {
    async fn query(
        &self,
        _vector: &EmbeddingVector,
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_top_k.store(top_k, Ordering::SeqCst);
        if self.fail {
            Err(RetrievalError::Status {
                status: 500,
                body: "index unavailable".to_string(),
            })
        } else {
            Ok(self.matches.clone())
        }
    }
}

/// Completion double that records every prompt it receives and replays a
/// fixed fragment sequence.
pub struct StubCompletion {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
    fragments: Vec<Result<String, StreamAbortError>>,
}

impl StubCompletion {
    pub fn with_fragments(fragments: Vec<Result<String, StreamAbortError>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            fragments,
        })
    }

    pub fn echoing(parts: &[&str]) -> Arc<Self> {
        Self::with_fragments(parts.iter().map(|p| Ok(p.to_string())).collect())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompt of the only recorded call.
    pub fn single_prompt(&self) -> Vec<ChatMessage> {
        let prompts = self.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1, "expected exactly one completion call");
        prompts[0].clone()
    }
}

#[async_trait]
impl CompletionBackend for StubCompletion {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<CompletionStream, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(messages.to_vec());
        Ok(Box::pin(futures::stream::iter(self.fragments.clone())))
    }
}

pub fn review_match(name: &str) -> RetrievalMatch {
    RetrievalMatch {
        score: 0.87,
        metadata: ReviewMetadata {
            name: name.to_string(),
            review: "Notes of stone fruit and honey".to_string(),
            origin: "Ethiopia".to_string(),
            rating: "94".to_string(),
            roaster: "Sample Roasters".to_string(),
        },
    }
}

pub fn test_state(
    embedder: Arc<StubEmbedder>,
    index: Arc<StubIndex>,
    completion: Arc<StubCompletion>,
) -> AppState {
    AppState::with_services(AppConfig::default(), embedder, index, completion)
}
