//! Request orchestration
//!
//! Sequences the pipeline for one chat request: latest utterance →
//! embedding → retrieval → prompt assembly → completion stream. Stages run
//! strictly in order; each stage's output feeds the next. Embedding and
//! retrieval failures happen before any output byte is sent and map to a
//! request-level error; failures inside the completion stream are handled
//! by the relay's abort semantics instead.

use crate::completion::{CompletionError, CompletionStream};
use crate::embedding::EmbeddingError;
use crate::prompt::{self, ChatMessage};
use crate::retrieval::RetrievalError;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("completion request failed: {0}")]
    Completion(#[from] CompletionError),
}

/// Run the full pipeline and return the live fragment stream.
///
/// An absent or empty latest utterance skips embedding and retrieval
/// entirely and proceeds ungrounded; that is a valid conversational turn,
/// not an error.
pub async fn run_chat(
    state: &AppState,
    history: &[ChatMessage],
) -> Result<CompletionStream, PipelineError> {
    let grounded = match latest_utterance(history) {
        Some(utterance) => fetch_grounding(state, utterance).await?,
        None => None,
    };

    let messages = prompt::assemble(&state.config.system_prompt, history, grounded.as_deref());
    let stream = state.completion.stream_chat(&messages).await?;
    Ok(stream)
}

/// Content of the last conversation turn, if nonempty after trimming.
fn latest_utterance(history: &[ChatMessage]) -> Option<&str> {
    let content = history.last()?.content.trim();
    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

/// Embed the utterance and query the index once each, returning the
/// formatted context block. A retrieval failure degrades to no grounding
/// unless `index.retrieval_required` is set.
async fn fetch_grounding(state: &AppState, utterance: &str) -> Result<Option<String>, PipelineError> {
    let vector = state.embedder.embed(utterance).await?;

    let matches = match state.index.query(&vector, state.config.index.top_k).await {
        Ok(matches) => matches,
        Err(err) if !state.config.index.retrieval_required => {
            tracing::warn!(error = %err, "retrieval failed; answering without grounded context");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };

    if matches.is_empty() {
        tracing::debug!("index returned no matches for utterance");
        return Ok(None);
    }

    Ok(Some(prompt::format_matches(&matches)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ChatMessage;

    #[test]
    fn latest_utterance_trims_whitespace() {
        let history = vec![ChatMessage::user("  hello  ")];
        assert_eq!(latest_utterance(&history), Some("hello"));
    }

    #[test]
    fn latest_utterance_empty_or_absent_is_none() {
        assert_eq!(latest_utterance(&[]), None);
        let blank = vec![ChatMessage::user("   ")];
        assert_eq!(latest_utterance(&blank), None);
    }

    #[test]
    fn latest_utterance_uses_last_turn_only() {
        let history = vec![ChatMessage::user("first"), ChatMessage::assistant("second")];
        assert_eq!(latest_utterance(&history), Some("second"));
    }
}
