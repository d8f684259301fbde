//! Prompt assembly
//!
//! Pure, deterministic construction of the message sequence sent to the
//! completion service: system instruction first, then the caller's
//! conversation history in original order, then (only when retrieval
//! produced something) one trailing system message carrying the grounded
//! context. Identical inputs always yield identical output.

use serde::{Deserialize, Serialize};

use crate::retrieval::RetrievalMatch;

/// Default persona for the assistant. Overridable via `system_prompt` in
/// the configuration.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly AI assistant with access to 1.2k coffee reviews. \
Your role is to recommend coffees based on user preferences like flavor notes (e.g., fruity, nutty), \
roast level (light, medium, dark), origin, and other useful information. Start by asking about their \
preferences, then search the database to suggest a few matching options, including brief descriptions. \
Offer additional details like origin, tasting notes, and user ratings. Maintain a warm, approachable tone, \
and ask follow-up questions if needed to refine your recommendations. Your responses should be short and concise.";

/// Conversation message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of the conversation. Immutable once built; order within the
/// sequence is semantically significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Format retrieved matches into the grounded-context text block.
///
/// One block per match (name, review, origin, rating, roaster), blocks
/// separated by a blank line. Match order is preserved as returned by the
/// index. An empty slice yields an empty string.
pub fn format_matches(matches: &[RetrievalMatch]) -> String {
    let blocks: Vec<String> = matches
        .iter()
        .map(|m| {
            format!(
                "Coffee: {}\nReview: {}\nOrigin: {}\nRating: {}\nRoaster: {}",
                m.metadata.name, m.metadata.review, m.metadata.origin, m.metadata.rating, m.metadata.roaster
            )
        })
        .collect();
    blocks.join("\n\n")
}

/// Assemble the ordered message sequence for the completion service.
///
/// Order is fixed: system instruction, then `history` unchanged, then one
/// system message with the grounded context appended last — only when
/// `grounded` is present and nonempty.
pub fn assemble(
    system_instruction: &str,
    history: &[ChatMessage],
    grounded: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_instruction));
    messages.extend(history.iter().cloned());
    if let Some(context) = grounded.filter(|c| !c.is_empty()) {
        messages.push(ChatMessage::system(format!(
            "The following information was retrieved from the review database:\n\n{context}"
        )));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::ReviewMetadata;

    fn sample_match(name: &str) -> RetrievalMatch {
        RetrievalMatch {
            score: 0.9,
            metadata: ReviewMetadata {
                name: name.to_string(),
                review: "Bright and fruity".to_string(),
                origin: "Ethiopia".to_string(),
                rating: "93".to_string(),
                roaster: "Test Roastery".to_string(),
            },
        }
    }

    #[test]
    fn assemble_orders_system_history_context() {
        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("recommend a coffee"),
        ];
        let messages = assemble("persona", &history, Some("some context"));

        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], ChatMessage::system("persona"));
        assert_eq!(messages[1..4], history[..]);
        assert_eq!(messages[4].role, Role::System);
        assert!(messages[4].content.ends_with("some context"));
    }

    #[test]
    fn assemble_skips_empty_context() {
        let history = vec![ChatMessage::user("hi")];
        assert_eq!(assemble("p", &history, None).len(), 2);
        assert_eq!(assemble("p", &history, Some("")).len(), 2);
    }

    #[test]
    fn assemble_is_deterministic() {
        let history = vec![ChatMessage::user("question")];
        let a = assemble("p", &history, Some("ctx"));
        let b = assemble("p", &history, Some("ctx"));
        assert_eq!(a, b);
    }

    #[test]
    fn format_matches_blocks_separated_by_blank_line() {
        let matches = vec![sample_match("A"), sample_match("B")];
        let text = format_matches(&matches);
        let blocks: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("Coffee: A\n"));
        assert!(blocks[1].starts_with("Coffee: B\n"));
        assert!(blocks[0].contains("Rating: 93"));
    }

    #[test]
    fn format_matches_empty_is_empty() {
        assert_eq!(format_matches(&[]), "");
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = ChatMessage::user("x");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
    }
}
