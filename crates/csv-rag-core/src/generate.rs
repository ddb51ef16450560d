//! Prompt assembly and the completion client trait.
//!
//! The prompt is two messages: a fixed system instruction and a user
//! message that embeds the question and the retrieved rows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// System instruction sent with every question.
pub const SYSTEM_PROMPT: &str =
    "You are an intelligent assistant who answers questions based on the provided data.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Build the `[system, user]` message pair for a question.
pub fn build_messages(query: &str, context: &str) -> Vec<ChatMessage> {
    let user = format!("Question: {}\n\nRelevant data:\n{}", query, context);
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// A chat-completion endpoint.
///
/// Implementations return the generated text verbatim and map endpoint
/// failures onto the generation variants of
/// [`RagError`](crate::error::RagError). They do not retry.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send `messages`, authenticating with the caller-supplied `credential`.
    async fn complete(&self, messages: &[ChatMessage], credential: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_shape() {
        let msgs = build_messages("Which fruit is yellow?", "banana | yellow | fruit");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[0].content, SYSTEM_PROMPT);
        assert_eq!(msgs[1].role, "user");
        assert!(msgs[1].content.starts_with("Question: Which fruit is yellow?"));
        assert!(msgs[1]
            .content
            .ends_with("Relevant data:\nbanana | yellow | fruit"));
    }
}
