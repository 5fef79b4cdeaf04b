use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message exchanged with a language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    /// Create a text message stamped with the current time.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Estimate token count for this message.
    /// Uses a simple heuristic: ~4 chars per token for English text.
    pub fn estimate_tokens(&self) -> usize {
        // ~4 tokens of role overhead
        ((self.content.len() + 16) / 4).max(1)
    }
}
