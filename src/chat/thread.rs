//! Thread and message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lang::Language;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a thread. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the message records a failed exchange rather than real
    /// assistant output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// A message annotated with a delivery or upstream failure.
    pub fn with_error(role: Role, content: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// One independently addressable conversation.
///
/// Message storage is private: history grows through [`ChatThread::push`]
/// only, so insertion order is conversation order and nothing is ever
/// reordered or rewritten.
#[derive(Debug, Clone)]
pub struct ChatThread {
    id: String,
    pub title: String,
    pub language: Language,
    pub created_at: DateTime<Utc>,
    messages: Vec<ChatMessage>,
}

impl ChatThread {
    pub(crate) fn new(title: String, language: Language) -> Self {
        Self {
            id: generate_thread_id(),
            title,
            language,
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub(crate) fn with_messages(
        title: String,
        language: Language,
        created_at: DateTime<Utc>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            id: generate_thread_id(),
            title,
            language,
            created_at,
            messages,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Drop everything except system messages.
    pub(crate) fn clear(&mut self) {
        self.messages.retain(|m| m.role == Role::System);
    }
}

fn generate_thread_id() -> String {
    format!("thread_{}", ulid::Ulid::new().to_string().to_lowercase())
}
