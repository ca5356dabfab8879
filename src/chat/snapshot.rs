//! Thread snapshot schema for export/import.
//!
//! Snapshots are JSON documents carrying a complete thread history. They are
//! the only persistence boundary of the core; where the serialized text is
//! stored is the front-end's concern. Every message record carries an
//! explicit `seq` marker so a reordered or truncated document is rejected
//! instead of silently reorganized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::thread::{ChatMessage, ChatThread};
use crate::lang::Language;

/// A serializable snapshot of one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    /// Schema version for forward compatibility.
    pub schema_version: String,
    pub title: String,
    pub language: Language,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<SnapshotMessage>,
}

/// One message record; `seq` is the zero-based conversation position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMessage {
    pub seq: u64,
    #[serde(flatten)]
    pub message: ChatMessage,
}

impl ThreadSnapshot {
    /// Current schema version.
    pub const SCHEMA_VERSION: &'static str = "1";

    pub fn of(thread: &ChatThread) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION.to_string(),
            title: thread.title.clone(),
            language: thread.language,
            created_at: thread.created_at,
            messages: thread
                .messages()
                .iter()
                .enumerate()
                .map(|(i, m)| SnapshotMessage {
                    seq: i as u64,
                    message: m.clone(),
                })
                .collect(),
        }
    }

    pub fn is_compatible(&self) -> bool {
        self.schema_version == Self::SCHEMA_VERSION
    }

    /// Check that `seq` markers are contiguous from zero.
    pub fn has_valid_ordering(&self) -> bool {
        self.messages
            .iter()
            .enumerate()
            .all(|(i, m)| m.seq == i as u64)
    }

    /// Rebuild a thread under a freshly generated identifier.
    pub(crate) fn into_thread(self) -> ChatThread {
        ChatThread::with_messages(
            self.title,
            self.language,
            self.created_at,
            self.messages.into_iter().map(|m| m.message).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::thread::Role;

    fn sample_thread() -> ChatThread {
        let mut thread = ChatThread::new("Trip planning".into(), Language::En);
        thread.push(ChatMessage::new(Role::System, "You are a helpful AI assistant."));
        thread.push(ChatMessage::new(Role::User, "Hello"));
        thread.push(ChatMessage::new(Role::Assistant, "Hi there"));
        thread
    }

    #[test]
    fn snapshot_roundtrip_preserves_order_and_content() {
        let thread = sample_thread();
        let snapshot = ThreadSnapshot::of(&thread);
        let json = serde_json::to_string_pretty(&snapshot).unwrap();

        let parsed: ThreadSnapshot = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_compatible());
        assert!(parsed.has_valid_ordering());

        let restored = parsed.into_thread();
        assert_ne!(restored.id(), thread.id());
        let original: Vec<_> = thread
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect();
        let roundtripped: Vec<_> = restored
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone()))
            .collect();
        assert_eq!(original, roundtripped);
    }

    #[test]
    fn snapshot_is_deterministic() {
        let thread = sample_thread();
        let a = serde_json::to_string(&ThreadSnapshot::of(&thread)).unwrap();
        let b = serde_json::to_string(&ThreadSnapshot::of(&thread)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_contiguous_seq_is_invalid() {
        let mut snapshot = ThreadSnapshot::of(&sample_thread());
        snapshot.messages[2].seq = 7;
        assert!(!snapshot.has_valid_ordering());

        let mut swapped = ThreadSnapshot::of(&sample_thread());
        swapped.messages.swap(1, 2);
        assert!(!swapped.has_valid_ordering());
    }

    #[test]
    fn old_schema_version_is_incompatible() {
        let mut snapshot = ThreadSnapshot::of(&sample_thread());
        snapshot.schema_version = "0".to_string();
        assert!(!snapshot.is_compatible());
    }
}
