//! Thread collection and lifecycle.

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info};

use super::snapshot::ThreadSnapshot;
use super::thread::{ChatMessage, ChatThread};
use crate::lang::Language;

/// Owns every live [`ChatThread`] and mediates all access to them.
///
/// One manager serves one user session; deployments with several sessions
/// hold one manager each. Creation order is preserved, so listings render
/// the same way on every read.
#[derive(Debug)]
pub struct ChatManager {
    threads: Vec<ChatThread>,
    active: Option<String>,
    max_threads: usize,
}

impl ChatManager {
    pub fn new(max_threads: usize) -> Self {
        Self {
            threads: Vec::new(),
            active: None,
            max_threads,
        }
    }

    /// Create a thread and make it active.
    ///
    /// An absent or unusable title is replaced with a generated
    /// `Chat N (<timestamp>)` name. Unknown language tags are rejected.
    pub fn create_thread(
        &mut self,
        title: Option<&str>,
        language_tag: &str,
    ) -> Result<&ChatThread, ChatError> {
        let language = Language::from_tag(language_tag)
            .ok_or_else(|| ChatError::InvalidConfig(format!("unsupported language tag: {language_tag:?}")))?;
        self.ensure_capacity()?;

        let title = title
            .map(sanitize_title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.generate_title());

        let thread = ChatThread::new(title, language);
        info!(thread_id = %thread.id(), title = %thread.title, "created thread");
        self.active = Some(thread.id().to_string());
        let index = self.threads.len();
        self.threads.push(thread);
        Ok(&self.threads[index])
    }

    /// Make a thread active, returning it.
    pub fn switch_thread(&mut self, id: &str) -> Result<&ChatThread, ChatError> {
        let thread = find(&self.threads, id)?;
        self.active = Some(id.to_string());
        debug!(thread_id = %id, "switched thread");
        Ok(thread)
    }

    /// The currently active thread, if any.
    pub fn active_thread(&self) -> Option<&ChatThread> {
        let id = self.active.as_deref()?;
        self.threads.iter().find(|t| t.id() == id)
    }

    pub fn thread(&self, id: &str) -> Result<&ChatThread, ChatError> {
        find(&self.threads, id)
    }

    /// All threads, in creation order.
    pub fn threads(&self) -> &[ChatThread] {
        &self.threads
    }

    /// Remove a thread and its history. Deleting an unknown id reports
    /// `NotFound` and leaves every other thread untouched.
    pub fn delete_thread(&mut self, id: &str) -> Result<(), ChatError> {
        let index = self
            .threads
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| ChatError::NotFound(id.to_string()))?;
        self.threads.remove(index);
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        info!(thread_id = %id, "deleted thread");
        Ok(())
    }

    /// Drop all non-system messages from a thread.
    pub fn clear_thread(&mut self, id: &str) -> Result<(), ChatError> {
        find_mut(&mut self.threads, id)?.clear();
        Ok(())
    }

    /// Append a message, preserving conversation order.
    pub fn append_message(&mut self, id: &str, message: ChatMessage) -> Result<(), ChatError> {
        find_mut(&mut self.threads, id)?.push(message);
        Ok(())
    }

    /// Serialize a thread to its snapshot form.
    pub fn export_thread(&self, id: &str) -> Result<String, ChatError> {
        let thread = find(&self.threads, id)?;
        serde_json::to_string_pretty(&ThreadSnapshot::of(thread))
            .map_err(|e| ChatError::MalformedData(e.to_string()))
    }

    /// Reconstruct a thread from a snapshot under a freshly assigned id.
    pub fn import_thread(&mut self, serialized: &str) -> Result<&ChatThread, ChatError> {
        let snapshot: ThreadSnapshot = serde_json::from_str(serialized)
            .map_err(|e| ChatError::MalformedData(e.to_string()))?;
        if !snapshot.is_compatible() {
            return Err(ChatError::MalformedData(format!(
                "unsupported schema version {:?}",
                snapshot.schema_version
            )));
        }
        if !snapshot.has_valid_ordering() {
            return Err(ChatError::MalformedData(
                "message seq markers are not contiguous".to_string(),
            ));
        }
        self.ensure_capacity()?;

        let thread = snapshot.into_thread();
        info!(thread_id = %thread.id(), title = %thread.title, "imported thread");
        self.active = Some(thread.id().to_string());
        let index = self.threads.len();
        self.threads.push(thread);
        Ok(&self.threads[index])
    }

    fn ensure_capacity(&self) -> Result<(), ChatError> {
        if self.threads.len() >= self.max_threads {
            return Err(ChatError::ThreadLimit {
                max: self.max_threads,
            });
        }
        Ok(())
    }

    fn generate_title(&self) -> String {
        let timestamp = Local::now().format("%d.%m.%Y %H:%M");
        format!("Chat {} ({timestamp})", self.threads.len() + 1)
    }
}

fn find<'a>(threads: &'a [ChatThread], id: &str) -> Result<&'a ChatThread, ChatError> {
    threads
        .iter()
        .find(|t| t.id() == id)
        .ok_or_else(|| ChatError::NotFound(id.to_string()))
}

fn find_mut<'a>(threads: &'a mut [ChatThread], id: &str) -> Result<&'a mut ChatThread, ChatError> {
    threads
        .iter_mut()
        .find(|t| t.id() == id)
        .ok_or_else(|| ChatError::NotFound(id.to_string()))
}

fn sanitize_title(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || " -_()".contains(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

// ============================================================================
// ChatError
// ============================================================================

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("thread not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed thread data: {0}")]
    MalformedData(String),

    #[error("thread limit reached ({max} threads)")]
    ThreadLimit { max: usize },
}

// ============================================================================
// Tests
// ============================================================================
