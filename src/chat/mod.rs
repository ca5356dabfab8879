//! Conversation threads and their manager.

mod manager;
mod snapshot;
mod thread;

pub use manager::{ChatError, ChatManager};
pub use snapshot::ThreadSnapshot;
pub use thread::{ChatMessage, ChatThread, Role};
