//! Confab - a minimal chat-session core with rate-limited LLM dispatch.
//!
//! The crate owns three things: conversation threads and their append-only
//! histories ([`chat`]), the transform between histories and completion API
//! payloads ([`handler`]), and the dispatch of those payloads under a
//! rolling-window rate limit with bounded retries ([`llm`]). Rendering and
//! persistence of exported threads belong to the embedding front-end.

pub mod chat;
pub mod config;
pub mod handler;
pub mod lang;
pub mod llm;
