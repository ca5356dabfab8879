//! Transforms between thread histories and completion API payloads.

use thiserror::Error;

use crate::chat::{ChatMessage, ChatThread, Role};
use crate::config::Config;
use crate::lang::{self, Language};
use crate::llm::{ApiError, CompletionRequest, CompletionResponse, WireMessage};

/// Rejected user input.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("message is empty")]
    Empty,

    #[error("message is {len} characters, maximum is {max}")]
    TooLong { len: usize, max: usize },
}

/// The default system message for a thread's language.
pub fn system_message(language: Language) -> ChatMessage {
    ChatMessage::new(Role::System, lang::system_prompt(language))
}

/// Build the outbound payload for one new user turn.
///
/// History selection keeps every system message (falling back to the
/// language's default prompt when the thread has none), then the most
/// recent `max_history` non-system turns with the oldest dropped first,
/// then the new user text. Error-annotated messages never travel: they
/// record local failures, not conversation content.
pub fn build_request(
    thread: &ChatThread,
    new_user_text: &str,
    config: &Config,
) -> Result<CompletionRequest, ValidationError> {
    let text = new_user_text.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }
    let len = new_user_text.chars().count();
    if len > config.limits.max_message_len {
        return Err(ValidationError::TooLong {
            len,
            max: config.limits.max_message_len,
        });
    }

    let mut messages: Vec<WireMessage> = thread
        .messages()
        .iter()
        .filter(|m| m.role == Role::System)
        .map(wire)
        .collect();
    if messages.is_empty() {
        messages.push(WireMessage {
            role: Role::System,
            content: lang::system_prompt(thread.language).to_string(),
        });
    }

    let history: Vec<&ChatMessage> = thread
        .messages()
        .iter()
        .filter(|m| m.role != Role::System && m.error.is_none())
        .collect();
    let start = history.len().saturating_sub(config.limits.max_history);
    messages.extend(history[start..].iter().map(|m| wire(m)));

    messages.push(WireMessage {
        role: Role::User,
        content: text.to_string(),
    });

    Ok(CompletionRequest {
        model: config.api.model.clone(),
        messages,
        temperature: Some(config.params.temperature),
        max_tokens: Some(config.params.max_tokens),
        top_p: Some(config.params.top_p),
        top_k: Some(config.params.top_k),
        repetition_penalty: Some(config.params.repetition_penalty),
        stream: false,
    })
}

/// Extract the assistant message from a raw upstream result.
///
/// A structurally invalid payload is an error; a structurally valid but
/// empty completion becomes an error-annotated message, so the history
/// still records the attempt.
pub fn parse_response(raw: serde_json::Value) -> Result<ChatMessage, ApiError> {
    let response: CompletionResponse =
        serde_json::from_value(raw).map_err(|e| ApiError::UpstreamFormat(e.to_string()))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::UpstreamFormat("response has no choices".to_string()))?;

    let content = choice.message.content;
    if content.trim().is_empty() {
        return Ok(ChatMessage::with_error(
            Role::Assistant,
            content,
            "upstream returned an empty completion",
        ));
    }
    Ok(ChatMessage::new(Role::Assistant, content))
}

fn wire(message: &ChatMessage) -> WireMessage {
    WireMessage {
        role: message.role,
        content: message.content.clone(),
    }
}
