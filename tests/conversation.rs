//! End-to-end conversation flow over a scripted transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use confab::chat::{ChatManager, ChatMessage, Role};
use confab::config::Config;
use confab::handler;
use confab::llm::{ApiClient, ApiError, CompletionRequest, RateLimiter, Transport, TransportError};

struct QueueTransport {
    replies: Mutex<VecDeque<Result<serde_json::Value, TransportError>>>,
}

impl QueueTransport {
    fn new(replies: Vec<Result<serde_json::Value, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl Transport for QueueTransport {
    async fn dispatch(
        &self,
        _request: &CompletionRequest,
    ) -> Result<serde_json::Value, TransportError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Timeout))
    }
}

fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "API_KEY" => Some("sk-test".to_string()),
        "RETRY_BASE_DELAY_MS" => Some("1".to_string()),
        "RETRY_MAX_DELAY_MS" => Some("2".to_string()),
        _ => None,
    })
    .unwrap()
}

fn assistant_reply(text: &str) -> serde_json::Value {
    json!({
        "id": "cmpl-1",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}
        ]
    })
}

fn client(config: &Config, transport: Arc<dyn Transport>) -> ApiClient {
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.ceiling,
        Duration::from_secs(60),
        false,
    ));
    ApiClient::new(transport, limiter, config.retry.clone())
}

/// One full turn: the user says "Hello", the upstream answers "Hi there",
/// and the thread history ends up as exactly that exchange.
#[tokio::test]
async fn hello_turn_roundtrip() {
    let config = test_config();
    let transport = QueueTransport::new(vec![Ok(assistant_reply("Hi there"))]);
    let client = client(&config, transport);

    let mut manager = ChatManager::new(config.limits.max_threads);
    let id = manager
        .create_thread(Some("T1"), "en")
        .unwrap()
        .id()
        .to_string();

    let request = handler::build_request(manager.thread(&id).unwrap(), "Hello", &config).unwrap();
    manager
        .append_message(&id, ChatMessage::new(Role::User, "Hello"))
        .unwrap();

    let raw = client.send(&request).await.unwrap();
    let reply = handler::parse_response(raw).unwrap();
    manager.append_message(&id, reply).unwrap();

    let history: Vec<_> = manager
        .thread(&id)
        .unwrap()
        .messages()
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        history,
        vec![(Role::User, "Hello"), (Role::Assistant, "Hi there")]
    );
}

/// A failed send leaves prior history intact and records the attempt as an
/// error-annotated message; the session stays usable afterwards.
#[tokio::test]
async fn failed_send_keeps_session_usable() {
    let config = test_config();
    let transport = QueueTransport::new(vec![
        Err(TransportError::Status {
            status: 400,
            message: "bad request".to_string(),
            retry_after: None,
        }),
        Ok(assistant_reply("second time lucky")),
    ]);
    let client = client(&config, transport);

    let mut manager = ChatManager::new(config.limits.max_threads);
    let id = manager.create_thread(None, "en").unwrap().id().to_string();

    // First turn fails permanently.
    let request = handler::build_request(manager.thread(&id).unwrap(), "one", &config).unwrap();
    manager
        .append_message(&id, ChatMessage::new(Role::User, "one"))
        .unwrap();
    let err = client.send(&request).await.unwrap_err();
    assert!(matches!(err, ApiError::RequestRejected { status: 400, .. }));
    manager
        .append_message(
            &id,
            ChatMessage::with_error(Role::Assistant, "", err.to_string()),
        )
        .unwrap();

    // Second turn succeeds; the failed turn never reaches the wire.
    let request = handler::build_request(manager.thread(&id).unwrap(), "two", &config).unwrap();
    assert!(request.messages.iter().all(|m| !m.content.is_empty()));
    manager
        .append_message(&id, ChatMessage::new(Role::User, "two"))
        .unwrap();
    let reply = handler::parse_response(client.send(&request).await.unwrap()).unwrap();
    manager.append_message(&id, reply).unwrap();

    let messages = manager.thread(&id).unwrap().messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].content, "one");
    assert!(messages[1].error.is_some());
    assert_eq!(messages[3].content, "second time lucky");
}

/// Export on one manager, import on another: the conversation survives the
/// boundary with a fresh identifier.
#[tokio::test]
async fn export_crosses_managers() {
    let config = test_config();
    let mut source = ChatManager::new(config.limits.max_threads);
    let id = source
        .create_thread(Some("Travel"), "ru")
        .unwrap()
        .id()
        .to_string();
    source
        .append_message(&id, ChatMessage::new(Role::User, "Привет"))
        .unwrap();
    let exported = source.export_thread(&id).unwrap();

    let mut target = ChatManager::new(config.limits.max_threads);
    let imported = target.import_thread(&exported).unwrap();
    assert_ne!(imported.id(), id);
    assert_eq!(imported.title, "Travel");
    assert_eq!(imported.messages().len(), 1);
    assert_eq!(imported.messages()[0].content, "Привет");
}
