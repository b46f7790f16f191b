// Path: crates/garl-webhook/tests/dispatch.rs
use std::sync::Arc;
use std::time::Duration;

use garl_storage::{InMemoryStorage, Storage};
use garl_types::app::{Webhook, WebhookEvent, WebhookEventType};
use garl_types::config::WebhookConfig;
use garl_webhook::Dispatcher;
use uuid::Uuid;
use wiremock::matchers::{header_exists, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn delivers_signed_event_to_active_subscriber() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header_exists("X-Garl-Signature"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let agent_id = Uuid::new_v4();
    let webhook = Webhook {
        id: Uuid::new_v4(),
        agent_id,
        url: server.uri(),
        secret: "s3cr3t".to_string(),
        events: vec![WebhookEventType::TraceRecorded],
        is_active: true,
        created_at: chrono::Utc::now(),
        last_triggered_at: None,
    };
    storage.insert_webhook(webhook).await.unwrap();

    let config = WebhookConfig {
        timeout_secs: 2,
        retry_delays_secs: vec![1],
        queue_capacity: 16,
    };
    let (handle, _join) = Dispatcher::spawn(Arc::clone(&storage), config);

    handle.enqueue(WebhookEvent {
        event: WebhookEventType::TraceRecorded,
        agent_id,
        timestamp: chrono::Utc::now(),
        data: serde_json::json!({"trace_id": Uuid::new_v4()}),
    });

    // The mock's `.expect(1)` is verified on drop; give the background
    // delivery task time to run before the server goes out of scope.
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn inactive_subscription_receives_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let agent_id = Uuid::new_v4();
    let webhook = Webhook {
        id: Uuid::new_v4(),
        agent_id,
        url: server.uri(),
        secret: "s3cr3t".to_string(),
        events: vec![WebhookEventType::TraceRecorded],
        is_active: false,
        created_at: chrono::Utc::now(),
        last_triggered_at: None,
    };
    storage.insert_webhook(webhook).await.unwrap();

    let config = WebhookConfig {
        timeout_secs: 2,
        retry_delays_secs: vec![1],
        queue_capacity: 16,
    };
    let (handle, _join) = Dispatcher::spawn(Arc::clone(&storage), config);

    handle.enqueue(WebhookEvent {
        event: WebhookEventType::TraceRecorded,
        agent_id,
        timestamp: chrono::Utc::now(),
        data: serde_json::json!({}),
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
}
