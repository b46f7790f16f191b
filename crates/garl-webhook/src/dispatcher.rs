// Path: crates/garl-webhook/src/dispatcher.rs
//! The background worker that drains the dispatch queue and delivers events.

use std::sync::Arc;
use std::time::Duration;

use garl_storage::Storage;
use garl_types::app::{Webhook, WebhookEvent};
use garl_types::config::WebhookConfig;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::handle::{webhook_event_label, DispatchHandle};
use crate::signing::sign_body;

/// Owns the receiving end of the dispatch queue and the background task that
/// drains it. Construct with [`Dispatcher::spawn`]; keep the returned
/// [`DispatchHandle`] to enqueue events and the `JoinHandle` to await shutdown.
pub struct Dispatcher;

impl Dispatcher {
    /// Spawns the dispatcher's background task and returns a handle producers
    /// can clone freely, plus the task's `JoinHandle`.
    ///
    /// The task runs until `handle` (and every clone of it) is dropped, at
    /// which point the channel closes and the loop exits.
    pub fn spawn(
        storage: Arc<dyn Storage>,
        config: WebhookConfig,
    ) -> (DispatchHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client builds with a fixed timeout");
        let join = tokio::spawn(run(rx, storage, client, config));
        (DispatchHandle::new(tx), join)
    }
}

async fn run(
    mut rx: mpsc::Receiver<WebhookEvent>,
    storage: Arc<dyn Storage>,
    client: Client,
    config: WebhookConfig,
) {
    while let Some(event) = rx.recv().await {
        garl_telemetry::dispatch_metrics().set_queue_depth(rx.len());
        let subscribers = match storage
            .list_webhooks_for_event(event.agent_id, event.event)
            .await
        {
            Ok(subs) => subs,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list webhook subscribers for event");
                continue;
            }
        };
        for webhook in subscribers {
            let storage = Arc::clone(&storage);
            let client = client.clone();
            let event = event.clone();
            let config = config.clone();
            tokio::spawn(async move {
                deliver(&client, &storage, webhook, event, &config).await;
            });
        }
    }
}

/// Attempts delivery to a single subscriber, retrying at `config.retry_delays_secs`.
async fn deliver(
    client: &Client,
    storage: &Arc<dyn Storage>,
    webhook: Webhook,
    event: WebhookEvent,
    config: &WebhookConfig,
) {
    let label = webhook_event_label(event.event);
    let body = serde_json::json!({
        "event": event.event,
        "agent_id": event.agent_id,
        "timestamp": event.timestamp,
        "data": event.data,
    });
    let body_bytes = match serde_json::to_vec(&body) {
        Ok(b) => b,
        Err(err) => {
            tracing::warn!(error = %err, webhook_id = %webhook.id, "failed to encode webhook body");
            return;
        }
    };
    let signature = sign_body(&webhook.secret, &body_bytes);

    let mut attempt = 0usize;
    loop {
        let result = client
            .post(&webhook.url)
            .header("X-Garl-Event", label)
            .header("X-Garl-Signature", signature.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body_bytes.clone())
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                garl_telemetry::dispatch_metrics().inc_delivered(label);
                let mut updated = webhook;
                updated.last_triggered_at = Some(chrono::Utc::now());
                if let Err(err) = storage.update_webhook(updated).await {
                    tracing::warn!(error = %err, "failed to record webhook delivery");
                }
                return;
            }
            Ok(resp) => {
                tracing::debug!(
                    webhook_id = %webhook.id,
                    status = resp.status().as_u16(),
                    attempt,
                    "webhook delivery non-2xx"
                );
            }
            Err(err) => {
                tracing::debug!(webhook_id = %webhook.id, error = %err, attempt, "webhook delivery error");
            }
        }

        match config.retry_delays_secs.get(attempt) {
            Some(delay_secs) => {
                garl_telemetry::dispatch_metrics().inc_retried(label);
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
                attempt += 1;
            }
            None => {
                tracing::warn!(webhook_id = %webhook.id, event = label, "webhook delivery dropped after exhausting retries");
                garl_telemetry::dispatch_metrics().inc_dropped(label);
                return;
            }
        }
    }
}
