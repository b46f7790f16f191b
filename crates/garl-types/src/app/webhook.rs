//! Agent-owned webhook subscriptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::WebhookEventType;
use super::{AgentId, WebhookId};

/// A subscription owned by an agent, notified by the webhook dispatcher
/// whenever one of its subscribed `events` fires for that agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    /// Globally unique identifier.
    pub id: WebhookId,
    /// The owning agent.
    pub agent_id: AgentId,
    /// The destination URL the dispatcher POSTs to.
    pub url: String,
    /// HMAC-SHA256 signing secret, generated at creation and returned once.
    pub secret: String,
    /// The event types this subscription receives.
    pub events: Vec<WebhookEventType>,
    /// Subscriptions can be paused without deleting them.
    pub is_active: bool,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
    /// The last time a delivery to this subscription succeeded (2xx).
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl Webhook {
    /// Whether this subscription should receive an event of the given type.
    pub fn subscribes_to(&self, event: WebhookEventType) -> bool {
        self.is_active && self.events.contains(&event)
    }
}
