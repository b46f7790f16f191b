//! The event envelope the trace pipeline and endorsement engine enqueue, and
//! the webhook dispatcher fans out to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::WebhookEventType;
use super::AgentId;

/// One fired event, queued in-process for webhook delivery.
///
/// `data` is the event-specific payload (e.g. `{"trust_delta": 3.2,
/// "trust_score": 61.0}` for a `score_change`); it becomes the `data` field of
/// the delivered webhook body (`SPEC_FULL.md` §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Which subscription event type this fires.
    pub event: WebhookEventType,
    /// The agent this event concerns.
    pub agent_id: AgentId,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
    /// Event-specific detail.
    pub data: Value,
}
