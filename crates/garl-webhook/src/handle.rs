// Path: crates/garl-webhook/src/handle.rs
//! The producer-side handle the trace pipeline and endorsement engine hold.

use garl_types::app::WebhookEvent;
use tokio::sync::mpsc::Sender;

/// A cheap-to-clone handle for enqueuing [`WebhookEvent`]s onto the
/// dispatcher's bounded queue.
///
/// Enqueue never blocks and never fails the caller: per `SPEC_FULL.md` §5,
/// a full queue drops the event with a log line rather than backpressuring
/// the submission that produced it.
#[derive(Clone)]
pub struct DispatchHandle {
    sender: Sender<WebhookEvent>,
}

impl DispatchHandle {
    pub(crate) fn new(sender: Sender<WebhookEvent>) -> Self {
        Self { sender }
    }

    /// Enqueues `event` for asynchronous delivery. Drops (with a warning log
    /// and a `dropped` metric) if the queue is at capacity.
    pub fn enqueue(&self, event: WebhookEvent) {
        if let Err(err) = self.sender.try_send(event) {
            let event_type = match &err {
                tokio::sync::mpsc::error::TrySendError::Full(e)
                | tokio::sync::mpsc::error::TrySendError::Closed(e) => e.event,
            };
            tracing::warn!(
                event_type = ?event_type,
                "webhook dispatch queue full or closed, dropping event"
            );
            garl_telemetry::dispatch_metrics().inc_dropped(webhook_event_label(event_type));
        }
    }
}

pub(crate) fn webhook_event_label(event: garl_types::app::WebhookEventType) -> &'static str {
    use garl_types::app::WebhookEventType::*;
    match event {
        TraceRecorded => "trace_recorded",
        ScoreChange => "score_change",
        Milestone => "milestone",
        Anomaly => "anomaly",
        TierChange => "tier_change",
    }
}
