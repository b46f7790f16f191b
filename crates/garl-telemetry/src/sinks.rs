// Path: crates/garl-telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns a static reference to the configured error metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured reputation engine metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn reputation_metrics() -> &'static dyn ReputationMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured trace pipeline metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn pipeline_metrics() -> &'static dyn PipelineMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured webhook dispatch metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn dispatch_metrics() -> &'static dyn DispatchMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured rate limiter metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn rate_limit_metrics() -> &'static dyn RateLimitMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics related to the reputation engine's per-trace updates.
pub trait ReputationMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the counter of traces processed by the reputation engine, labeled by category.
    fn inc_traces_processed(&self, category: &'static str);
    /// Observes the signed trust-score delta applied by a single trace.
    fn observe_trust_delta(&self, delta: f64);
    /// Increments a counter for a detected anomaly, labeled by type and severity.
    fn inc_anomaly_detected(&self, anomaly_type: &'static str, severity: &'static str);
    /// Increments a counter for a certification tier transition, labeled by the new tier.
    fn inc_tier_transition(&self, new_tier: &'static str);
    /// Increments a counter for a lazily-applied decay tick.
    fn inc_decay_applied(&self);
}
impl ReputationMetricsSink for NopSink {
    fn inc_traces_processed(&self, _category: &'static str) {}
    fn observe_trust_delta(&self, _delta: f64) {}
    fn inc_anomaly_detected(&self, _anomaly_type: &'static str, _severity: &'static str) {}
    fn inc_tier_transition(&self, _new_tier: &'static str) {}
    fn inc_decay_applied(&self) {}
}

/// A sink for metrics related to the trace intake pipeline.
pub trait PipelineMetricsSink: Send + Sync + std::fmt::Debug {
    /// Observes the end-to-end latency of a single `submit` call, in seconds.
    fn observe_submit_latency(&self, duration_secs: f64);
    /// Increments a counter for a duplicate trace submission (idempotent replay).
    fn inc_duplicate_submission(&self);
    /// Increments a counter for a rejected submission, labeled by the error code.
    fn inc_submission_rejected(&self, reason: &'static str);
    /// Observes the size, in items, of a batch submission.
    fn observe_batch_size(&self, size: usize);
}
impl PipelineMetricsSink for NopSink {
    fn observe_submit_latency(&self, _duration_secs: f64) {}
    fn inc_duplicate_submission(&self) {}
    fn inc_submission_rejected(&self, _reason: &'static str) {}
    fn observe_batch_size(&self, _size: usize) {}
}

/// A sink for metrics related to the webhook dispatcher.
pub trait DispatchMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a successfully delivered webhook event.
    fn inc_delivered(&self, event_type: &'static str);
    /// Increments a counter for a retried delivery attempt.
    fn inc_retried(&self, event_type: &'static str);
    /// Increments a counter for a delivery dropped after exhausting retries.
    fn inc_dropped(&self, event_type: &'static str);
    /// Sets the gauge for the current depth of the in-process dispatch queue.
    fn set_queue_depth(&self, depth: usize);
}
impl DispatchMetricsSink for NopSink {
    fn inc_delivered(&self, _event_type: &'static str) {}
    fn inc_retried(&self, _event_type: &'static str) {}
    fn inc_dropped(&self, _event_type: &'static str) {}
    fn set_queue_depth(&self, _depth: usize) {}
}

/// A sink for metrics related to the in-process rate limiter.
pub trait RateLimitMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a request rejected by the rate limiter, labeled by scope.
    fn inc_rejected(&self, scope: &'static str);
}
impl RateLimitMetricsSink for NopSink {
    fn inc_rejected(&self, _scope: &'static str) {}
}

/// A sink for recording structured error metrics.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a specific error, categorized by its stable error code.
    fn inc_error(&self, code: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _code: &'static str) {}
}

/// A unified sink that implements all domain-specific traits, providing a single
/// point of implementation for metrics backends like Prometheus.
pub trait MetricsSink:
    ReputationMetricsSink
    + PipelineMetricsSink
    + DispatchMetricsSink
    + RateLimitMetricsSink
    + ErrorMetricsSink
{
}

// Blanket implementation to allow any type that implements all sub-traits
// to be used as a `MetricsSink`.
impl<T> MetricsSink for T where
    T: ReputationMetricsSink
        + PipelineMetricsSink
        + DispatchMetricsSink
        + RateLimitMetricsSink
        + ErrorMetricsSink
{
}
