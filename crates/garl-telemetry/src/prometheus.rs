// Path: crates/garl-telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_gauge, register_histogram, register_int_counter,
    register_int_counter_vec, Gauge, Histogram, IntCounter, IntCounterVec,
};

// --- Metric Statics ---
// We use OnceCell to hold the metric collectors. They will be initialized
// exactly once by the `install` function.

static TRACES_PROCESSED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static TRUST_DELTA: OnceCell<Histogram> = OnceCell::new();
static ANOMALIES_DETECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static TIER_TRANSITIONS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static DECAY_APPLIED_TOTAL: OnceCell<IntCounter> = OnceCell::new();

static SUBMIT_LATENCY_SECONDS: OnceCell<Histogram> = OnceCell::new();
static DUPLICATE_SUBMISSIONS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SUBMISSIONS_REJECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static BATCH_SIZE: OnceCell<Histogram> = OnceCell::new();

static WEBHOOK_DELIVERED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static WEBHOOK_RETRIED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static WEBHOOK_DROPPED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static WEBHOOK_QUEUE_DEPTH: OnceCell<Gauge> = OnceCell::new();

static RATE_LIMIT_REJECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

/// A [`MetricsSink`] implementation backed by the `prometheus` crate's default registry.
#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Helper macro to reduce boilerplate for getting a metric from OnceCell.
/// This will panic if `install()` has not been called, which is intentional
/// as it indicates a critical application setup error.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("Prometheus sink not initialized. Call telemetry::prometheus::install() first.")
    };
}

impl ReputationMetricsSink for PrometheusSink {
    fn inc_traces_processed(&self, category: &'static str) {
        get_metric!(TRACES_PROCESSED_TOTAL)
            .with_label_values(&[category])
            .inc();
    }
    fn observe_trust_delta(&self, delta: f64) {
        get_metric!(TRUST_DELTA).observe(delta);
    }
    fn inc_anomaly_detected(&self, anomaly_type: &'static str, severity: &'static str) {
        get_metric!(ANOMALIES_DETECTED_TOTAL)
            .with_label_values(&[anomaly_type, severity])
            .inc();
    }
    fn inc_tier_transition(&self, new_tier: &'static str) {
        get_metric!(TIER_TRANSITIONS_TOTAL)
            .with_label_values(&[new_tier])
            .inc();
    }
    fn inc_decay_applied(&self) {
        get_metric!(DECAY_APPLIED_TOTAL).inc();
    }
}

impl PipelineMetricsSink for PrometheusSink {
    fn observe_submit_latency(&self, duration_secs: f64) {
        get_metric!(SUBMIT_LATENCY_SECONDS).observe(duration_secs);
    }
    fn inc_duplicate_submission(&self) {
        get_metric!(DUPLICATE_SUBMISSIONS_TOTAL).inc();
    }
    fn inc_submission_rejected(&self, reason: &'static str) {
        get_metric!(SUBMISSIONS_REJECTED_TOTAL)
            .with_label_values(&[reason])
            .inc();
    }
    fn observe_batch_size(&self, size: usize) {
        get_metric!(BATCH_SIZE).observe(size as f64);
    }
}

impl DispatchMetricsSink for PrometheusSink {
    fn inc_delivered(&self, event_type: &'static str) {
        get_metric!(WEBHOOK_DELIVERED_TOTAL)
            .with_label_values(&[event_type])
            .inc();
    }
    fn inc_retried(&self, event_type: &'static str) {
        get_metric!(WEBHOOK_RETRIED_TOTAL)
            .with_label_values(&[event_type])
            .inc();
    }
    fn inc_dropped(&self, event_type: &'static str) {
        get_metric!(WEBHOOK_DROPPED_TOTAL)
            .with_label_values(&[event_type])
            .inc();
    }
    fn set_queue_depth(&self, depth: usize) {
        get_metric!(WEBHOOK_QUEUE_DEPTH).set(depth as f64);
    }
}

impl RateLimitMetricsSink for PrometheusSink {
    fn inc_rejected(&self, scope: &'static str) {
        get_metric!(RATE_LIMIT_REJECTED_TOTAL)
            .with_label_values(&[scope])
            .inc();
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, code: &'static str) {
        get_metric!(ERRORS_TOTAL).with_label_values(&[code]).inc();
    }
}

/// Initializes all Prometheus metrics collectors and returns a static reference to the sink.
/// This function must be called only once at application startup.
#[allow(clippy::expect_used)]
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    TRACES_PROCESSED_TOTAL
        .set(register_int_counter_vec!(
            "garl_traces_processed_total",
            "Total traces processed by the reputation engine, labeled by category.",
            &["category"]
        )?)
        .expect("static already initialized");
    TRUST_DELTA
        .set(register_histogram!(
            "garl_trust_delta",
            "Signed composite trust-score delta applied by a single trace.",
            vec![-20.0, -10.0, -5.0, -2.0, -1.0, 0.0, 1.0, 2.0, 5.0, 10.0, 20.0]
        )?)
        .expect("static already initialized");
    ANOMALIES_DETECTED_TOTAL
        .set(register_int_counter_vec!(
            "garl_anomalies_detected_total",
            "Total anomalies detected, labeled by type and severity.",
            &["anomaly_type", "severity"]
        )?)
        .expect("static already initialized");
    TIER_TRANSITIONS_TOTAL
        .set(register_int_counter_vec!(
            "garl_tier_transitions_total",
            "Total certification tier transitions, labeled by the new tier.",
            &["new_tier"]
        )?)
        .expect("static already initialized");
    DECAY_APPLIED_TOTAL
        .set(register_int_counter!(
            "garl_decay_applied_total",
            "Total lazy decay applications."
        )?)
        .expect("static already initialized");
    SUBMIT_LATENCY_SECONDS
        .set(register_histogram!(
            "garl_submit_latency_seconds",
            "End-to-end latency of a single trace submission.",
            exponential_buckets(0.001, 2.0, 15)?
        )?)
        .expect("static already initialized");
    DUPLICATE_SUBMISSIONS_TOTAL
        .set(register_int_counter!(
            "garl_duplicate_submissions_total",
            "Total idempotent replays of an already-seen (agent_id, trace_hash)."
        )?)
        .expect("static already initialized");
    SUBMISSIONS_REJECTED_TOTAL
        .set(register_int_counter_vec!(
            "garl_submissions_rejected_total",
            "Total rejected trace submissions, labeled by stable error code.",
            &["reason"]
        )?)
        .expect("static already initialized");
    BATCH_SIZE
        .set(register_histogram!(
            "garl_batch_submit_size",
            "Size, in traces, of batch submissions.",
            vec![1.0, 5.0, 10.0, 25.0, 50.0]
        )?)
        .expect("static already initialized");
    WEBHOOK_DELIVERED_TOTAL
        .set(register_int_counter_vec!(
            "garl_webhook_delivered_total",
            "Total webhook deliveries that received a 2xx response.",
            &["event_type"]
        )?)
        .expect("static already initialized");
    WEBHOOK_RETRIED_TOTAL
        .set(register_int_counter_vec!(
            "garl_webhook_retried_total",
            "Total webhook delivery retry attempts.",
            &["event_type"]
        )?)
        .expect("static already initialized");
    WEBHOOK_DROPPED_TOTAL
        .set(register_int_counter_vec!(
            "garl_webhook_dropped_total",
            "Total webhook deliveries dropped after exhausting retries.",
            &["event_type"]
        )?)
        .expect("static already initialized");
    WEBHOOK_QUEUE_DEPTH
        .set(register_gauge!(
            "garl_webhook_queue_depth",
            "Current depth of the in-process webhook dispatch queue."
        )?)
        .expect("static already initialized");
    RATE_LIMIT_REJECTED_TOTAL
        .set(register_int_counter_vec!(
            "garl_rate_limit_rejected_total",
            "Total requests rejected by the rate limiter, labeled by scope.",
            &["scope"]
        )?)
        .expect("static already initialized");
    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "garl_errors_total",
            "Total errors, categorized by stable error code.",
            &["code"]
        )?)
        .expect("static already initialized");

    static SINK: PrometheusSink = PrometheusSink;
    Ok(&SINK)
}
