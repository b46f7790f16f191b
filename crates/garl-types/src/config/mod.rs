//! Read-only configuration records injected into the engine at startup.
//!
//! Nothing in this module is ambient global state: every value here is loaded
//! once (from environment variables and/or a config file, by the binary crate)
//! and handed to the engine as an immutable record.

use serde::{Deserialize, Serialize};

/// Tunables for the reputation engine's EMA blending, anomaly thresholds, and
/// decay rate. Defaults match the values fixed by the specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// EMA smoothing factor applied to every per-trace dimensional observation.
    #[serde(default = "default_ema_alpha")]
    pub ema_alpha: f64,
    /// Below this trace count, dimensional EMA updates are dampened by 50%.
    #[serde(default = "default_dampening_threshold")]
    pub dampening_threshold: u64,
    /// Below this trace count, anomaly detection does not run at all.
    #[serde(default = "default_anomaly_min_traces")]
    pub anomaly_min_traces: u64,
    /// Window size, in traces, used for the rolling consistency calculation.
    #[serde(default = "default_consistency_window")]
    pub consistency_window: usize,
    /// Consecutive clean traces required to auto-archive a `warning` anomaly.
    #[serde(default = "default_anomaly_clear_streak")]
    pub anomaly_clear_streak: u64,
    /// Daily fractional pull toward the baseline applied by the decay scheduler.
    #[serde(default = "default_decay_rate_per_day")]
    pub decay_rate_per_day: f64,
    /// Hours of inactivity before decay starts applying to a read.
    #[serde(default = "default_decay_grace_hours")]
    pub decay_grace_hours: i64,
    /// The maximum bonus a single endorsement may contribute.
    #[serde(default = "default_max_endorsement_bonus")]
    pub max_endorsement_bonus: f64,
}

fn default_ema_alpha() -> f64 {
    0.3
}
fn default_dampening_threshold() -> u64 {
    5
}
fn default_anomaly_min_traces() -> u64 {
    10
}
fn default_consistency_window() -> usize {
    20
}
fn default_anomaly_clear_streak() -> u64 {
    50
}
fn default_decay_rate_per_day() -> f64 {
    0.001
}
fn default_decay_grace_hours() -> i64 {
    24
}
fn default_max_endorsement_bonus() -> f64 {
    2.0
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            ema_alpha: default_ema_alpha(),
            dampening_threshold: default_dampening_threshold(),
            anomaly_min_traces: default_anomaly_min_traces(),
            consistency_window: default_consistency_window(),
            anomaly_clear_streak: default_anomaly_clear_streak(),
            decay_rate_per_day: default_decay_rate_per_day(),
            decay_grace_hours: default_decay_grace_hours(),
            max_endorsement_bonus: default_max_endorsement_bonus(),
        }
    }
}

/// Sliding-window rate limits applied before a request reaches the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per rolling 60s window, per API key, for write endpoints.
    #[serde(default = "default_writes_per_minute")]
    pub writes_per_minute: u32,
    /// Requests allowed per rolling 60s window, per client address, for registration.
    #[serde(default = "default_registrations_per_minute")]
    pub registrations_per_minute: u32,
}

fn default_writes_per_minute() -> u32 {
    120
}
fn default_registrations_per_minute() -> u32 {
    120
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            writes_per_minute: default_writes_per_minute(),
            registrations_per_minute: default_registrations_per_minute(),
        }
    }
}

/// Parameters governing webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Per-attempt delivery timeout.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
    /// Backoff delays, in seconds, applied between retries.
    #[serde(default = "default_retry_delays_secs")]
    pub retry_delays_secs: Vec<u64>,
    /// Maximum number of events buffered in the in-memory dispatch queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_webhook_timeout_secs() -> u64 {
    5
}
fn default_retry_delays_secs() -> Vec<u64> {
    vec![1, 2, 4]
}
fn default_queue_capacity() -> usize {
    1024
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout_secs(),
            retry_delays_secs: default_retry_delays_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// The thresholds used by the anomaly detector, expressed as multipliers over
/// an agent's own rolling averages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnomalyThresholds {
    /// Recent (last-50) success rate above which a failure is "unexpected".
    #[serde(default = "default_unexpected_failure_success_rate")]
    pub unexpected_failure_success_rate: f64,
    /// Multiplier over `avg_duration_ms` that triggers a duration spike.
    #[serde(default = "default_duration_spike_multiplier")]
    pub duration_spike_multiplier: f64,
    /// Multiplier over average cost per trace that triggers a cost spike.
    #[serde(default = "default_cost_spike_multiplier")]
    pub cost_spike_multiplier: f64,
}

fn default_unexpected_failure_success_rate() -> f64 {
    0.90
}
fn default_duration_spike_multiplier() -> f64 {
    5.0
}
fn default_cost_spike_multiplier() -> f64 {
    10.0
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            unexpected_failure_success_rate: default_unexpected_failure_success_rate(),
            duration_spike_multiplier: default_duration_spike_multiplier(),
            cost_spike_multiplier: default_cost_spike_multiplier(),
        }
    }
}

/// The top-level, immutable configuration record for a running oracle instance.
///
/// Constructed once at startup from environment variables / a config file by
/// the binary crate, then shared read-only across every request-handling
/// thread. Nothing in the engine mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reputation engine tunables.
    #[serde(default)]
    pub reputation: ReputationConfig,
    /// Anomaly detection thresholds.
    #[serde(default)]
    pub anomaly: AnomalyThresholds,
    /// Rate limiter tunables.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Webhook dispatcher tunables.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Origins allowed by the (external) HTTP adapter's CORS layer.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Whether read endpoints require authentication.
    #[serde(default)]
    pub read_auth_enabled: bool,
}
