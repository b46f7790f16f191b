// Path: crates/garl-engine/src/reputation.rs
//! The reputation engine: per-trace EMA updates, anomaly detection, and lazy decay.
//!
//! Implemented as pure functions over `(&Agent, &Trace)` rather than as a
//! stateful service, so the trace pipeline — which owns persistence and
//! per-agent locking — stays the only caller with side effects.

use chrono::{DateTime, Duration, Utc};
use garl_types::app::{
    Agent, AnomalyFlag, AnomalySeverity, AnomalyType, Category, CertificationTier, Trace,
    TraceStatus,
};
use garl_types::config::{AnomalyThresholds, ReputationConfig};

/// The result of folding one trace into an agent's reputation state.
pub struct ReputationUpdate {
    /// The agent with every reputation-bearing field advanced. Not yet persisted.
    pub agent: Agent,
    /// `trust_score_after - trust_score_before`, for `Trace::trust_delta` and
    /// the `reputation_history` row.
    pub trust_delta: f64,
    /// Whether `certification_tier` changed, to decide on a `tier_change` event.
    pub tier_changed: bool,
    /// Anomaly flags newly raised by this trace (empty most of the time).
    pub new_anomalies: Vec<AnomalyFlag>,
}

/// Folds `trace` into `agent`'s reputation state and returns the updated
/// snapshot plus the events the caller should react to.
///
/// `agent` is read at the trace count it had *before* this trace; the
/// dampening rule (`SPEC_FULL.md` §4.2) is evaluated against that value.
pub fn apply_trace(
    agent: &Agent,
    trace: &Trace,
    config: &ReputationConfig,
    thresholds: &AnomalyThresholds,
) -> ReputationUpdate {
    let mut next = agent.clone();
    let dampened = agent.total_traces < config.dampening_threshold;
    let alpha = if dampened {
        config.ema_alpha * 0.5
    } else {
        config.ema_alpha
    };

    let (reliability_obs, new_streak) =
        reliability_observation(trace.status, agent.consecutive_successes);
    next.dimensions.reliability = blend(alpha, reliability_obs, agent.dimensions.reliability);
    next.consecutive_successes = new_streak;

    let speed_bench = trace.category.speed_benchmark_ms() as f64;
    let speed_obs = shape_observation(speed_bench, trace.duration_ms.max(1) as f64);
    next.dimensions.speed = blend(alpha, speed_obs, agent.dimensions.speed);

    if let Some(cost) = trace.cost_usd {
        let cost_bench = trace.category.cost_benchmark_usd();
        let cost_obs = shape_observation(cost_bench, cost.max(f64::MIN_POSITIVE));
        next.dimensions.cost_efficiency = blend(alpha, cost_obs, agent.dimensions.cost_efficiency);
    }

    let mut recent = agent.recent_reliability_obs.clone();
    recent.push(reliability_obs);
    if recent.len() > config.consistency_window {
        let excess = recent.len() - config.consistency_window;
        recent.drain(0..excess);
    }
    next.dimensions.consistency = blend(
        alpha,
        consistency_observation(&recent),
        agent.dimensions.consistency,
    );
    next.recent_reliability_obs = recent;

    next.dimensions.security = blend(alpha, security_observation(trace), agent.dimensions.security);

    next.total_traces += 1;
    if trace.status == TraceStatus::Success {
        next.success_count += 1;
    }
    next.success_rate = next.success_count as f64 / next.total_traces as f64 * 100.0;
    next.avg_duration_ms =
        running_average(agent.avg_duration_ms, agent.total_traces, trace.duration_ms as f64);
    if let Some(cost) = trace.cost_usd {
        next.total_cost_usd += cost;
    }

    let trust_before = agent.clamped_trust_score();
    next.trust_score = next.dimensions.composite().clamp(0.0, 100.0);
    let tier_before = agent.certification_tier;
    next.certification_tier = CertificationTier::from_score(next.trust_score);
    let tier_changed = next.certification_tier != tier_before;

    let new_anomalies = detect_anomalies(agent, trace, config, thresholds);
    next.anomaly_flags.extend(new_anomalies.iter().cloned());
    if new_anomalies.is_empty() {
        next.clean_trace_streak += 1;
        if next.clean_trace_streak >= config.anomaly_clear_streak {
            for flag in next.anomaly_flags.iter_mut() {
                if !flag.archived && flag.severity == AnomalySeverity::Warning {
                    flag.archived = true;
                }
            }
        }
    } else {
        next.clean_trace_streak = 0;
    }

    next.last_trace_at = Some(trace.created_at);
    next.updated_at = trace.created_at;

    let trust_after = next.clamped_trust_score();
    let trust_delta = trust_after - trust_before;

    garl_telemetry::reputation_metrics().inc_traces_processed(category_label(trace.category));
    garl_telemetry::reputation_metrics().observe_trust_delta(trust_delta);
    if tier_changed {
        garl_telemetry::reputation_metrics().inc_tier_transition(tier_label(next.certification_tier));
    }
    for flag in &new_anomalies {
        garl_telemetry::reputation_metrics()
            .inc_anomaly_detected(anomaly_type_label(flag.anomaly_type), severity_label(flag.severity));
        tracing::warn!(
            agent_id = %agent.agent_id,
            anomaly_type = anomaly_type_label(flag.anomaly_type),
            severity = severity_label(flag.severity),
            "anomaly detected"
        );
    }
    tracing::debug!(
        agent_id = %agent.agent_id,
        trust_delta,
        trust_score = next.trust_score,
        "reputation updated"
    );

    ReputationUpdate {
        agent: next,
        trust_delta,
        tier_changed,
        new_anomalies,
    }
}

/// The result of applying inactivity decay to an agent.
pub struct DecayedAgent {
    /// The agent with dimensions pulled toward the 50.0 baseline.
    pub agent: Agent,
    /// The signed change in composite trust score this decay caused.
    pub trust_delta: f64,
}

/// Pulls `agent`'s dimensions toward the 50.0 baseline if it has been dormant
/// for at least `config.decay_grace_hours`. Returns `None` if no decay
/// applies (never traced, or within the grace period) — callers should treat
/// `None` as "nothing to persist", not as an error.
///
/// `new = 50 + (old - 50) * (1 - decay_rate_per_day) ^ elapsed_days`: an
/// exponential pull toward the baseline that can never cross it.
pub fn apply_decay(agent: &Agent, now: DateTime<Utc>, config: &ReputationConfig) -> Option<DecayedAgent> {
    let last_trace_at = agent.last_trace_at?;
    let elapsed = now.signed_duration_since(last_trace_at);
    if elapsed < Duration::hours(config.decay_grace_hours) {
        return None;
    }

    let elapsed_days = elapsed.num_seconds() as f64 / 86_400.0;
    let factor = (1.0 - config.decay_rate_per_day).powf(elapsed_days);
    let pull = |value: f64| 50.0 + (value - 50.0) * factor;

    let mut next = agent.clone();
    next.dimensions.reliability = pull(agent.dimensions.reliability);
    next.dimensions.security = pull(agent.dimensions.security);
    next.dimensions.speed = pull(agent.dimensions.speed);
    next.dimensions.cost_efficiency = pull(agent.dimensions.cost_efficiency);
    next.dimensions.consistency = pull(agent.dimensions.consistency);

    let trust_before = agent.clamped_trust_score();
    next.trust_score = next.dimensions.composite().clamp(0.0, 100.0);
    next.certification_tier = CertificationTier::from_score(next.trust_score);
    next.updated_at = now;
    let trust_after = next.clamped_trust_score();

    garl_telemetry::reputation_metrics().inc_decay_applied();

    Some(DecayedAgent {
        agent: next,
        trust_delta: trust_after - trust_before,
    })
}

fn blend(alpha: f64, observation: f64, previous: f64) -> f64 {
    (alpha * observation + (1.0 - alpha) * previous).clamp(0.0, 100.0)
}

/// `100 * clip(benchmark / actual, 0, 2) / 2`: meeting the benchmark scores
/// 50, twice as fast (or cheap) scores 100, far slower approaches 0.
fn shape_observation(benchmark: f64, actual: f64) -> f64 {
    let ratio = (benchmark / actual).clamp(0.0, 2.0);
    (100.0 * ratio / 2.0).clamp(0.0, 100.0)
}

/// `success -> 100`, `partial -> 60`, `failure -> 0`, each plus a streak bonus
/// capped at +10 and clamped to 100. A failure always yields exactly 0 and
/// resets the streak; a partial leaves the streak untouched.
fn reliability_observation(status: TraceStatus, consecutive_successes_before: u64) -> (f64, u64) {
    match status {
        TraceStatus::Success => {
            let streak = consecutive_successes_before + 1;
            let bonus = streak.min(10) as f64;
            ((100.0 + bonus).min(100.0), streak)
        }
        TraceStatus::Partial => {
            let bonus = consecutive_successes_before.min(10) as f64;
            ((60.0 + bonus).min(100.0), consecutive_successes_before)
        }
        TraceStatus::Failure => (0.0, 0),
    }
}

/// `100 - min(50, population_stdev(recent))`. Fewer than two observations
/// gives perfect consistency; nothing to vary yet.
fn consistency_observation(recent: &[f64]) -> f64 {
    if recent.len() < 2 {
        return 100.0;
    }
    let mean = recent.iter().sum::<f64>() / recent.len() as f64;
    let variance = recent.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / recent.len() as f64;
    (100.0 - variance.sqrt().min(50.0)).clamp(0.0, 100.0)
}

/// Baseline 50, `+2` for a trace that declared permissions and honored them,
/// `-10` for a trace flagged with a security event, clamped to `[0, 100]`.
fn security_observation(trace: &Trace) -> f64 {
    let mut obs: f64 = 50.0;
    if !trace.declared_permissions.is_empty() && !trace.security_event {
        obs += 2.0;
    }
    if trace.security_event {
        obs -= 10.0;
    }
    obs.clamp(0.0, 100.0)
}

fn running_average(previous_avg: f64, previous_count: u64, new_value: f64) -> f64 {
    let n = previous_count as f64;
    (previous_avg * n + new_value) / (n + 1.0)
}

/// Runs only once `agent.total_traces >= config.anomaly_min_traces` (pre-trace
/// count). Severity escalates to `critical` when two or more distinct
/// anomaly types coincide on the same trace.
///
/// `unexpected_failure`'s "recent success rate" uses the agent's lifetime
/// `success_rate` rather than a dedicated last-50 ring buffer — see `DESIGN.md`.
fn detect_anomalies(
    agent: &Agent,
    trace: &Trace,
    config: &ReputationConfig,
    thresholds: &AnomalyThresholds,
) -> Vec<AnomalyFlag> {
    if agent.total_traces < config.anomaly_min_traces {
        return Vec::new();
    }

    let mut kinds = Vec::new();

    if trace.status == TraceStatus::Failure
        && agent.success_rate >= thresholds.unexpected_failure_success_rate * 100.0
    {
        kinds.push(AnomalyType::UnexpectedFailure);
    }
    if agent.avg_duration_ms > 0.0
        && (trace.duration_ms as f64) > thresholds.duration_spike_multiplier * agent.avg_duration_ms
    {
        kinds.push(AnomalyType::DurationSpike);
    }
    if let Some(cost) = trace.cost_usd {
        let avg_cost = agent.total_cost_usd / agent.total_traces as f64;
        if avg_cost > 0.0 && cost > thresholds.cost_spike_multiplier * avg_cost {
            kinds.push(AnomalyType::CostSpike);
        }
    }
    if trace.security_event {
        kinds.push(AnomalyType::PermissionViolation);
    }

    let severity = if kinds.len() >= 2 {
        AnomalySeverity::Critical
    } else {
        AnomalySeverity::Warning
    };

    kinds
        .into_iter()
        .map(|kind| AnomalyFlag {
            anomaly_type: kind,
            severity,
            message: anomaly_message(kind, trace),
            archived: false,
            detected_at: trace.created_at,
        })
        .collect()
}

fn anomaly_message(kind: AnomalyType, trace: &Trace) -> String {
    match kind {
        AnomalyType::UnexpectedFailure => {
            "trace failed despite a high recent success rate".to_string()
        }
        AnomalyType::DurationSpike => {
            format!("duration {}ms far exceeds the agent's rolling average", trace.duration_ms)
        }
        AnomalyType::CostSpike => "cost far exceeds the agent's rolling average cost".to_string(),
        AnomalyType::PermissionViolation => {
            "trace flagged a security event against its declared permissions".to_string()
        }
    }
}

pub(crate) fn category_label(category: Category) -> &'static str {
    match category {
        Category::Coding => "coding",
        Category::Research => "research",
        Category::Sales => "sales",
        Category::Data => "data",
        Category::Automation => "automation",
        Category::Other => "other",
    }
}

pub(crate) fn tier_label(tier: CertificationTier) -> &'static str {
    match tier {
        CertificationTier::Bronze => "bronze",
        CertificationTier::Silver => "silver",
        CertificationTier::Gold => "gold",
        CertificationTier::Enterprise => "enterprise",
    }
}

fn anomaly_type_label(kind: AnomalyType) -> &'static str {
    match kind {
        AnomalyType::UnexpectedFailure => "unexpected_failure",
        AnomalyType::DurationSpike => "duration_spike",
        AnomalyType::CostSpike => "cost_spike",
        AnomalyType::PermissionViolation => "permission_violation",
    }
}

fn severity_label(severity: AnomalySeverity) -> &'static str {
    match severity {
        AnomalySeverity::Warning => "warning",
        AnomalySeverity::Critical => "critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garl_types::app::{Category, ToolCall, TraceStatus};
    use uuid::Uuid;

    fn fresh_agent() -> Agent {
        Agent::new(
            Uuid::new_v4(),
            "agent-a".into(),
            None,
            None,
            Category::Coding,
            "hash".into(),
            false,
        )
    }

    fn trace_for(agent: &Agent, status: TraceStatus, duration_ms: u64) -> Trace {
        Trace {
            trace_id: Uuid::new_v4(),
            agent_id: agent.agent_id,
            task_description: "do a thing".into(),
            status,
            duration_ms,
            category: agent.category,
            cost_usd: None,
            token_count: 0,
            tool_calls: Vec::<ToolCall>::new(),
            input_summary: None,
            output_summary: None,
            runtime_env: None,
            declared_permissions: Vec::new(),
            security_event: false,
            trace_hash: "deadbeef".into(),
            certificate: test_certificate(),
            trust_delta: 0.0,
            created_at: Utc::now(),
        }
    }

    fn test_certificate() -> garl_types::app::Certificate {
        garl_types::app::Certificate {
            context: "https://garl.dev/contexts/v1".into(),
            cert_type: "CertifiedExecutionTrace".into(),
            payload: garl_types::app::CertificatePayload {
                trace_id: Uuid::new_v4(),
                agent_id: Uuid::new_v4(),
                status: TraceStatus::Success,
                trust_score_after: 50.0,
                trace_hash: "deadbeef".into(),
                created: Utc::now(),
            },
            proof: garl_types::app::CertificateProof {
                proof_type: "ECDSA-secp256k1".into(),
                created: Utc::now(),
                public_key: "00".into(),
                signature: "00".into(),
                alg: "ECDSA-secp256k1".into(),
            },
        }
    }

    #[test]
    fn fresh_agent_first_success_is_dampened_and_bounded() {
        let agent = fresh_agent();
        let trace = trace_for(&agent, TraceStatus::Success, 5000);
        let config = ReputationConfig::default();
        let thresholds = AnomalyThresholds::default();
        let update = apply_trace(&agent, &trace, &config, &thresholds);

        assert_eq!(update.agent.total_traces, 1);
        assert_eq!(update.agent.success_rate, 100.0);
        // Dampened EMA: alpha/2 = 0.15, observation = 100 -> 0.15*100+0.85*50 = 57.5.
        assert!((update.agent.dimensions.reliability - 57.5).abs() < 1e-9);
        assert!(update.new_anomalies.is_empty());
    }

    #[test]
    fn streak_bonus_caps_at_ten_and_failure_resets_it() {
        let mut agent = fresh_agent();
        let config = ReputationConfig::default();
        let thresholds = AnomalyThresholds::default();
        for _ in 0..5 {
            let trace = trace_for(&agent, TraceStatus::Success, 5000);
            agent = apply_trace(&agent, &trace, &config, &thresholds).agent;
        }
        assert_eq!(agent.consecutive_successes, 5);

        let failure = trace_for(&agent, TraceStatus::Failure, 5000);
        let update = apply_trace(&agent, &failure, &config, &thresholds);
        assert_eq!(update.agent.consecutive_successes, 0);
        assert!(update.agent.dimensions.reliability < agent.dimensions.reliability);
    }

    #[test]
    fn duration_spike_flagged_once_warmed_up() {
        let mut agent = fresh_agent();
        agent.total_traces = 15;
        agent.avg_duration_ms = 1000.0;
        let config = ReputationConfig::default();
        let thresholds = AnomalyThresholds::default();

        let spike = trace_for(&agent, TraceStatus::Success, 10_000);
        let update = apply_trace(&agent, &spike, &config, &thresholds);

        assert_eq!(update.new_anomalies.len(), 1);
        assert_eq!(update.new_anomalies[0].anomaly_type, AnomalyType::DurationSpike);
        assert_eq!(update.new_anomalies[0].severity, AnomalySeverity::Warning);
    }

    #[test]
    fn anomaly_auto_archives_after_clean_streak() {
        let mut agent = fresh_agent();
        agent.total_traces = 15;
        agent.avg_duration_ms = 1000.0;
        let config = ReputationConfig::default();
        let thresholds = AnomalyThresholds::default();

        let spike = trace_for(&agent, TraceStatus::Success, 10_000);
        agent = apply_trace(&agent, &spike, &config, &thresholds).agent;
        assert_eq!(agent.anomaly_flags.len(), 1);
        assert!(!agent.anomaly_flags[0].archived);

        for _ in 0..config.anomaly_clear_streak {
            let clean = trace_for(&agent, TraceStatus::Success, 1000);
            agent = apply_trace(&agent, &clean, &config, &thresholds).agent;
        }
        assert!(agent.anomaly_flags[0].archived);
    }

    #[test]
    fn decay_pulls_toward_baseline_without_overshooting() {
        let mut agent = fresh_agent();
        agent.dimensions = garl_types::app::Agent::new(
            Uuid::new_v4(),
            "x".into(),
            None,
            None,
            Category::Coding,
            "h".into(),
            false,
        )
        .dimensions;
        agent.dimensions.reliability = 70.0;
        agent.dimensions.security = 70.0;
        agent.dimensions.speed = 70.0;
        agent.dimensions.cost_efficiency = 70.0;
        agent.dimensions.consistency = 70.0;
        agent.trust_score = 70.0;
        agent.last_trace_at = Some(Utc::now() - Duration::days(100));

        let config = ReputationConfig::default();
        let decayed = apply_decay(&agent, Utc::now(), &config).expect("dormant long enough to decay");

        assert!(decayed.agent.dimensions.reliability < 70.0);
        assert!(decayed.agent.dimensions.reliability > 50.0);
        assert!((decayed.agent.dimensions.reliability - 68.1).abs() < 0.2);
    }

    #[test]
    fn decay_is_none_within_grace_period() {
        let mut agent = fresh_agent();
        agent.last_trace_at = Some(Utc::now() - Duration::hours(1));
        let config = ReputationConfig::default();
        assert!(apply_decay(&agent, Utc::now(), &config).is_none());
    }
}
