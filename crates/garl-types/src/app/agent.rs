//! The `Agent` aggregate: identity plus the mutable reputation state the
//! engine updates in response to traces, endorsements, and decay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{AnomalySeverity, AnomalyType, Category, CertificationTier};
use super::AgentId;

/// A single anomaly observation attached to an agent by the reputation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyFlag {
    /// Which kind of anomaly was observed.
    pub anomaly_type: AnomalyType,
    /// How serious the anomaly is considered.
    pub severity: AnomalySeverity,
    /// A short, human-readable explanation.
    pub message: String,
    /// `true` once auto-archived (warnings only) or manually cleared.
    pub archived: bool,
    /// When the anomaly was detected.
    pub detected_at: DateTime<Utc>,
}

/// The five reputation dimensions tracked for every agent, each an exponential
/// moving average in `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Dimensions {
    /// Task completion rate, weighted by streak bonus.
    pub reliability: f64,
    /// Adherence to declared tool/permission boundaries.
    pub security: f64,
    /// Execution latency relative to the category benchmark.
    pub speed: f64,
    /// Execution cost relative to the category benchmark.
    pub cost_efficiency: f64,
    /// Variance of recent reliability observations (lower variance scores higher).
    pub consistency: f64,
}

impl Dimensions {
    /// The composite trust score: `0.30*reliability + 0.20*security + 0.15*speed
    /// + 0.10*cost_efficiency + 0.25*consistency`. See `SPEC_FULL.md` Q1.
    pub fn composite(&self) -> f64 {
        0.30 * self.reliability
            + 0.20 * self.security
            + 0.15 * self.speed
            + 0.10 * self.cost_efficiency
            + 0.25 * self.consistency
    }
}

/// An autonomous agent registered with the oracle: identity, declared
/// framework/category, and the mutable reputation state the engine owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Globally unique identifier.
    pub agent_id: AgentId,
    /// Stable, dereferenceable handle: `did:garl:<agent_id>`.
    pub sovereign_id: String,
    /// Display name chosen at registration.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// The agent framework the owner declares (e.g. "langchain", "custom").
    pub framework: Option<String>,
    /// The task domain this agent primarily operates in.
    pub category: Category,
    /// SHA-256 of the random secret shown once at registration.
    pub api_key_hash: String,
    /// `true` for agents created for testing; excluded from leaderboard/routing/stats.
    pub is_sandbox: bool,
    /// `true` once the owner has soft-deleted the agent. No hard delete exists.
    pub is_deleted: bool,

    /// The five current dimensional EMAs.
    pub dimensions: Dimensions,
    /// The composite score derived from `dimensions`, clamped to `[0, 100]`.
    pub trust_score: f64,
    /// The coarse tier derived from `trust_score`.
    pub certification_tier: CertificationTier,

    /// Total traces ever recorded for this agent.
    pub total_traces: u64,
    /// Traces with `status == Success`.
    pub success_count: u64,
    /// `success_count / total_traces * 100`, or `0.0` with no traces.
    pub success_rate: f64,
    /// The current unbroken run of `Success` traces.
    pub consecutive_successes: u64,
    /// Running average of `duration_ms` across all traces.
    pub avg_duration_ms: f64,
    /// Running sum of `cost_usd` across all traces that reported one.
    pub total_cost_usd: f64,

    /// All anomaly flags ever raised, including archived ones.
    pub anomaly_flags: Vec<AnomalyFlag>,
    /// Consecutive traces since the last anomaly, used to auto-archive `warning` flags.
    pub clean_trace_streak: u64,
    /// The last `consistency_window` reliability observations, oldest first,
    /// used to compute the rolling-variance `consistency` dimension.
    pub recent_reliability_obs: Vec<f64>,

    /// Sybil-weighted bonus accumulated from endorsements received.
    pub endorsement_score: f64,
    /// Number of endorsements received.
    pub endorsement_count: u64,

    /// Timestamp of the most recently recorded trace, used by the decay scheduler.
    pub last_trace_at: Option<DateTime<Utc>>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent mutation (trace, endorsement, or decay).
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// The baseline value every dimensional score and the composite start at.
    pub const BASELINE_SCORE: f64 = 50.0;

    /// Constructs a freshly registered agent with all scores at the baseline.
    pub fn new(
        agent_id: AgentId,
        name: String,
        description: Option<String>,
        framework: Option<String>,
        category: Category,
        api_key_hash: String,
        is_sandbox: bool,
    ) -> Self {
        let now = Utc::now();
        let dimensions = Dimensions {
            reliability: Self::BASELINE_SCORE,
            security: Self::BASELINE_SCORE,
            speed: Self::BASELINE_SCORE,
            cost_efficiency: Self::BASELINE_SCORE,
            consistency: Self::BASELINE_SCORE,
        };
        Self {
            agent_id,
            sovereign_id: super::sovereign_id(agent_id),
            name,
            description,
            framework,
            category,
            api_key_hash,
            is_sandbox,
            is_deleted: false,
            dimensions,
            trust_score: Self::BASELINE_SCORE,
            certification_tier: CertificationTier::from_score(Self::BASELINE_SCORE),
            total_traces: 0,
            success_count: 0,
            success_rate: 0.0,
            consecutive_successes: 0,
            avg_duration_ms: 0.0,
            total_cost_usd: 0.0,
            anomaly_flags: Vec::new(),
            clean_trace_streak: 0,
            recent_reliability_obs: Vec::new(),
            endorsement_score: 0.0,
            endorsement_count: 0,
            last_trace_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `true` once the agent has enough history for its verdict to be trusted.
    pub fn is_verified(&self) -> bool {
        self.total_traces >= 10
    }

    /// Active (non-archived) anomaly flags.
    pub fn active_anomalies(&self) -> impl Iterator<Item = &AnomalyFlag> {
        self.anomaly_flags.iter().filter(|f| !f.archived)
    }

    /// `true` if any active flag is `Critical`.
    pub fn has_critical_anomaly(&self) -> bool {
        self.active_anomalies()
            .any(|f| f.severity == AnomalySeverity::Critical)
    }

    /// `trust_score` clamped to the public `[0, 100]` range, folding in the
    /// endorsement bonus before clamping (see the Agent invariant in `SPEC_FULL.md`).
    pub fn clamped_trust_score(&self) -> f64 {
        (self.trust_score + self.endorsement_score).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with(total_traces: u64) -> Agent {
        let mut agent = Agent::new(
            uuid::Uuid::new_v4(),
            "agent".into(),
            None,
            None,
            Category::Coding,
            "h".into(),
            false,
        );
        agent.total_traces = total_traces;
        agent
    }

    #[test]
    fn is_verified_flips_at_ten_traces() {
        assert!(!agent_with(9).is_verified());
        assert!(agent_with(10).is_verified());
    }

    #[test]
    fn clamped_trust_score_never_exceeds_the_public_range() {
        let mut agent = agent_with(20);
        agent.trust_score = 95.0;
        agent.endorsement_score = 10.0;
        assert_eq!(agent.clamped_trust_score(), 100.0);

        agent.trust_score = 2.0;
        agent.endorsement_score = -10.0;
        assert_eq!(agent.clamped_trust_score(), 0.0);
    }
}
