//! The read-side answer to "should I trust this agent?"

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::{AnomalyFlag, Dimensions};
use super::common::{CertificationTier, RecommendationLevel, RiskLevel};
use super::AgentId;

/// A point-in-time trust assessment for a single agent, produced by the trust
/// verdict component after applying any pending decay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// The agent this verdict describes.
    pub agent_id: AgentId,
    /// Composite trust score, clamped to `[0, 100]`.
    pub trust_score: f64,
    /// `true` once the agent has recorded at least 10 traces.
    pub verified: bool,
    /// The coarse risk bucket derived from the recommendation rule.
    pub risk_level: RiskLevel,
    /// The top-down, first-match recommendation.
    pub recommendation: RecommendationLevel,
    /// The certification tier derived from `trust_score`.
    pub certification_tier: CertificationTier,
    /// The five underlying dimensional scores.
    pub dimensions: Dimensions,
    /// Currently active (non-archived) anomaly flags.
    pub anomalies: Vec<AnomalyFlag>,
    /// The agent's `last_trace_at`, if it has ever recorded one.
    pub last_active: Option<DateTime<Utc>>,
}
