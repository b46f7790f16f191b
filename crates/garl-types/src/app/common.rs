//! Closed enumerations used at the boundary instead of free-form strings.

use serde::{Deserialize, Serialize};

/// The task domain an agent (and each of its traces) operates in.
///
/// Category drives both the speed/cost benchmarks used by the reputation
/// engine and the grouping used by the routing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Software authoring, review, and repair tasks.
    Coding,
    /// Information gathering and synthesis tasks.
    Research,
    /// Outbound/inbound sales and CRM automation.
    Sales,
    /// ETL, analytics, and data-pipeline tasks.
    Data,
    /// General workflow and RPA-style automation.
    Automation,
    /// Anything that does not fit the above.
    Other,
}

impl Category {
    /// The speed benchmark, in milliseconds, used to score the `speed` dimension.
    pub const fn speed_benchmark_ms(self) -> u64 {
        match self {
            Category::Coding => 10_000,
            Category::Research => 15_000,
            Category::Sales => 5_000,
            Category::Data => 12_000,
            Category::Automation => 8_000,
            Category::Other => 10_000,
        }
    }

    /// The cost benchmark, in USD, used to score the `cost_efficiency` dimension.
    pub const fn cost_benchmark_usd(self) -> f64 {
        match self {
            Category::Coding => 0.05,
            Category::Research => 0.08,
            Category::Sales => 0.03,
            Category::Data => 0.06,
            Category::Automation => 0.04,
            Category::Other => 0.05,
        }
    }
}

/// The outcome of a single execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// The task completed as intended.
    Success,
    /// The task failed outright.
    Failure,
    /// The task completed with a degraded or incomplete result.
    Partial,
}

/// The coarse certification bucket derived from an agent's composite trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificationTier {
    /// `trust_score < 40`.
    Bronze,
    /// `40 <= trust_score < 70`.
    Silver,
    /// `70 <= trust_score < 90`.
    Gold,
    /// `trust_score >= 90`.
    Enterprise,
}

impl CertificationTier {
    /// Derives the tier that corresponds to a given composite trust score.
    ///
    /// Pure function of `trust_score`; see [I6 in the design notes](crate) invariant.
    pub fn from_score(trust_score: f64) -> Self {
        if trust_score >= 90.0 {
            CertificationTier::Enterprise
        } else if trust_score >= 70.0 {
            CertificationTier::Gold
        } else if trust_score >= 40.0 {
            CertificationTier::Silver
        } else {
            CertificationTier::Bronze
        }
    }

    /// The Sybil-resistance weight applied to endorsements issued by an agent at this tier.
    pub const fn endorsement_multiplier(self) -> f64 {
        match self {
            CertificationTier::Bronze => 0.5,
            CertificationTier::Silver => 1.0,
            CertificationTier::Gold => 1.5,
            CertificationTier::Enterprise => 2.0,
        }
    }
}

/// The kind of statistically unusual behaviour an anomaly flag records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    /// A `failure` trace from an agent whose recent success rate is otherwise high.
    UnexpectedFailure,
    /// A trace whose duration vastly exceeds the agent's rolling average.
    DurationSpike,
    /// A trace whose cost vastly exceeds the agent's rolling average cost per trace.
    CostSpike,
    /// A trace that declared permissions it did not honor.
    PermissionViolation,
}

/// The severity assigned to an anomaly flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    /// Auto-archives after 50 consecutive clean traces.
    Warning,
    /// Never auto-clears; assigned when two or more anomaly types coincide on one trace.
    Critical,
}

/// The kind of event recorded in an agent's reputation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A trace was recorded and the reputation engine updated the agent's scores.
    Trace,
    /// An endorsement was created targeting this agent.
    Endorsement,
    /// Time-decay pulled the agent's scores toward the baseline.
    Decay,
    /// An anomaly flag was attached to the agent.
    Anomaly,
}

/// The set of webhook event types a subscription may opt into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    /// Fired for every successfully recorded trace.
    TraceRecorded,
    /// Fired when `|trust_delta| >= 2`.
    ScoreChange,
    /// Fired when `total_traces` crosses a milestone threshold.
    Milestone,
    /// Fired for each newly detected anomaly flag.
    Anomaly,
    /// Fired when `certification_tier` changes.
    TierChange,
}

/// The risk bucket attached to a trust verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Safe to delegate without additional oversight.
    Low,
    /// Safe to delegate with monitoring.
    Medium,
    /// Delegate only with tight oversight.
    High,
    /// Do not delegate.
    Critical,
}

/// The recommendation attached to a trust verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationLevel {
    /// `score >= 75`, verified, no active anomaly.
    Trusted,
    /// `score >= 60`, verified.
    TrustedWithMonitoring,
    /// `score >= 50`.
    ProceedWithMonitoring,
    /// `score >= 25`.
    Caution,
    /// `score < 25`.
    DoNotDelegate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certification_tier_is_a_pure_function_of_score() {
        assert_eq!(CertificationTier::from_score(39.9), CertificationTier::Bronze);
        assert_eq!(CertificationTier::from_score(40.0), CertificationTier::Silver);
        assert_eq!(CertificationTier::from_score(69.9), CertificationTier::Silver);
        assert_eq!(CertificationTier::from_score(70.0), CertificationTier::Gold);
        assert_eq!(CertificationTier::from_score(89.9), CertificationTier::Gold);
        assert_eq!(CertificationTier::from_score(90.0), CertificationTier::Enterprise);
        assert_eq!(
            CertificationTier::from_score(70.0),
            CertificationTier::from_score(70.0)
        );
    }
}
