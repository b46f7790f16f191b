//! Directed, immutable endorsement edges in the agent trust graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::CertificationTier;
use super::{AgentId, EndorsementId};

/// A directed `endorser -> target` edge. Immutable once created; unique per
/// `(endorser_id, target_id)` pair, and self-endorsement is forbidden.
///
/// The Sybil-weighted `bonus_applied` is computed once, from a snapshot of the
/// endorser's state at creation time, and never re-evaluated: the endorsement
/// graph may contain cycles, but because bonuses are not recomputed there is
/// nothing for a cycle to cascade through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endorsement {
    /// Globally unique identifier.
    pub id: EndorsementId,
    /// The agent issuing the endorsement.
    pub endorser_id: AgentId,
    /// The agent receiving the endorsement's bonus.
    pub target_id: AgentId,
    /// The endorser's composite trust score at the time of endorsement.
    pub endorser_score: f64,
    /// The endorser's total trace count at the time of endorsement.
    pub endorser_traces: u64,
    /// The endorser's certification tier at the time of endorsement.
    pub endorser_tier: CertificationTier,
    /// The bonus added to the target's `endorsement_score`. Zero if the
    /// endorser was below the Sybil-resistance thresholds.
    pub bonus_applied: f64,
    /// The tier-derived multiplier used in the bonus calculation.
    pub tier_multiplier: f64,
    /// Optional free-text context supplied by the endorser.
    pub context: Option<String>,
    /// When the endorsement was created.
    pub created_at: DateTime<Utc>,
}
