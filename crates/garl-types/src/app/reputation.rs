//! Append-only reputation event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::Dimensions;
use super::common::EventType;
use super::AgentId;

/// One row per event that moved an agent's score: a trace, an endorsement, a
/// decay tick, or an anomaly. Append-only; never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationHistory {
    /// The agent this event applies to.
    pub agent_id: AgentId,
    /// The composite trust score immediately after this event.
    pub trust_score: f64,
    /// The five dimensional scores immediately after this event.
    pub dimensions: Dimensions,
    /// What kind of event produced this row.
    pub event_type: EventType,
    /// The signed change in composite trust score this event caused.
    pub trust_delta: f64,
    /// When this event was recorded.
    pub created_at: DateTime<Utc>,
}
