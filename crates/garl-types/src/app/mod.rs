//! Core application-level data structures shared by every crate in the workspace.

mod agent;
mod common;
mod endorsement;
mod event;
mod reputation;
mod trace;
mod verdict;
mod webhook;

pub use agent::{Agent, AnomalyFlag, Dimensions};
pub use common::{
    AnomalySeverity, AnomalyType, Category, CertificationTier, EventType, RecommendationLevel,
    RiskLevel, TraceStatus, WebhookEventType,
};
pub use endorsement::Endorsement;
pub use event::WebhookEvent;
pub use reputation::ReputationHistory;
pub use trace::{CanonicalTracePayload, Certificate, CertificatePayload, CertificateProof, Trace, ToolCall};
pub use verdict::Verdict;
pub use webhook::Webhook;

/// A globally unique agent identifier (UUIDv4, rendered as a string at the boundary).
pub type AgentId = uuid::Uuid;
/// A globally unique trace identifier.
pub type TraceId = uuid::Uuid;
/// A globally unique endorsement identifier.
pub type EndorsementId = uuid::Uuid;
/// A globally unique webhook subscription identifier.
pub type WebhookId = uuid::Uuid;

/// Builds the sovereign DID for an agent: `did:garl:<agent_id>`.
pub fn sovereign_id(agent_id: AgentId) -> String {
    format!("did:garl:{agent_id}")
}
