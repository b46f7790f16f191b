// Path: crates/garl-test-utils/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Garl Test Utils
//!
//! Builders and seeded fixtures shared by the other crates' test suites, so a
//! scenario test reads as "given this agent, submit this trace" rather than
//! repeating fifteen-field struct literals. Nothing here is exported outside
//! `#[cfg(test)]`/`dev-dependencies` use.

use chrono::Utc;
use garl_storage::InMemoryStorage;
use garl_types::app::{Agent, Category, Dimensions, ToolCall, TraceStatus};
use uuid::Uuid;

/// Builds an `Agent` at an arbitrary trust score, bypassing the EMA machinery
/// that would normally get it there. Every dimension is set to `score`, so
/// `agent.trust_score` (the raw composite) equals `score` exactly.
pub fn agent_at(score: f64, total_traces: u64, category: Category) -> Agent {
    let mut agent = Agent::new(
        Uuid::new_v4(),
        "test-agent".to_string(),
        None,
        None,
        category,
        hashed_api_key("test-secret"),
        false,
    );
    agent.dimensions = Dimensions {
        reliability: score,
        security: score,
        speed: score,
        cost_efficiency: score,
        consistency: score,
    };
    agent.trust_score = agent.dimensions.composite();
    agent.certification_tier = garl_types::app::CertificationTier::from_score(agent.trust_score);
    agent.total_traces = total_traces;
    agent.success_count = total_traces;
    agent.success_rate = if total_traces == 0 { 0.0 } else { 100.0 };
    agent.last_trace_at = Some(Utc::now());
    agent
}

/// A freshly registered agent with every dimension at the baseline (50.0) and
/// no trace history.
pub fn fresh_agent(category: Category) -> Agent {
    Agent::new(
        Uuid::new_v4(),
        "fresh-agent".to_string(),
        None,
        None,
        category,
        hashed_api_key("fresh-secret"),
        false,
    )
}

/// SHA-256 hex of `api_key`, matching `garl_engine::hash_api_key`'s scheme
/// without pulling in a dependency on `garl-engine` from this crate.
pub fn hashed_api_key(api_key: &str) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// A minimal well-formed tool call, for submissions that need at least one.
pub fn tool_call(name: &str, duration_ms: u64) -> ToolCall {
    ToolCall {
        name: name.to_string(),
        duration_ms,
    }
}

/// Builds a fresh `InMemoryStorage`, named to make test setup read as intent
/// ("seeded_storage") rather than a bare constructor call.
pub fn seeded_storage() -> InMemoryStorage {
    InMemoryStorage::new()
}

/// The default status used by fixture submissions that don't care about it.
pub const DEFAULT_STATUS: TraceStatus = TraceStatus::Success;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_at_sets_every_dimension_uniformly() {
        let agent = agent_at(72.0, 15, Category::Coding);
        assert_eq!(agent.dimensions.reliability, 72.0);
        assert_eq!(agent.dimensions.consistency, 72.0);
        assert!((agent.trust_score - 72.0).abs() < 1e-9);
        assert_eq!(agent.total_traces, 15);
    }

    #[test]
    fn fresh_agent_starts_at_baseline() {
        let agent = fresh_agent(Category::Data);
        assert_eq!(agent.trust_score, Agent::BASELINE_SCORE);
        assert_eq!(agent.total_traces, 0);
    }
}
