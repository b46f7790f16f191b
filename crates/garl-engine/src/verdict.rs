// Path: crates/garl-engine/src/verdict.rs
//! The trust verdict: the read-side answer to "should I trust this agent?"

use chrono::Utc;
use garl_storage::Storage;
use garl_types::app::{AgentId, EventType, RecommendationLevel, ReputationHistory, RiskLevel, Verdict};
use garl_types::config::ReputationConfig;
use garl_types::error::GarlError;

use crate::reputation;

/// Produces a point-in-time [`Verdict`] for `agent_id`, applying any pending
/// decay first and persisting it (`SPEC_FULL.md` §4.4 / §5: the persisted-decay
/// strategy, not the compute-on-the-fly one, so every subsequent reader sees
/// the same decayed state).
pub async fn verdict(
    storage: &dyn Storage,
    agent_id: AgentId,
    config: &ReputationConfig,
) -> Result<Verdict, GarlError> {
    let agent = storage
        .get_agent(agent_id)
        .await?
        .ok_or_else(|| GarlError::NotFound(format!("agent {agent_id}")))?;

    let agent = match reputation::apply_decay(&agent, Utc::now(), config) {
        Some(decayed) => {
            storage.update_agent(decayed.agent.clone()).await?;
            storage
                .append_reputation_history(ReputationHistory {
                    agent_id,
                    trust_score: decayed.agent.clamped_trust_score(),
                    dimensions: decayed.agent.dimensions,
                    event_type: EventType::Decay,
                    trust_delta: decayed.trust_delta,
                    created_at: decayed.agent.updated_at,
                })
                .await?;
            decayed.agent
        }
        None => agent,
    };

    let trust_score = agent.clamped_trust_score();
    let verified = agent.is_verified();
    let has_active_anomaly = agent.active_anomalies().next().is_some();
    let (recommendation, risk_level) = recommend(trust_score, verified, has_active_anomaly);

    Ok(Verdict {
        agent_id,
        trust_score,
        verified,
        risk_level,
        recommendation,
        certification_tier: agent.certification_tier,
        dimensions: agent.dimensions,
        anomalies: agent.active_anomalies().cloned().collect(),
        last_active: agent.last_trace_at,
    })
}

/// Top-down, first-match recommendation table (`spec.md` §4.4).
fn recommend(
    trust_score: f64,
    verified: bool,
    has_active_anomaly: bool,
) -> (RecommendationLevel, RiskLevel) {
    if trust_score >= 75.0 && verified && !has_active_anomaly {
        (RecommendationLevel::Trusted, RiskLevel::Low)
    } else if trust_score >= 60.0 && verified {
        (RecommendationLevel::TrustedWithMonitoring, RiskLevel::Low)
    } else if trust_score >= 50.0 {
        (RecommendationLevel::ProceedWithMonitoring, RiskLevel::Medium)
    } else if trust_score >= 25.0 {
        (RecommendationLevel::Caution, RiskLevel::High)
    } else {
        (RecommendationLevel::DoNotDelegate, RiskLevel::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garl_storage::InMemoryStorage;
    use garl_types::app::{Agent, Category};
    use uuid::Uuid;

    #[tokio::test]
    async fn unverified_agent_below_ten_traces_is_not_verified() {
        let storage = InMemoryStorage::new();
        let agent = Agent::new(
            Uuid::new_v4(),
            "a".into(),
            None,
            None,
            Category::Coding,
            "h".into(),
            false,
        );
        let agent_id = agent.agent_id;
        storage.insert_agent(agent).await.unwrap();

        let config = ReputationConfig::default();
        let v = verdict(&storage, agent_id, &config).await.unwrap();
        assert!(!v.verified);
        assert_eq!(v.recommendation, RecommendationLevel::ProceedWithMonitoring);
    }

    #[tokio::test]
    async fn verified_high_score_no_anomaly_is_trusted() {
        let storage = InMemoryStorage::new();
        let mut agent = Agent::new(
            Uuid::new_v4(),
            "a".into(),
            None,
            None,
            Category::Coding,
            "h".into(),
            false,
        );
        agent.total_traces = 20;
        agent.trust_score = 80.0;
        agent.dimensions.reliability = 80.0;
        agent.dimensions.security = 80.0;
        agent.dimensions.speed = 80.0;
        agent.dimensions.cost_efficiency = 80.0;
        agent.dimensions.consistency = 80.0;
        let agent_id = agent.agent_id;
        storage.insert_agent(agent).await.unwrap();

        let config = ReputationConfig::default();
        let v = verdict(&storage, agent_id, &config).await.unwrap();
        assert!(v.verified);
        assert_eq!(v.recommendation, RecommendationLevel::Trusted);
        assert_eq!(v.risk_level, RiskLevel::Low);
    }
}
