// Path: crates/garl-engine/src/routing.rs
//! The routing engine: ranks agents in a category for delegation.

use chrono::Utc;
use garl_storage::Storage;
use garl_types::app::{Agent, Category, CertificationTier};
use garl_types::config::ReputationConfig;
use garl_types::error::GarlError;

use crate::reputation;

/// Returns up to `limit` agents in `category` with tier `>= min_tier`,
/// excluding deleted, sandboxed, or critically-anomalous agents
/// (`spec.md` §4.4, Q3). Sorted by trust score descending, ties broken by
/// `total_traces` descending.
///
/// Applies decay on-the-fly for ranking purposes without persisting it — the
/// compute-on-read strategy `spec.md` §5 allows as an alternative to the
/// persisted-decay strategy `verdict` uses; listing many agents on every
/// routing call is the case where avoiding a write-per-agent matters.
pub async fn route(
    storage: &dyn Storage,
    category: Category,
    min_tier: CertificationTier,
    limit: usize,
    config: &ReputationConfig,
) -> Result<Vec<Agent>, GarlError> {
    let agents = storage.list_agents_by_category(category).await?;
    let now = Utc::now();

    let mut candidates: Vec<Agent> = agents
        .into_iter()
        .map(|agent| match reputation::apply_decay(&agent, now, config) {
            Some(decayed) => decayed.agent,
            None => agent,
        })
        .filter(|agent| {
            !agent.is_deleted
                && !agent.is_sandbox
                && agent.certification_tier >= min_tier
                && !agent.has_critical_anomaly()
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.clamped_trust_score()
            .partial_cmp(&a.clamped_trust_score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.total_traces.cmp(&a.total_traces))
    });
    candidates.truncate(limit);
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use garl_storage::InMemoryStorage;
    use uuid::Uuid;

    fn agent_with(category: Category, trust_score: f64, sandbox: bool, deleted: bool) -> Agent {
        let mut agent = Agent::new(
            Uuid::new_v4(),
            "a".into(),
            None,
            None,
            category,
            "h".into(),
            sandbox,
        );
        agent.is_deleted = deleted;
        agent.trust_score = trust_score;
        agent.dimensions.reliability = trust_score;
        agent.dimensions.security = trust_score;
        agent.dimensions.speed = trust_score;
        agent.dimensions.cost_efficiency = trust_score;
        agent.dimensions.consistency = trust_score;
        agent.certification_tier = CertificationTier::from_score(trust_score);
        agent.total_traces = 20;
        agent
    }

    #[tokio::test]
    async fn excludes_sandbox_deleted_and_low_tier_and_sorts_descending() {
        let storage = InMemoryStorage::new();
        let top = agent_with(Category::Coding, 90.0, false, false);
        let mid = agent_with(Category::Coding, 75.0, false, false);
        let sandboxed = agent_with(Category::Coding, 95.0, true, false);
        let deleted = agent_with(Category::Coding, 95.0, false, true);
        let low_tier = agent_with(Category::Coding, 30.0, false, false);
        for agent in [&top, &mid, &sandboxed, &deleted, &low_tier] {
            storage.insert_agent(agent.clone()).await.unwrap();
        }

        let config = ReputationConfig::default();
        let ranked = route(&storage, Category::Coding, CertificationTier::Silver, 10, &config)
            .await
            .unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].agent_id, top.agent_id);
        assert_eq!(ranked[1].agent_id, mid.agent_id);
    }

    #[tokio::test]
    async fn excludes_agents_with_critical_anomaly() {
        let storage = InMemoryStorage::new();
        let mut flagged = agent_with(Category::Coding, 90.0, false, false);
        flagged.anomaly_flags.push(garl_types::app::AnomalyFlag {
            anomaly_type: garl_types::app::AnomalyType::CostSpike,
            severity: garl_types::app::AnomalySeverity::Critical,
            message: "coincident anomalies".into(),
            archived: false,
            detected_at: Utc::now(),
        });
        storage.insert_agent(flagged.clone()).await.unwrap();

        let config = ReputationConfig::default();
        let ranked = route(&storage, Category::Coding, CertificationTier::Bronze, 10, &config)
            .await
            .unwrap();
        assert!(ranked.is_empty());
    }
}
