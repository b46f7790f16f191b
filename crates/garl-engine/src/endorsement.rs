// Path: crates/garl-engine/src/endorsement.rs
//! The endorsement engine: directed, Sybil-weighted reputation edges.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use garl_storage::Storage;
use garl_types::app::{AgentId, Endorsement, EventType, ReputationHistory};
use garl_types::config::ReputationConfig;
use garl_types::error::GarlError;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// The per-agent lock registry type shared with [`crate::pipeline::Pipeline`],
/// so an endorsement targeting an agent can never interleave with a trace
/// submission or decay application mutating that same agent's scores.
pub type AgentLocks = DashMap<AgentId, Arc<AsyncMutex<()>>>;

/// The result of a successful `endorse` call.
pub struct EndorseOutcome {
    /// The persisted endorsement edge.
    pub endorsement: Endorsement,
    /// The target agent's state immediately after the bonus was applied.
    pub target_agent: garl_types::app::Agent,
}

/// Creates an `endorser_id -> target_id` endorsement edge.
///
/// Bonus formula (`SPEC_FULL.md` §4.5): `w_score * w_traces * tier_multiplier`,
/// where `w_score = max(0, (endorser_score - 60) / 40)` and
/// `w_traces = min(1, endorser_traces / 10)`. Since `tier_multiplier` tops out
/// at 2.0 (enterprise) and both weights top out at 1.0, the product already
/// caps at `config.max_endorsement_bonus`; the `min` below is a belt-and-braces
/// clamp rather than a rescale.
///
/// `locks` must be the same [`AgentLocks`] registry the caller's trace
/// pipeline and decay scheduler guard their own mutations of `target_id`
/// with — the read-modify-write on `target.endorsement_score`/
/// `endorsement_count` below is linearised against those, not just against
/// other endorsements, per the single-writer-per-agent invariant.
pub async fn endorse(
    storage: &dyn Storage,
    endorser_id: AgentId,
    target_id: AgentId,
    context: Option<String>,
    config: &ReputationConfig,
    locks: &AgentLocks,
) -> Result<EndorseOutcome, GarlError> {
    if endorser_id == target_id {
        return Err(GarlError::SelfEndorsement);
    }
    if storage
        .find_endorsement(endorser_id, target_id)
        .await?
        .is_some()
    {
        return Err(GarlError::Duplicate(format!(
            "endorsement {endorser_id} -> {target_id} already exists"
        )));
    }

    let endorser = storage
        .get_agent(endorser_id)
        .await?
        .ok_or_else(|| GarlError::NotFound(format!("agent {endorser_id}")))?;

    let endorser_score = endorser.clamped_trust_score();
    let w_score = ((endorser_score - 60.0) / 40.0).max(0.0);
    let w_traces = (endorser.total_traces as f64 / 10.0).min(1.0);
    let tier_multiplier = endorser.certification_tier.endorsement_multiplier();
    let bonus = (w_score * w_traces * tier_multiplier)
        .clamp(0.0, config.max_endorsement_bonus);

    let lock = locks
        .entry(target_id)
        .or_insert_with(|| Arc::new(AsyncMutex::new(())))
        .clone();
    let _guard = lock.lock().await;

    let mut target = storage
        .get_agent(target_id)
        .await?
        .ok_or_else(|| GarlError::NotFound(format!("agent {target_id}")))?;

    let endorsement = Endorsement {
        id: Uuid::new_v4(),
        endorser_id,
        target_id,
        endorser_score,
        endorser_traces: endorser.total_traces,
        endorser_tier: endorser.certification_tier,
        bonus_applied: bonus,
        tier_multiplier,
        context,
        created_at: Utc::now(),
    };
    storage.insert_endorsement(endorsement.clone()).await?;

    let trust_before = target.clamped_trust_score();
    target.endorsement_score += bonus;
    target.endorsement_count += 1;
    target.updated_at = Utc::now();
    let trust_after = target.clamped_trust_score();

    storage.update_agent(target.clone()).await?;
    storage
        .append_reputation_history(ReputationHistory {
            agent_id: target_id,
            trust_score: trust_after,
            dimensions: target.dimensions,
            event_type: EventType::Endorsement,
            trust_delta: trust_after - trust_before,
            created_at: target.updated_at,
        })
        .await?;

    drop(_guard);

    tracing::debug!(
        endorser_id = %endorser_id,
        target_id = %target_id,
        bonus,
        "endorsement recorded"
    );

    Ok(EndorseOutcome {
        endorsement,
        target_agent: target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use garl_storage::InMemoryStorage;
    use garl_types::app::{Agent, Category};

    async fn seeded_agent(storage: &InMemoryStorage, traces: u64, trust_score: f64) -> Agent {
        let mut agent = Agent::new(
            Uuid::new_v4(),
            "agent".into(),
            None,
            None,
            Category::Coding,
            "hash".into(),
            false,
        );
        agent.total_traces = traces;
        agent.trust_score = trust_score;
        agent.dimensions.reliability = trust_score;
        agent.dimensions.security = trust_score;
        agent.dimensions.speed = trust_score;
        agent.dimensions.cost_efficiency = trust_score;
        agent.dimensions.consistency = trust_score;
        agent.certification_tier = garl_types::app::CertificationTier::from_score(trust_score);
        storage.insert_agent(agent.clone()).await.unwrap();
        agent
    }

    #[tokio::test]
    async fn self_endorsement_is_rejected() {
        let storage = InMemoryStorage::new();
        let agent = seeded_agent(&storage, 20, 80.0).await;
        let config = ReputationConfig::default();
        let locks = AgentLocks::new();
        let result = endorse(&storage, agent.agent_id, agent.agent_id, None, &config, &locks).await;
        assert!(matches!(result, Err(GarlError::SelfEndorsement)));
    }

    #[tokio::test]
    async fn low_trust_endorser_contributes_zero_bonus() {
        let storage = InMemoryStorage::new();
        let endorser = seeded_agent(&storage, 20, 50.0).await;
        let target = seeded_agent(&storage, 20, 50.0).await;
        let config = ReputationConfig::default();
        let locks = AgentLocks::new();
        let outcome = endorse(&storage, endorser.agent_id, target.agent_id, None, &config, &locks)
            .await
            .unwrap();
        assert_eq!(outcome.endorsement.bonus_applied, 0.0);
    }

    #[tokio::test]
    async fn high_trust_enterprise_endorser_caps_at_max_bonus() {
        let storage = InMemoryStorage::new();
        let endorser = seeded_agent(&storage, 50, 100.0).await;
        let target = seeded_agent(&storage, 20, 50.0).await;
        let config = ReputationConfig::default();
        let locks = AgentLocks::new();
        let outcome = endorse(&storage, endorser.agent_id, target.agent_id, None, &config, &locks)
            .await
            .unwrap();
        assert!((outcome.endorsement.bonus_applied - config.max_endorsement_bonus).abs() < 1e-9);
        assert_eq!(outcome.target_agent.endorsement_count, 1);
    }

    #[tokio::test]
    async fn duplicate_endorsement_is_rejected() {
        let storage = InMemoryStorage::new();
        let endorser = seeded_agent(&storage, 50, 100.0).await;
        let target = seeded_agent(&storage, 20, 50.0).await;
        let config = ReputationConfig::default();
        let locks = AgentLocks::new();
        endorse(&storage, endorser.agent_id, target.agent_id, None, &config, &locks)
            .await
            .unwrap();
        let second =
            endorse(&storage, endorser.agent_id, target.agent_id, None, &config, &locks).await;
        assert!(matches!(second, Err(GarlError::Duplicate(_))));
    }

    #[tokio::test]
    async fn concurrent_endorsements_of_the_same_target_do_not_lose_an_update() {
        let storage = Arc::new(InMemoryStorage::new());
        let target = seeded_agent(&storage, 20, 50.0).await;
        let config = Arc::new(ReputationConfig::default());
        let locks = Arc::new(AgentLocks::new());

        let mut endorsers = Vec::new();
        for _ in 0..5 {
            endorsers.push(seeded_agent(&storage, 50, 100.0).await);
        }

        let mut handles = Vec::new();
        for endorser in endorsers {
            let storage = Arc::clone(&storage);
            let config = Arc::clone(&config);
            let locks = Arc::clone(&locks);
            let target_id = target.agent_id;
            handles.push(tokio::spawn(async move {
                endorse(&*storage, endorser.agent_id, target_id, None, &config, &locks)
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let final_target = storage.get_agent(target.agent_id).await.unwrap().unwrap();
        assert_eq!(final_target.endorsement_count, 5);
        let history = storage
            .list_reputation_history(target.agent_id, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 5);
    }
}
