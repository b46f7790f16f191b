// Path: crates/garl-engine/tests/scenarios.rs
//! End-to-end scenario tests exercising the engine's public surface the way
//! a node binary would: register an agent, submit traces through the
//! pipeline, endorse, route, and read verdicts back out.

use std::sync::Arc;

use chrono::{Duration, Utc};
use garl_crypto::SigningKey;
use garl_engine::{hash_api_key, route, verdict, Pipeline, TraceSubmission};
use garl_storage::{InMemoryStorage, Storage};
use garl_types::app::{Agent, Category, CertificationTier, TraceStatus};
use garl_types::config::{EngineConfig, WebhookConfig};
use uuid::Uuid;

fn pipeline_over(storage: Arc<dyn Storage>) -> Pipeline {
    let key = Arc::new(SigningKey::generate());
    let config = Arc::new(EngineConfig::default());
    let (handle, _join) = garl_webhook::Dispatcher::spawn(Arc::clone(&storage), WebhookConfig::default());
    Pipeline::new(storage, key, config, handle)
}

fn submission(agent: &Agent, status: TraceStatus, duration_ms: u64) -> TraceSubmission {
    TraceSubmission {
        agent_id: agent.agent_id,
        task_description: "handled a task".into(),
        status,
        duration_ms,
        category: agent.category,
        cost_usd: None,
        token_count: 100,
        tool_calls: Vec::new(),
        input_summary: None,
        output_summary: None,
        runtime_env: None,
        declared_permissions: Vec::new(),
        security_event: false,
        mask_pii: false,
    }
}

#[tokio::test]
async fn s1_fresh_agent_one_success() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let agent = register_async(&storage, Category::Coding, "key-1").await;
    let pipeline = pipeline_over(Arc::clone(&storage));

    let result = pipeline
        .submit(submission(&agent, TraceStatus::Success, 5000), "key-1")
        .await
        .unwrap();

    let stored = storage.get_agent(agent.agent_id).await.unwrap().unwrap();
    assert_eq!(stored.total_traces, 1);
    assert_eq!(stored.success_rate, 100.0);
    assert!(result.trust_score >= 55.0 && result.trust_score <= 65.0);
    assert!(garl_crypto::certificate::verify(&result.certificate).unwrap());
}

#[tokio::test]
async fn s2_streak_bonus_then_failure_resets_it() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let agent = register_async(&storage, Category::Coding, "key-2").await;
    let pipeline = pipeline_over(Arc::clone(&storage));

    for _ in 0..5 {
        pipeline
            .submit(submission(&agent, TraceStatus::Success, 5000), "key-2")
            .await
            .unwrap();
    }
    let mid = storage.get_agent(agent.agent_id).await.unwrap().unwrap();
    assert_eq!(mid.consecutive_successes, 5);
    assert_eq!(mid.success_rate, 100.0);

    pipeline
        .submit(submission(&agent, TraceStatus::Failure, 5000), "key-2")
        .await
        .unwrap();
    let after = storage.get_agent(agent.agent_id).await.unwrap().unwrap();
    assert_eq!(after.consecutive_successes, 0);
    assert!(after.dimensions.reliability < mid.dimensions.reliability);
}

#[tokio::test]
async fn s3_duration_spike_raises_a_warning_then_auto_archives() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let mut agent = register_async(&storage, Category::Coding, "key-3").await;
    agent.total_traces = 15;
    agent.avg_duration_ms = 1000.0;
    storage.update_agent(agent.clone()).await.unwrap();
    let pipeline = pipeline_over(Arc::clone(&storage));

    pipeline
        .submit(submission(&agent, TraceStatus::Success, 10_000), "key-3")
        .await
        .unwrap();
    let flagged = storage.get_agent(agent.agent_id).await.unwrap().unwrap();
    assert_eq!(flagged.anomaly_flags.len(), 1);
    assert!(!flagged.anomaly_flags[0].archived);

    let mut current = flagged.clone();
    for _ in 0..50 {
        let sub = submission(&current, TraceStatus::Success, 1000);
        pipeline.submit(sub, "key-3").await.unwrap();
        current = storage.get_agent(agent.agent_id).await.unwrap().unwrap();
    }
    assert!(current.anomaly_flags[0].archived);
}

#[tokio::test]
async fn s4_weak_endorser_contributes_no_bonus() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let endorser = seeded(&storage, 52.0, 3).await;
    let target = seeded(&storage, 50.0, 20).await;
    let pipeline = pipeline_over(Arc::clone(&storage));

    let outcome = pipeline
        .endorse(endorser.agent_id, target.agent_id, None)
        .await
        .unwrap();

    assert_eq!(outcome.endorsement.bonus_applied, 0.0);
    assert_eq!(outcome.target_agent.endorsement_count, 1);
}

#[tokio::test]
async fn s5_strong_gold_endorser_caps_at_the_bonus_ceiling() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let mut endorser = seeded(&storage, 90.0, 40).await;
    endorser.certification_tier = CertificationTier::Gold;
    storage.update_agent(endorser.clone()).await.unwrap();
    let target = seeded(&storage, 50.0, 20).await;
    let pipeline = pipeline_over(Arc::clone(&storage));
    let config = garl_types::config::ReputationConfig::default();

    let outcome = pipeline
        .endorse(endorser.agent_id, target.agent_id, None)
        .await
        .unwrap();

    assert!(outcome.endorsement.bonus_applied <= config.max_endorsement_bonus + 1e-9);
    assert!(outcome.endorsement.bonus_applied > 1.0);
    assert!(outcome.target_agent.endorsement_score > 0.0);
}

#[tokio::test]
async fn s6_dormant_agent_decays_toward_the_baseline_on_verdict() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let mut agent = seeded(&storage, 70.0, 20).await;
    agent.last_trace_at = Some(Utc::now() - Duration::days(100));
    storage.update_agent(agent.clone()).await.unwrap();

    let config = garl_types::config::ReputationConfig::default();
    let v = verdict(&*storage, agent.agent_id, &config).await.unwrap();

    assert!((v.trust_score - 68.1).abs() < 0.5);
    let persisted = storage.get_agent(agent.agent_id).await.unwrap().unwrap();
    assert!((persisted.trust_score - 68.1).abs() < 0.5);
}

#[tokio::test]
async fn s7_routing_excludes_critical_anomaly_and_sorts_by_score() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let mut a = seeded(&storage, 82.0, 20).await;
    a.certification_tier = CertificationTier::Gold;
    storage.update_agent(a.clone()).await.unwrap();

    let mut b = seeded(&storage, 65.0, 20).await;
    b.certification_tier = CertificationTier::Silver;
    storage.update_agent(b.clone()).await.unwrap();

    let mut c = seeded(&storage, 70.0, 20).await;
    c.certification_tier = CertificationTier::Gold;
    c.anomaly_flags.push(garl_types::app::AnomalyFlag {
        anomaly_type: garl_types::app::AnomalyType::CostSpike,
        severity: garl_types::app::AnomalySeverity::Critical,
        message: "coincident anomalies".into(),
        archived: false,
        detected_at: Utc::now(),
    });
    storage.update_agent(c.clone()).await.unwrap();

    let config = garl_types::config::ReputationConfig::default();
    let ranked = route(&*storage, Category::Coding, CertificationTier::Silver, 5, &config)
        .await
        .unwrap();

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].agent_id, a.agent_id);
    assert_eq!(ranked[1].agent_id, b.agent_id);
}

#[tokio::test]
async fn s8_duplicate_submission_is_idempotent_with_no_second_history_row() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let agent = register_async(&storage, Category::Coding, "key-8").await;
    let pipeline = pipeline_over(Arc::clone(&storage));

    let sub = submission(&agent, TraceStatus::Success, 4000);
    let first = pipeline.submit(sub.clone(), "key-8").await.unwrap();
    let second = pipeline.submit(sub, "key-8").await.unwrap();

    assert_eq!(first.trace_id, second.trace_id);
    assert_eq!(second.trust_delta, 0.0);

    let history = storage
        .list_reputation_history(agent.agent_id, 100)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

async fn register_async(storage: &Arc<dyn Storage>, category: Category, api_key: &str) -> Agent {
    let agent = Agent::new(
        Uuid::new_v4(),
        "agent".into(),
        None,
        None,
        category,
        hash_api_key(api_key),
        false,
    );
    storage.insert_agent(agent.clone()).await.unwrap();
    agent
}

async fn seeded(storage: &Arc<dyn Storage>, score: f64, total_traces: u64) -> Agent {
    let mut agent = Agent::new(
        Uuid::new_v4(),
        "agent".into(),
        None,
        None,
        Category::Coding,
        "hash".into(),
        false,
    );
    agent.dimensions.reliability = score;
    agent.dimensions.security = score;
    agent.dimensions.speed = score;
    agent.dimensions.cost_efficiency = score;
    agent.dimensions.consistency = score;
    agent.trust_score = score;
    agent.certification_tier = CertificationTier::from_score(score);
    agent.total_traces = total_traces;
    agent.success_count = total_traces;
    agent.success_rate = 100.0;
    storage.insert_agent(agent.clone()).await.unwrap();
    agent
}
