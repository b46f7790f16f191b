// Path: crates/garl-engine/src/pipeline.rs
//! The trace pipeline: authenticate, validate, hash, dedupe, mask, commit,
//! sign, fan out. `spec.md` §4.3.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use garl_crypto::{certificate, SigningKey};
use garl_storage::Storage;
use garl_types::app::{
    AgentId, Dimensions, EventType, ReputationHistory, Trace, TraceId, Webhook, WebhookEvent,
    WebhookEventType,
};
use garl_types::config::EngineConfig;
use garl_types::error::GarlError;
use garl_types::{app::CanonicalTracePayload, MAX_BATCH_SIZE};
use garl_ratelimit::RateLimiter;
use garl_webhook::DispatchHandle;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::endorsement::{self, EndorseOutcome};
use crate::reputation;
use crate::validation::{self, TraceSubmission};

/// Milestones, in total trace count, that fire a `milestone` webhook event.
const MILESTONES: &[u64] = &[10, 50, 100, 500, 1000, 5000];

/// The minimum absolute trust-score change that fires a `score_change` event.
const SCORE_CHANGE_THRESHOLD: f64 = 2.0;

/// The outcome of one `submit` call.
#[derive(Debug, Clone)]
pub struct SubmitResult {
    /// The persisted (or, on idempotent replay, the original) trace id.
    pub trace_id: TraceId,
    /// The signed change in composite trust score this trace caused. `0.0`
    /// on an idempotent replay.
    pub trust_delta: f64,
    /// The certificate issued for this trace.
    pub certificate: garl_types::app::Certificate,
    /// The agent's five dimensional scores after this submission.
    pub new_scores: Dimensions,
    /// The agent's composite trust score (with endorsement bonus) after this submission.
    pub trust_score: f64,
}

/// One item's outcome within a batch submission.
#[derive(Debug)]
pub enum BatchItemOutcome {
    /// The item at `index` was submitted successfully.
    Submitted {
        /// Position of this item in the submitted batch.
        index: usize,
        /// The submission result.
        result: SubmitResult,
    },
    /// The item at `index` failed.
    Failed {
        /// Position of this item in the submitted batch.
        index: usize,
        /// The stable error code (`GarlError::code`).
        code: &'static str,
        /// A human-readable explanation.
        message: String,
    },
}

/// The result of a `submit_batch` call. Not atomic across items: a failure
/// partway through does not roll back items already committed.
#[derive(Debug)]
pub struct BatchResult {
    /// Count of items that committed successfully.
    pub submitted: usize,
    /// Count of items that failed.
    pub failed: usize,
    /// Per-item outcomes, in submission order.
    pub details: Vec<BatchItemOutcome>,
}

/// Orchestrates trace intake end to end. Cheap to clone (everything it holds
/// is already behind an `Arc`), so a single instance is shared across request
/// handlers.
#[derive(Clone)]
pub struct Pipeline {
    storage: Arc<dyn Storage>,
    signing_key: Arc<SigningKey>,
    config: Arc<EngineConfig>,
    webhook: DispatchHandle,
    /// Per-agent mutexes guarding the transactional scope (trace insert +
    /// reputation update + history append + agent update), mirroring the
    /// teacher's per-key concurrent-map locking pattern.
    locks: Arc<DashMap<AgentId, Arc<AsyncMutex<()>>>>,
    /// Sliding-window limiter over the write path, keyed by API key.
    rate_limiter: RateLimiter,
}

impl Pipeline {
    /// Builds a new pipeline over `storage`, signing with `signing_key`.
    pub fn new(
        storage: Arc<dyn Storage>,
        signing_key: Arc<SigningKey>,
        config: Arc<EngineConfig>,
        webhook: DispatchHandle,
    ) -> Self {
        let rate_limiter = RateLimiter::per_minute(config.rate_limit.writes_per_minute, "writes");
        Self {
            storage,
            signing_key,
            config,
            webhook,
            locks: Arc::new(DashMap::new()),
            rate_limiter,
        }
    }

    /// Submits a single trace on behalf of the agent identified by `api_key`.
    ///
    /// Resolves `api_key` to an agent first (`spec.md` §4.3 step 1-2):
    /// unknown key is `Unauthorized`, and `submission.agent_id` naming a
    /// different agent than the key resolves to is `Forbidden`.
    pub async fn submit(
        &self,
        submission: TraceSubmission,
        api_key: &str,
    ) -> Result<SubmitResult, GarlError> {
        let start = Instant::now();
        let result = self.submit_inner(submission, api_key).await;
        garl_telemetry::pipeline_metrics().observe_submit_latency(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            garl_telemetry::pipeline_metrics().inc_submission_rejected(error_code(err));
        }
        result
    }

    /// Submits up to [`garl_types::MAX_BATCH_SIZE`] traces. Every item runs
    /// through [`Self::submit`] independently; a failure does not affect the
    /// other items.
    pub async fn submit_batch(
        &self,
        submissions: Vec<TraceSubmission>,
        api_key: &str,
    ) -> Result<BatchResult, GarlError> {
        if submissions.len() > MAX_BATCH_SIZE {
            return Err(GarlError::Validation(
                garl_types::error::ValidationError::OutOfBounds {
                    field: "batch",
                    reason: format!("exceeds {MAX_BATCH_SIZE} items"),
                },
            ));
        }
        garl_telemetry::pipeline_metrics().observe_batch_size(submissions.len());

        let mut details = Vec::with_capacity(submissions.len());
        let mut submitted = 0usize;
        let mut failed = 0usize;
        for (index, submission) in submissions.into_iter().enumerate() {
            match self.submit(submission, api_key).await {
                Ok(result) => {
                    submitted += 1;
                    details.push(BatchItemOutcome::Submitted { index, result });
                }
                Err(err) => {
                    failed += 1;
                    details.push(BatchItemOutcome::Failed {
                        index,
                        code: error_code(&err),
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(BatchResult {
            submitted,
            failed,
            details,
        })
    }

    /// Creates an `endorser_id -> target_id` endorsement edge, sharing this
    /// pipeline's per-agent lock registry so the update to the target's
    /// scores is linearised against any concurrent trace submission or decay
    /// application touching the same agent (spec §5).
    pub async fn endorse(
        &self,
        endorser_id: AgentId,
        target_id: AgentId,
        context: Option<String>,
    ) -> Result<EndorseOutcome, GarlError> {
        endorsement::endorse(
            &*self.storage,
            endorser_id,
            target_id,
            context,
            &self.config.reputation,
            &self.locks,
        )
        .await
    }

    async fn submit_inner(
        &self,
        submission: TraceSubmission,
        api_key: &str,
    ) -> Result<SubmitResult, GarlError> {
        self.rate_limiter.check(api_key)?;

        let authenticated = self
            .storage
            .find_agent_by_api_key_hash(&hash_api_key(api_key))
            .await?
            .ok_or_else(|| GarlError::Unauthorized("unknown API key".to_string()))?;
        if authenticated.is_deleted {
            return Err(GarlError::Forbidden("agent has been deleted".to_string()));
        }
        if authenticated.agent_id != submission.agent_id {
            return Err(GarlError::Forbidden(
                "API key does not belong to the submitting agent".to_string(),
            ));
        }

        validation::validate(&submission)?;

        let canonical_summary = |summary: &Option<String>| summary.as_deref();
        let canonical = CanonicalTracePayload {
            agent_id: submission.agent_id,
            task_description: &submission.task_description,
            status: submission.status,
            duration_ms: submission.duration_ms,
            category: submission.category,
            cost_usd: submission.cost_usd,
            token_count: submission.token_count,
            tool_calls: &submission.tool_calls,
            input_summary: canonical_summary(&submission.input_summary),
            output_summary: canonical_summary(&submission.output_summary),
            runtime_env: submission.runtime_env.as_deref(),
        };
        let trace_hash = certificate::hash_canonical(&canonical)?;

        if let Some(existing) = self
            .storage
            .find_trace_by_hash(submission.agent_id, &trace_hash)
            .await?
        {
            garl_telemetry::pipeline_metrics().inc_duplicate_submission();
            let agent = self
                .storage
                .get_agent(submission.agent_id)
                .await?
                .ok_or_else(|| GarlError::NotFound(format!("agent {}", submission.agent_id)))?;
            return Ok(SubmitResult {
                trace_id: existing.trace_id,
                trust_delta: 0.0,
                certificate: existing.certificate,
                new_scores: agent.dimensions,
                trust_score: agent.clamped_trust_score(),
            });
        }

        let input_summary = mask_if_requested(submission.input_summary.clone(), submission.mask_pii);
        let output_summary = mask_if_requested(submission.output_summary.clone(), submission.mask_pii);

        let lock = self
            .locks
            .entry(submission.agent_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let current_agent = self
            .storage
            .get_agent(submission.agent_id)
            .await?
            .ok_or_else(|| GarlError::NotFound(format!("agent {}", submission.agent_id)))?;
        let base_agent = match reputation::apply_decay(&current_agent, Utc::now(), &self.config.reputation)
        {
            Some(decayed) => decayed.agent,
            None => current_agent,
        };

        let trace_id = Uuid::new_v4();
        let now = Utc::now();
        let draft_certificate = certificate::sign(
            &self.signing_key,
            trace_id,
            submission.agent_id,
            submission.status,
            base_agent.clamped_trust_score(),
            &trace_hash,
        )?;

        let mut trace = Trace {
            trace_id,
            agent_id: submission.agent_id,
            task_description: submission.task_description.clone(),
            status: submission.status,
            duration_ms: submission.duration_ms,
            category: submission.category,
            cost_usd: submission.cost_usd,
            token_count: submission.token_count,
            tool_calls: submission.tool_calls.clone(),
            input_summary,
            output_summary,
            runtime_env: submission.runtime_env.clone(),
            declared_permissions: submission.declared_permissions.clone(),
            security_event: submission.security_event,
            trace_hash: trace_hash.clone(),
            certificate: draft_certificate,
            trust_delta: 0.0,
            created_at: now,
        };

        let update = reputation::apply_trace(
            &base_agent,
            &trace,
            &self.config.reputation,
            &self.config.anomaly,
        );

        let final_certificate = certificate::sign(
            &self.signing_key,
            trace_id,
            submission.agent_id,
            submission.status,
            update.agent.clamped_trust_score(),
            &trace_hash,
        )?;
        trace.certificate = final_certificate.clone();
        trace.trust_delta = update.trust_delta;

        self.storage.insert_trace(trace.clone()).await?;
        self.storage
            .append_reputation_history(ReputationHistory {
                agent_id: submission.agent_id,
                trust_score: update.agent.clamped_trust_score(),
                dimensions: update.agent.dimensions,
                event_type: EventType::Trace,
                trust_delta: update.trust_delta,
                created_at: now,
            })
            .await?;
        self.storage.update_agent(update.agent.clone()).await?;

        drop(_guard);

        self.enqueue_events(&trace, &update);

        Ok(SubmitResult {
            trace_id,
            trust_delta: update.trust_delta,
            certificate: final_certificate,
            new_scores: update.agent.dimensions,
            trust_score: update.agent.clamped_trust_score(),
        })
    }

    fn enqueue_events(&self, trace: &Trace, update: &reputation::ReputationUpdate) {
        let agent_id = trace.agent_id;
        let timestamp = trace.created_at;

        self.webhook.enqueue(WebhookEvent {
            event: WebhookEventType::TraceRecorded,
            agent_id,
            timestamp,
            data: serde_json::json!({
                "trace_id": trace.trace_id,
                "status": trace.status,
                "duration_ms": trace.duration_ms,
            }),
        });

        if update.trust_delta.abs() >= SCORE_CHANGE_THRESHOLD {
            self.webhook.enqueue(WebhookEvent {
                event: WebhookEventType::ScoreChange,
                agent_id,
                timestamp,
                data: serde_json::json!({
                    "trust_delta": update.trust_delta,
                    "trust_score": update.agent.clamped_trust_score(),
                }),
            });
        }

        if MILESTONES.contains(&update.agent.total_traces) {
            self.webhook.enqueue(WebhookEvent {
                event: WebhookEventType::Milestone,
                agent_id,
                timestamp,
                data: serde_json::json!({ "total_traces": update.agent.total_traces }),
            });
        }

        if update.tier_changed {
            self.webhook.enqueue(WebhookEvent {
                event: WebhookEventType::TierChange,
                agent_id,
                timestamp,
                data: serde_json::json!({ "certification_tier": update.agent.certification_tier }),
            });
        }

        for flag in &update.new_anomalies {
            self.webhook.enqueue(WebhookEvent {
                event: WebhookEventType::Anomaly,
                agent_id,
                timestamp,
                data: serde_json::json!({
                    "anomaly_type": flag.anomaly_type,
                    "severity": flag.severity,
                    "message": flag.message,
                }),
            });
        }
    }
}

/// Replaces a summary with its SHA-256 hex if `mask` is set, leaving `None` untouched.
fn mask_if_requested(summary: Option<String>, mask: bool) -> Option<String> {
    if !mask {
        return summary;
    }
    summary.map(|s| hex::encode(Sha256::digest(s.as_bytes())))
}

/// SHA-256 hex of a raw API key, compared against `Agent::api_key_hash` at
/// registration and authentication time.
pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

fn error_code(err: &GarlError) -> &'static str {
    use garl_types::error::ErrorCode;
    err.code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use garl_storage::InMemoryStorage;
    use garl_types::app::{Agent, Category, TraceStatus};
    use garl_types::config::WebhookConfig;

    fn submission_for(agent: &Agent) -> TraceSubmission {
        TraceSubmission {
            agent_id: agent.agent_id,
            task_description: "reviewed a diff".into(),
            status: TraceStatus::Success,
            duration_ms: 4000,
            category: agent.category,
            cost_usd: Some(0.02),
            token_count: 800,
            tool_calls: Vec::new(),
            input_summary: Some("fix the null check".into()),
            output_summary: Some("added the null check".into()),
            runtime_env: None,
            declared_permissions: vec!["fs:read".into()],
            security_event: false,
            mask_pii: false,
        }
    }

    async fn pipeline_with_agent() -> (Pipeline, Agent, Arc<dyn Storage>) {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let key = Arc::new(SigningKey::generate());
        let config = Arc::new(EngineConfig::default());
        let (handle, _join) = garl_webhook::Dispatcher::spawn(Arc::clone(&storage), WebhookConfig::default());
        let agent = Agent::new(
            Uuid::new_v4(),
            "agent".into(),
            None,
            None,
            Category::Coding,
            hash_api_key("s3cr3t"),
            false,
        );
        storage.insert_agent(agent.clone()).await.unwrap();
        let storage_handle = Arc::clone(&storage);
        (
            Pipeline::new(storage, key, config, handle),
            agent,
            storage_handle,
        )
    }

    #[tokio::test]
    async fn submit_persists_a_signed_trace_and_updates_the_agent() {
        let (pipeline, agent, storage) = pipeline_with_agent().await;
        let score_before = agent.trust_score;
        let result = pipeline
            .submit(submission_for(&agent), "s3cr3t")
            .await
            .unwrap();

        assert!(result.trust_score > 0.0);
        assert_eq!(result.certificate.payload.status, TraceStatus::Success);

        // I4: trust_delta on the trace equals trust_score_after - trust_score_before,
        // and matches the corresponding reputation_history row exactly.
        assert!((result.trust_delta - (result.trust_score - score_before)).abs() < 1e-9);
        let history = storage
            .list_reputation_history(agent.agent_id, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].trust_delta, result.trust_delta);

        // R3: submit -> get_trace returns the canonical payload plus signature.
        let stored_trace = storage.get_trace(result.trace_id).await.unwrap().unwrap();
        assert_eq!(stored_trace.certificate.payload.trace_id, result.trace_id);
        assert!(certificate::verify(&stored_trace.certificate).unwrap());
    }

    #[tokio::test]
    async fn resubmitting_the_same_trace_is_idempotent() {
        let (pipeline, agent, _storage) = pipeline_with_agent().await;
        let first = pipeline
            .submit(submission_for(&agent), "s3cr3t")
            .await
            .unwrap();
        let second = pipeline
            .submit(submission_for(&agent), "s3cr3t")
            .await
            .unwrap();

        assert_eq!(first.trace_id, second.trace_id);
        assert_eq!(second.trust_delta, 0.0);
        // I2: the replay yields the original certificate, not a freshly signed one.
        assert_eq!(
            first.certificate.proof.signature,
            second.certificate.proof.signature
        );
    }

    #[tokio::test]
    async fn batch_over_the_size_cap_is_rejected() {
        let (pipeline, agent, _storage) = pipeline_with_agent().await;
        let submissions: Vec<TraceSubmission> = (0..MAX_BATCH_SIZE + 1)
            .map(|_| submission_for(&agent))
            .collect();
        let result = pipeline.submit_batch(submissions, "s3cr3t").await;
        assert!(result.is_err());
    }
}
