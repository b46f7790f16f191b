//! The storage abstraction the core depends on.

use async_trait::async_trait;
use garl_types::app::{
    Agent, AgentId, Category, Endorsement, EndorsementId, ReputationHistory, Trace, TraceId,
    Webhook, WebhookEventType, WebhookId,
};
use garl_types::error::StorageError;

/// Persists the oracle's four entity kinds. Implementors must enforce that
/// `(agent_id, trace_hash)` is unique for traces and `(endorser_id,
/// target_id)` is unique for endorsements; the engine relies on the
/// corresponding `find_*` / `insert_*` pair rather than re-checking itself.
#[async_trait]
pub trait Storage: Send + Sync {
    // --- agents ---

    /// Inserts a newly registered agent. Errors with `Duplicate` if `agent_id` already exists.
    async fn insert_agent(&self, agent: Agent) -> Result<(), StorageError>;
    /// Fetches an agent by id.
    async fn get_agent(&self, agent_id: AgentId) -> Result<Option<Agent>, StorageError>;
    /// Replaces the full stored state of an agent. Callers are responsible for
    /// per-agent serialisation (see §5 of `SPEC_FULL.md`); this call itself is
    /// not a compare-and-swap.
    async fn update_agent(&self, agent: Agent) -> Result<(), StorageError>;
    /// Finds the agent whose `api_key_hash` matches, used to authenticate trace submission.
    async fn find_agent_by_api_key_hash(
        &self,
        api_key_hash: &str,
    ) -> Result<Option<Agent>, StorageError>;
    /// Lists every non-deleted agent in `category`, for the routing engine and leaderboard.
    async fn list_agents_by_category(&self, category: Category) -> Result<Vec<Agent>, StorageError>;
    /// Lists every agent, for aggregate statistics and compliance reporting.
    async fn list_all_agents(&self) -> Result<Vec<Agent>, StorageError>;

    // --- traces (append-only) ---

    /// Inserts a newly persisted trace. Errors with `Duplicate` if `(agent_id, trace_hash)` exists.
    async fn insert_trace(&self, trace: Trace) -> Result<(), StorageError>;
    /// Fetches a trace by id.
    async fn get_trace(&self, trace_id: TraceId) -> Result<Option<Trace>, StorageError>;
    /// Looks up a trace by its idempotency key, `(agent_id, trace_hash)`.
    async fn find_trace_by_hash(
        &self,
        agent_id: AgentId,
        trace_hash: &str,
    ) -> Result<Option<Trace>, StorageError>;
    /// Lists the most recent traces for an agent, newest first, capped at `limit`.
    async fn list_traces_for_agent(
        &self,
        agent_id: AgentId,
        limit: usize,
    ) -> Result<Vec<Trace>, StorageError>;

    // --- reputation history (append-only) ---

    /// Appends one reputation event row. Never fails on duplicate content; rows are ordered by insertion.
    async fn append_reputation_history(&self, row: ReputationHistory) -> Result<(), StorageError>;
    /// Lists the most recent history rows for an agent, newest first, capped at `limit`.
    async fn list_reputation_history(
        &self,
        agent_id: AgentId,
        limit: usize,
    ) -> Result<Vec<ReputationHistory>, StorageError>;

    // --- endorsements (append-only) ---

    /// Inserts a new endorsement edge. Errors with `Duplicate` if `(endorser_id, target_id)` exists.
    async fn insert_endorsement(&self, endorsement: Endorsement) -> Result<(), StorageError>;
    /// Fetches an endorsement by id.
    async fn get_endorsement(
        &self,
        endorsement_id: EndorsementId,
    ) -> Result<Option<Endorsement>, StorageError>;
    /// Looks up an endorsement by its uniqueness key, `(endorser_id, target_id)`.
    async fn find_endorsement(
        &self,
        endorser_id: AgentId,
        target_id: AgentId,
    ) -> Result<Option<Endorsement>, StorageError>;
    /// Lists endorsements received by `target_id`.
    async fn list_endorsements_received(
        &self,
        target_id: AgentId,
    ) -> Result<Vec<Endorsement>, StorageError>;
    /// Lists endorsements given by `endorser_id`.
    async fn list_endorsements_given(
        &self,
        endorser_id: AgentId,
    ) -> Result<Vec<Endorsement>, StorageError>;

    // --- webhooks ---

    /// Creates a new webhook subscription.
    async fn insert_webhook(&self, webhook: Webhook) -> Result<(), StorageError>;
    /// Fetches a webhook subscription by id.
    async fn get_webhook(&self, webhook_id: WebhookId) -> Result<Option<Webhook>, StorageError>;
    /// Replaces a webhook subscription (pause/resume, or `last_triggered_at` bump).
    async fn update_webhook(&self, webhook: Webhook) -> Result<(), StorageError>;
    /// Deletes a webhook subscription.
    async fn delete_webhook(&self, webhook_id: WebhookId) -> Result<(), StorageError>;
    /// Lists the active subscriptions owned by `agent_id` that subscribe to `event`,
    /// used by the dispatcher to fan out a newly fired event.
    async fn list_webhooks_for_event(
        &self,
        agent_id: AgentId,
        event: WebhookEventType,
    ) -> Result<Vec<Webhook>, StorageError>;
}
