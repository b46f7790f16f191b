//! An in-process, `dashmap`-backed [`Storage`] implementation.
//!
//! Used by `garl-test-utils` fixtures and as the zero-configuration default
//! for `node` when no durable backend is configured. Data does not survive a
//! process restart.

use async_trait::async_trait;
use dashmap::DashMap;
use garl_types::app::{
    Agent, AgentId, Category, Endorsement, EndorsementId, ReputationHistory, Trace, TraceId,
    Webhook, WebhookEventType, WebhookId,
};
use garl_types::error::StorageError;

use crate::traits::Storage;

/// An in-memory [`Storage`] implementation backed by concurrent hash maps.
#[derive(Default)]
pub struct InMemoryStorage {
    agents: DashMap<AgentId, Agent>,
    api_key_index: DashMap<String, AgentId>,
    traces: DashMap<TraceId, Trace>,
    trace_hash_index: DashMap<(AgentId, String), TraceId>,
    history: DashMap<AgentId, Vec<ReputationHistory>>,
    endorsements: DashMap<EndorsementId, Endorsement>,
    endorsement_index: DashMap<(AgentId, AgentId), EndorsementId>,
    endorsements_received: DashMap<AgentId, Vec<EndorsementId>>,
    endorsements_given: DashMap<AgentId, Vec<EndorsementId>>,
    webhooks: DashMap<WebhookId, Webhook>,
}

impl InMemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn insert_agent(&self, agent: Agent) -> Result<(), StorageError> {
        if self.agents.contains_key(&agent.agent_id) {
            return Err(StorageError::Duplicate(format!(
                "agent {} already exists",
                agent.agent_id
            )));
        }
        self.api_key_index
            .insert(agent.api_key_hash.clone(), agent.agent_id);
        self.agents.insert(agent.agent_id, agent);
        Ok(())
    }

    async fn get_agent(&self, agent_id: AgentId) -> Result<Option<Agent>, StorageError> {
        Ok(self.agents.get(&agent_id).map(|a| a.clone()))
    }

    async fn update_agent(&self, agent: Agent) -> Result<(), StorageError> {
        self.agents.insert(agent.agent_id, agent);
        Ok(())
    }

    async fn find_agent_by_api_key_hash(
        &self,
        api_key_hash: &str,
    ) -> Result<Option<Agent>, StorageError> {
        let Some(agent_id) = self.api_key_index.get(api_key_hash).map(|id| *id) else {
            return Ok(None);
        };
        self.get_agent(agent_id).await
    }

    async fn list_agents_by_category(&self, category: Category) -> Result<Vec<Agent>, StorageError> {
        Ok(self
            .agents
            .iter()
            .filter(|entry| entry.category == category)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn list_all_agents(&self) -> Result<Vec<Agent>, StorageError> {
        Ok(self.agents.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn insert_trace(&self, trace: Trace) -> Result<(), StorageError> {
        let key = (trace.agent_id, trace.trace_hash.clone());
        if self.trace_hash_index.contains_key(&key) {
            return Err(StorageError::Duplicate(format!(
                "trace ({}, {}) already exists",
                trace.agent_id, trace.trace_hash
            )));
        }
        self.trace_hash_index.insert(key, trace.trace_id);
        self.traces.insert(trace.trace_id, trace);
        Ok(())
    }

    async fn get_trace(&self, trace_id: TraceId) -> Result<Option<Trace>, StorageError> {
        Ok(self.traces.get(&trace_id).map(|t| t.clone()))
    }

    async fn find_trace_by_hash(
        &self,
        agent_id: AgentId,
        trace_hash: &str,
    ) -> Result<Option<Trace>, StorageError> {
        let Some(trace_id) = self
            .trace_hash_index
            .get(&(agent_id, trace_hash.to_string()))
            .map(|id| *id)
        else {
            return Ok(None);
        };
        self.get_trace(trace_id).await
    }

    async fn list_traces_for_agent(
        &self,
        agent_id: AgentId,
        limit: usize,
    ) -> Result<Vec<Trace>, StorageError> {
        let mut traces: Vec<Trace> = self
            .traces
            .iter()
            .filter(|entry| entry.agent_id == agent_id)
            .map(|entry| entry.value().clone())
            .collect();
        traces.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        traces.truncate(limit);
        Ok(traces)
    }

    async fn append_reputation_history(&self, row: ReputationHistory) -> Result<(), StorageError> {
        self.history.entry(row.agent_id).or_default().push(row);
        Ok(())
    }

    async fn list_reputation_history(
        &self,
        agent_id: AgentId,
        limit: usize,
    ) -> Result<Vec<ReputationHistory>, StorageError> {
        let mut rows = self
            .history
            .get(&agent_id)
            .map(|rows| rows.clone())
            .unwrap_or_default();
        rows.reverse();
        rows.truncate(limit);
        Ok(rows)
    }

    async fn insert_endorsement(&self, endorsement: Endorsement) -> Result<(), StorageError> {
        let key = (endorsement.endorser_id, endorsement.target_id);
        if self.endorsement_index.contains_key(&key) {
            return Err(StorageError::Duplicate(format!(
                "endorsement ({}, {}) already exists",
                endorsement.endorser_id, endorsement.target_id
            )));
        }
        self.endorsement_index.insert(key, endorsement.id);
        self.endorsements_given
            .entry(endorsement.endorser_id)
            .or_default()
            .push(endorsement.id);
        self.endorsements_received
            .entry(endorsement.target_id)
            .or_default()
            .push(endorsement.id);
        self.endorsements.insert(endorsement.id, endorsement);
        Ok(())
    }

    async fn get_endorsement(
        &self,
        endorsement_id: EndorsementId,
    ) -> Result<Option<Endorsement>, StorageError> {
        Ok(self.endorsements.get(&endorsement_id).map(|e| e.clone()))
    }

    async fn find_endorsement(
        &self,
        endorser_id: AgentId,
        target_id: AgentId,
    ) -> Result<Option<Endorsement>, StorageError> {
        let Some(id) = self
            .endorsement_index
            .get(&(endorser_id, target_id))
            .map(|id| *id)
        else {
            return Ok(None);
        };
        self.get_endorsement(id).await
    }

    async fn list_endorsements_received(
        &self,
        target_id: AgentId,
    ) -> Result<Vec<Endorsement>, StorageError> {
        let ids = self
            .endorsements_received
            .get(&target_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.endorsements.get(&id).map(|e| e.clone()))
            .collect())
    }

    async fn list_endorsements_given(
        &self,
        endorser_id: AgentId,
    ) -> Result<Vec<Endorsement>, StorageError> {
        let ids = self
            .endorsements_given
            .get(&endorser_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| self.endorsements.get(&id).map(|e| e.clone()))
            .collect())
    }

    async fn insert_webhook(&self, webhook: Webhook) -> Result<(), StorageError> {
        self.webhooks.insert(webhook.id, webhook);
        Ok(())
    }

    async fn get_webhook(&self, webhook_id: WebhookId) -> Result<Option<Webhook>, StorageError> {
        Ok(self.webhooks.get(&webhook_id).map(|w| w.clone()))
    }

    async fn update_webhook(&self, webhook: Webhook) -> Result<(), StorageError> {
        self.webhooks.insert(webhook.id, webhook);
        Ok(())
    }

    async fn delete_webhook(&self, webhook_id: WebhookId) -> Result<(), StorageError> {
        self.webhooks.remove(&webhook_id);
        Ok(())
    }

    async fn list_webhooks_for_event(
        &self,
        agent_id: AgentId,
        event: WebhookEventType,
    ) -> Result<Vec<Webhook>, StorageError> {
        Ok(self
            .webhooks
            .iter()
            .filter(|entry| entry.agent_id == agent_id && entry.subscribes_to(event))
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garl_types::app::Category;

    fn sample_agent() -> Agent {
        Agent::new(
            uuid::Uuid::new_v4(),
            "test-agent".into(),
            None,
            None,
            Category::Coding,
            "hash".into(),
            false,
        )
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = InMemoryStorage::new();
        let agent = sample_agent();
        let id = agent.agent_id;
        let name = agent.name.clone();
        store.insert_agent(agent).await.unwrap();
        let fetched = store.get_agent(id).await.unwrap().unwrap();

        // R2: register -> get_agent returns the same identity fields, starting
        // at the baseline trust score.
        assert_eq!(fetched.agent_id, id);
        assert_eq!(fetched.name, name);
        assert_eq!(fetched.sovereign_id, garl_types::app::sovereign_id(id));
        assert_eq!(fetched.trust_score, 50.0);
    }

    #[tokio::test]
    async fn duplicate_agent_insert_errors() {
        let store = InMemoryStorage::new();
        let agent = sample_agent();
        store.insert_agent(agent.clone()).await.unwrap();
        assert!(store.insert_agent(agent).await.is_err());
    }

    #[tokio::test]
    async fn find_by_api_key_hash() {
        let store = InMemoryStorage::new();
        let agent = sample_agent();
        let hash = agent.api_key_hash.clone();
        store.insert_agent(agent).await.unwrap();
        let found = store.find_agent_by_api_key_hash(&hash).await.unwrap();
        assert!(found.is_some());
    }
}
