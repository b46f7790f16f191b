//! An embedded, pure-Rust, ACID [`Storage`] implementation backed by `redb`.
//!
//! Grounded in the kernel's epoch-sharded `redb` node store: one `redb`
//! table per entity kind, keys are the entity's UUID (or a composite index
//! key), values are `serde_json`-encoded bytes. `redb` transactions are
//! synchronous, so every method offloads its transaction onto the blocking
//! thread pool via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use garl_types::app::{
    Agent, AgentId, Category, Endorsement, EndorsementId, ReputationHistory, Trace, TraceId,
    Webhook, WebhookEventType, WebhookId,
};
use garl_types::error::StorageError;
use redb::{Database, ReadableTable, TableDefinition};

use crate::traits::Storage;

const AGENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("agents");
const API_KEY_INDEX: TableDefinition<&str, &str> = TableDefinition::new("agents_by_api_key_hash");
const TRACES: TableDefinition<&str, &[u8]> = TableDefinition::new("traces");
const TRACE_HASH_INDEX: TableDefinition<&str, &str> = TableDefinition::new("traces_by_hash");
const HISTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("reputation_history");
const ENDORSEMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("endorsements");
const ENDORSEMENT_INDEX: TableDefinition<&str, &str> =
    TableDefinition::new("endorsements_by_pair");
const WEBHOOKS: TableDefinition<&str, &[u8]> = TableDefinition::new("webhooks");

fn trace_hash_key(agent_id: AgentId, trace_hash: &str) -> String {
    format!("{agent_id}:{trace_hash}")
}

fn endorsement_key(endorser_id: AgentId, target_id: AgentId) -> String {
    format!("{endorser_id}:{target_id}")
}

fn history_key(agent_id: AgentId, seq: u64) -> String {
    format!("{agent_id}:{seq:020}")
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|e| StorageError::Encode(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Decode(e.to_string()))
}

fn backend<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// A `redb`-backed [`Storage`] implementation, suitable for a single-process
/// production deployment that wants durability without a relational database.
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Opens (creating if absent) a `redb` database at `path`, creating every
    /// table the storage layer needs.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path).map_err(|e| StorageError::Backend(e.to_string()))?;
        {
            let txn = db.begin_write().map_err(|e| StorageError::Backend(e.to_string()))?;
            txn.open_table(AGENTS).map_err(|e| StorageError::Backend(e.to_string()))?;
            txn.open_table(API_KEY_INDEX)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            txn.open_table(TRACES).map_err(|e| StorageError::Backend(e.to_string()))?;
            txn.open_table(TRACE_HASH_INDEX)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            txn.open_table(HISTORY).map_err(|e| StorageError::Backend(e.to_string()))?;
            txn.open_table(ENDORSEMENTS)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            txn.open_table(ENDORSEMENT_INDEX)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            txn.open_table(WEBHOOKS).map_err(|e| StorageError::Backend(e.to_string()))?;
            txn.commit().map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        Ok(Self { db: Arc::new(db) })
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(Arc<Database>) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db))
            .await
            .map_err(|e| StorageError::Backend(format!("blocking task panicked: {e}")))?
    }
}

#[async_trait]
impl Storage for RedbStorage {
    async fn insert_agent(&self, agent: Agent) -> Result<(), StorageError> {
        self.run_blocking(move |db| {
            let agent_id = agent.agent_id.to_string();
            let txn = db.begin_write().map_err(backend)?;
            {
                let mut table = txn.open_table(AGENTS).map_err(backend)?;
                if table.get(agent_id.as_str()).map_err(backend)?.is_some() {
                    return Err(StorageError::Duplicate(format!(
                        "agent {} already exists",
                        agent.agent_id
                    )));
                }
                let bytes = encode(&agent)?;
                table.insert(agent_id.as_str(), bytes.as_slice()).map_err(backend)?;
                let mut index = txn.open_table(API_KEY_INDEX).map_err(backend)?;
                index
                    .insert(agent.api_key_hash.as_str(), agent_id.as_str())
                    .map_err(backend)?;
            }
            txn.commit().map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn get_agent(&self, agent_id: AgentId) -> Result<Option<Agent>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(AGENTS).map_err(backend)?;
            match table.get(agent_id.to_string().as_str()).map_err(backend)? {
                Some(bytes) => Ok(Some(decode(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn update_agent(&self, agent: Agent) -> Result<(), StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(backend)?;
            {
                let mut table = txn.open_table(AGENTS).map_err(backend)?;
                let bytes = encode(&agent)?;
                table
                    .insert(agent.agent_id.to_string().as_str(), bytes.as_slice())
                    .map_err(backend)?;
            }
            txn.commit().map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn find_agent_by_api_key_hash(
        &self,
        api_key_hash: &str,
    ) -> Result<Option<Agent>, StorageError> {
        let api_key_hash = api_key_hash.to_string();
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let index = txn.open_table(API_KEY_INDEX).map_err(backend)?;
            let Some(agent_id) = index.get(api_key_hash.as_str()).map_err(backend)? else {
                return Ok(None);
            };
            let table = txn.open_table(AGENTS).map_err(backend)?;
            match table.get(agent_id.value()).map_err(backend)? {
                Some(bytes) => Ok(Some(decode(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_agents_by_category(&self, category: Category) -> Result<Vec<Agent>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(AGENTS).map_err(backend)?;
            let mut out = Vec::new();
            for row in table.iter().map_err(backend)? {
                let (_, value) = row.map_err(backend)?;
                let agent: Agent = decode(value.value())?;
                if agent.category == category {
                    out.push(agent);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn list_all_agents(&self) -> Result<Vec<Agent>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(AGENTS).map_err(backend)?;
            let mut out = Vec::new();
            for row in table.iter().map_err(backend)? {
                let (_, value) = row.map_err(backend)?;
                out.push(decode(value.value())?);
            }
            Ok(out)
        })
        .await
    }

    async fn insert_trace(&self, trace: Trace) -> Result<(), StorageError> {
        self.run_blocking(move |db| {
            let trace_id = trace.trace_id.to_string();
            let hash_key = trace_hash_key(trace.agent_id, &trace.trace_hash);
            let txn = db.begin_write().map_err(backend)?;
            {
                let mut hash_index = txn.open_table(TRACE_HASH_INDEX).map_err(backend)?;
                if hash_index.get(hash_key.as_str()).map_err(backend)?.is_some() {
                    return Err(StorageError::Duplicate(format!(
                        "trace ({}, {}) already exists",
                        trace.agent_id, trace.trace_hash
                    )));
                }
                hash_index
                    .insert(hash_key.as_str(), trace_id.as_str())
                    .map_err(backend)?;
                let mut table = txn.open_table(TRACES).map_err(backend)?;
                let bytes = encode(&trace)?;
                table.insert(trace_id.as_str(), bytes.as_slice()).map_err(backend)?;
            }
            txn.commit().map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn get_trace(&self, trace_id: TraceId) -> Result<Option<Trace>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(TRACES).map_err(backend)?;
            match table.get(trace_id.to_string().as_str()).map_err(backend)? {
                Some(bytes) => Ok(Some(decode(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_trace_by_hash(
        &self,
        agent_id: AgentId,
        trace_hash: &str,
    ) -> Result<Option<Trace>, StorageError> {
        let key = trace_hash_key(agent_id, trace_hash);
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let index = txn.open_table(TRACE_HASH_INDEX).map_err(backend)?;
            let Some(trace_id) = index.get(key.as_str()).map_err(backend)? else {
                return Ok(None);
            };
            let table = txn.open_table(TRACES).map_err(backend)?;
            match table.get(trace_id.value()).map_err(backend)? {
                Some(bytes) => Ok(Some(decode(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_traces_for_agent(
        &self,
        agent_id: AgentId,
        limit: usize,
    ) -> Result<Vec<Trace>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(TRACES).map_err(backend)?;
            let mut out = Vec::new();
            for row in table.iter().map_err(backend)? {
                let (_, value) = row.map_err(backend)?;
                let trace: Trace = decode(value.value())?;
                if trace.agent_id == agent_id {
                    out.push(trace);
                }
            }
            out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            out.truncate(limit);
            Ok(out)
        })
        .await
    }

    async fn append_reputation_history(&self, row: ReputationHistory) -> Result<(), StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(backend)?;
            {
                let mut table = txn.open_table(HISTORY).map_err(backend)?;
                let seq = table
                    .range(format!("{}:", row.agent_id).as_str()..=format!("{}:~", row.agent_id).as_str())
                    .map_err(backend)?
                    .count() as u64;
                let key = history_key(row.agent_id, seq);
                let bytes = encode(&row)?;
                table.insert(key.as_str(), bytes.as_slice()).map_err(backend)?;
            }
            txn.commit().map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn list_reputation_history(
        &self,
        agent_id: AgentId,
        limit: usize,
    ) -> Result<Vec<ReputationHistory>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(HISTORY).map_err(backend)?;
            let mut out = Vec::new();
            let lower = format!("{agent_id}:");
            let upper = format!("{agent_id}:~");
            for row in table.range(lower.as_str()..=upper.as_str()).map_err(backend)? {
                let (_, value) = row.map_err(backend)?;
                out.push(decode::<ReputationHistory>(value.value())?);
            }
            out.reverse();
            out.truncate(limit);
            Ok(out)
        })
        .await
    }

    async fn insert_endorsement(&self, endorsement: Endorsement) -> Result<(), StorageError> {
        self.run_blocking(move |db| {
            let key = endorsement_key(endorsement.endorser_id, endorsement.target_id);
            let id = endorsement.id.to_string();
            let txn = db.begin_write().map_err(backend)?;
            {
                let mut index = txn.open_table(ENDORSEMENT_INDEX).map_err(backend)?;
                if index.get(key.as_str()).map_err(backend)?.is_some() {
                    return Err(StorageError::Duplicate(format!(
                        "endorsement ({}, {}) already exists",
                        endorsement.endorser_id, endorsement.target_id
                    )));
                }
                index.insert(key.as_str(), id.as_str()).map_err(backend)?;
                let mut table = txn.open_table(ENDORSEMENTS).map_err(backend)?;
                let bytes = encode(&endorsement)?;
                table.insert(id.as_str(), bytes.as_slice()).map_err(backend)?;
            }
            txn.commit().map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn get_endorsement(
        &self,
        endorsement_id: EndorsementId,
    ) -> Result<Option<Endorsement>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(ENDORSEMENTS).map_err(backend)?;
            match table.get(endorsement_id.to_string().as_str()).map_err(backend)? {
                Some(bytes) => Ok(Some(decode(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_endorsement(
        &self,
        endorser_id: AgentId,
        target_id: AgentId,
    ) -> Result<Option<Endorsement>, StorageError> {
        let key = endorsement_key(endorser_id, target_id);
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let index = txn.open_table(ENDORSEMENT_INDEX).map_err(backend)?;
            let Some(id) = index.get(key.as_str()).map_err(backend)? else {
                return Ok(None);
            };
            let table = txn.open_table(ENDORSEMENTS).map_err(backend)?;
            match table.get(id.value()).map_err(backend)? {
                Some(bytes) => Ok(Some(decode(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn list_endorsements_received(
        &self,
        target_id: AgentId,
    ) -> Result<Vec<Endorsement>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(ENDORSEMENTS).map_err(backend)?;
            let mut out = Vec::new();
            for row in table.iter().map_err(backend)? {
                let (_, value) = row.map_err(backend)?;
                let e: Endorsement = decode(value.value())?;
                if e.target_id == target_id {
                    out.push(e);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn list_endorsements_given(
        &self,
        endorser_id: AgentId,
    ) -> Result<Vec<Endorsement>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(ENDORSEMENTS).map_err(backend)?;
            let mut out = Vec::new();
            for row in table.iter().map_err(backend)? {
                let (_, value) = row.map_err(backend)?;
                let e: Endorsement = decode(value.value())?;
                if e.endorser_id == endorser_id {
                    out.push(e);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn insert_webhook(&self, webhook: Webhook) -> Result<(), StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(backend)?;
            {
                let mut table = txn.open_table(WEBHOOKS).map_err(backend)?;
                let bytes = encode(&webhook)?;
                table
                    .insert(webhook.id.to_string().as_str(), bytes.as_slice())
                    .map_err(backend)?;
            }
            txn.commit().map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn get_webhook(&self, webhook_id: WebhookId) -> Result<Option<Webhook>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(WEBHOOKS).map_err(backend)?;
            match table.get(webhook_id.to_string().as_str()).map_err(backend)? {
                Some(bytes) => Ok(Some(decode(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn update_webhook(&self, webhook: Webhook) -> Result<(), StorageError> {
        self.insert_webhook(webhook).await
    }

    async fn delete_webhook(&self, webhook_id: WebhookId) -> Result<(), StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_write().map_err(backend)?;
            {
                let mut table = txn.open_table(WEBHOOKS).map_err(backend)?;
                table.remove(webhook_id.to_string().as_str()).map_err(backend)?;
            }
            txn.commit().map_err(backend)?;
            Ok(())
        })
        .await
    }

    async fn list_webhooks_for_event(
        &self,
        agent_id: AgentId,
        event: WebhookEventType,
    ) -> Result<Vec<Webhook>, StorageError> {
        self.run_blocking(move |db| {
            let txn = db.begin_read().map_err(backend)?;
            let table = txn.open_table(WEBHOOKS).map_err(backend)?;
            let mut out = Vec::new();
            for row in table.iter().map_err(backend)? {
                let (_, value) = row.map_err(backend)?;
                let wh: Webhook = decode(value.value())?;
                if wh.agent_id == agent_id && wh.subscribes_to(event) {
                    out.push(wh);
                }
            }
            Ok(out)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garl_types::app::Category;

    fn temp_db_path() -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("garl-redb-test-{}.redb", uuid::Uuid::new_v4()));
        path
    }

    #[tokio::test]
    async fn insert_then_get_agent_round_trips() {
        let path = temp_db_path();
        let store = RedbStorage::open(&path).unwrap();
        let agent = Agent::new(
            uuid::Uuid::new_v4(),
            "redb-agent".into(),
            None,
            None,
            Category::Data,
            "hash".into(),
            false,
        );
        let id = agent.agent_id;
        store.insert_agent(agent).await.unwrap();
        let fetched = store.get_agent(id).await.unwrap().unwrap();
        assert_eq!(fetched.agent_id, id);
        let _ = std::fs::remove_file(path);
    }
}
