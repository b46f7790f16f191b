// Path: crates/garl-engine/src/compliance.rs
//! The compliance projector: a pure read-side summary for an agent's owner.

use garl_storage::Storage;
use garl_types::app::{AgentId, AnomalyFlag, CertificationTier, Dimensions, Endorsement};
use garl_types::error::GarlError;

/// Service-level metrics derived from an agent's trace history.
#[derive(Debug, Clone)]
pub struct SlaMetrics {
    /// `success_rate`, read as an uptime percentage.
    pub uptime_pct: f64,
    /// Running average execution duration, in milliseconds.
    pub avg_latency_ms: f64,
    /// Total traces recorded.
    pub total_executions: u64,
    /// `true` once the agent is verified and carries no critical anomaly.
    pub tier_qualified: bool,
}

/// A compliance snapshot for a single agent: SLA metrics, anomaly history,
/// endorsement graph edges, declared permissions, and the current
/// dimensional breakdown. No persistence; recomputed from current state on
/// every call.
#[derive(Debug, Clone)]
pub struct ComplianceReport {
    /// The agent this report describes.
    pub agent_id: AgentId,
    /// See [`SlaMetrics`].
    pub sla: SlaMetrics,
    /// Currently active (non-archived) anomaly flags.
    pub active_anomalies: Vec<AnomalyFlag>,
    /// Archived (auto-cleared) anomaly flags.
    pub archived_anomalies: Vec<AnomalyFlag>,
    /// Endorsements this agent has received.
    pub endorsements_received: Vec<Endorsement>,
    /// Endorsements this agent has given to others.
    pub endorsements_given: Vec<Endorsement>,
    /// Sum of `bonus_applied` across `endorsements_received`.
    pub cumulative_endorsement_bonus: f64,
    /// The union of `declared_permissions` across the agent's recent traces.
    pub declared_permissions: Vec<String>,
    /// The agent's current five dimensional scores.
    pub dimensions: Dimensions,
    /// The agent's current certification tier.
    pub certification_tier: CertificationTier,
}

/// Recent-trace window scanned to assemble `declared_permissions`. Compliance
/// reporting favors a recent, bounded view over a full history scan.
const PERMISSIONS_TRACE_WINDOW: usize = 100;

/// Assembles a [`ComplianceReport`] for `agent_id`. Pure read: never mutates
/// or decays the agent (a compliance check should reflect exactly what is on
/// record, not a freshly-computed decay tick).
pub async fn compliance_report(
    storage: &dyn Storage,
    agent_id: AgentId,
) -> Result<ComplianceReport, GarlError> {
    let agent = storage
        .get_agent(agent_id)
        .await?
        .ok_or_else(|| GarlError::NotFound(format!("agent {agent_id}")))?;

    let traces = storage
        .list_traces_for_agent(agent_id, PERMISSIONS_TRACE_WINDOW)
        .await?;
    let mut declared_permissions: Vec<String> = Vec::new();
    for trace in &traces {
        for permission in &trace.declared_permissions {
            if !declared_permissions.contains(permission) {
                declared_permissions.push(permission.clone());
            }
        }
    }

    let endorsements_received = storage.list_endorsements_received(agent_id).await?;
    let endorsements_given = storage.list_endorsements_given(agent_id).await?;
    let cumulative_endorsement_bonus = endorsements_received
        .iter()
        .map(|e| e.bonus_applied)
        .sum();

    let active_anomalies: Vec<AnomalyFlag> = agent.active_anomalies().cloned().collect();
    let archived_anomalies: Vec<AnomalyFlag> = agent
        .anomaly_flags
        .iter()
        .filter(|f| f.archived)
        .cloned()
        .collect();

    Ok(ComplianceReport {
        agent_id,
        sla: SlaMetrics {
            uptime_pct: agent.success_rate,
            avg_latency_ms: agent.avg_duration_ms,
            total_executions: agent.total_traces,
            tier_qualified: agent.is_verified() && !agent.has_critical_anomaly(),
        },
        active_anomalies,
        archived_anomalies,
        endorsements_received,
        endorsements_given,
        cumulative_endorsement_bonus,
        declared_permissions,
        dimensions: agent.dimensions,
        certification_tier: agent.certification_tier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use garl_storage::InMemoryStorage;
    use garl_types::app::{Agent, Category};
    use uuid::Uuid;

    #[tokio::test]
    async fn reports_sla_and_tier_qualification_for_a_verified_agent() {
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
        agent.total_traces = 12;
        agent.success_count = 11;
        agent.success_rate = 91.6;
        agent.avg_duration_ms = 2500.0;
        let agent_id = agent.agent_id;
        storage.insert_agent(agent).await.unwrap();

        let report = compliance_report(&storage, agent_id).await.unwrap();
        assert!(report.sla.tier_qualified);
        assert_eq!(report.sla.total_executions, 12);
        assert!(report.active_anomalies.is_empty());
    }

    #[tokio::test]
    async fn unknown_agent_is_not_found() {
        let storage = InMemoryStorage::new();
        let result = compliance_report(&storage, Uuid::new_v4()).await;
        assert!(matches!(result, Err(GarlError::NotFound(_))));
    }
}
