// Path: crates/garl-engine/src/validation.rs
//! Schema and field-bounds validation for an incoming trace submission.
//!
//! Runs before the canonical hash is computed, so a submission that would
//! fail validation never reaches the duplicate-hash check.

use garl_types::app::{AgentId, Category, ToolCall, TraceStatus};
use garl_types::error::ValidationError;
use garl_types::{MAX_OPEN_SHAPE_BYTES, MAX_SUMMARY_BYTES, MAX_TASK_DESCRIPTION_BYTES};

/// The fields a caller submits for one execution record. Distinct from
/// [`garl_types::app::Trace`], which additionally carries the server-assigned
/// `trace_id`, `certificate`, `trust_delta`, and `created_at`.
#[derive(Debug, Clone)]
pub struct TraceSubmission {
    /// The agent this trace is submitted for; must match the authenticated key.
    pub agent_id: AgentId,
    /// See [`garl_types::app::Trace::task_description`].
    pub task_description: String,
    /// See [`garl_types::app::Trace::status`].
    pub status: TraceStatus,
    /// See [`garl_types::app::Trace::duration_ms`].
    pub duration_ms: u64,
    /// See [`garl_types::app::Trace::category`].
    pub category: Category,
    /// See [`garl_types::app::Trace::cost_usd`].
    pub cost_usd: Option<f64>,
    /// See [`garl_types::app::Trace::token_count`].
    pub token_count: u64,
    /// See [`garl_types::app::Trace::tool_calls`].
    pub tool_calls: Vec<ToolCall>,
    /// See [`garl_types::app::Trace::input_summary`], pre-masking.
    pub input_summary: Option<String>,
    /// See [`garl_types::app::Trace::output_summary`], pre-masking.
    pub output_summary: Option<String>,
    /// See [`garl_types::app::Trace::runtime_env`].
    pub runtime_env: Option<String>,
    /// See [`garl_types::app::Trace::declared_permissions`].
    pub declared_permissions: Vec<String>,
    /// See [`garl_types::app::Trace::security_event`].
    pub security_event: bool,
    /// Whether `input_summary`/`output_summary` should be replaced by their
    /// SHA-256 hex before persistence.
    pub mask_pii: bool,
}

/// Validates schema and field bounds. Does not check authentication or
/// cross-agent ownership — that is the pipeline's job, before this runs.
pub fn validate(submission: &TraceSubmission) -> Result<(), ValidationError> {
    if submission.task_description.is_empty() {
        return Err(ValidationError::MissingField("task_description"));
    }
    if submission.task_description.len() > MAX_TASK_DESCRIPTION_BYTES {
        return Err(ValidationError::OutOfBounds {
            field: "task_description",
            reason: format!("exceeds {MAX_TASK_DESCRIPTION_BYTES} bytes"),
        });
    }
    if let Some(summary) = &submission.input_summary {
        if summary.len() > MAX_SUMMARY_BYTES {
            return Err(ValidationError::OutOfBounds {
                field: "input_summary",
                reason: format!("exceeds {MAX_SUMMARY_BYTES} bytes"),
            });
        }
    }
    if let Some(summary) = &submission.output_summary {
        if summary.len() > MAX_SUMMARY_BYTES {
            return Err(ValidationError::OutOfBounds {
                field: "output_summary",
                reason: format!("exceeds {MAX_SUMMARY_BYTES} bytes"),
            });
        }
    }
    if let Some(cost) = submission.cost_usd {
        if cost < 0.0 {
            return Err(ValidationError::OutOfBounds {
                field: "cost_usd",
                reason: "must be >= 0".to_string(),
            });
        }
    }
    let tool_calls_size = serde_json::to_vec(&submission.tool_calls)
        .map(|bytes| bytes.len())
        .unwrap_or(usize::MAX);
    if tool_calls_size > MAX_OPEN_SHAPE_BYTES {
        return Err(ValidationError::PayloadTooLarge {
            field: "tool_calls",
            limit: MAX_OPEN_SHAPE_BYTES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn base_submission() -> TraceSubmission {
        TraceSubmission {
            agent_id: Uuid::new_v4(),
            task_description: "reviewed a pull request".to_string(),
            status: TraceStatus::Success,
            duration_ms: 1200,
            category: Category::Coding,
            cost_usd: Some(0.01),
            token_count: 400,
            tool_calls: Vec::new(),
            input_summary: None,
            output_summary: None,
            runtime_env: None,
            declared_permissions: Vec::new(),
            security_event: false,
            mask_pii: false,
        }
    }

    #[test]
    fn accepts_a_well_formed_submission() {
        assert!(validate(&base_submission()).is_ok());
    }

    #[test]
    fn rejects_empty_task_description() {
        let mut submission = base_submission();
        submission.task_description.clear();
        assert!(matches!(
            validate(&submission),
            Err(ValidationError::MissingField("task_description"))
        ));
    }

    #[test]
    fn rejects_oversized_task_description() {
        let mut submission = base_submission();
        submission.task_description = "x".repeat(MAX_TASK_DESCRIPTION_BYTES + 1);
        assert!(matches!(
            validate(&submission),
            Err(ValidationError::OutOfBounds { field: "task_description", .. })
        ));
    }

    #[test]
    fn rejects_negative_cost() {
        let mut submission = base_submission();
        submission.cost_usd = Some(-0.01);
        assert!(matches!(
            validate(&submission),
            Err(ValidationError::OutOfBounds { field: "cost_usd", .. })
        ));
    }
}
