//! The `Trace` aggregate and its signed certificate envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{Category, TraceStatus};
use super::{AgentId, TraceId};

/// A single tool invocation recorded as part of a trace's execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// The tool's name.
    pub name: String,
    /// How long the call took, in milliseconds.
    pub duration_ms: u64,
}

/// One append-only execution record submitted by an agent.
///
/// Once written, a `Trace` is never mutated or deleted; `(agent_id, trace_hash)`
/// is globally unique and the pipeline treats a second submission of the same
/// hash as an idempotent replay rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Globally unique identifier assigned by the ledger at persistence time.
    pub trace_id: TraceId,
    /// The agent that produced this execution.
    pub agent_id: AgentId,
    /// Free-text description of the task, capped at 1000 characters.
    pub task_description: String,
    /// The execution outcome.
    pub status: TraceStatus,
    /// Wall-clock duration of the execution, in milliseconds.
    pub duration_ms: u64,
    /// The task domain, used to select the speed/cost benchmarks.
    pub category: Category,
    /// Cost of the execution in USD, if the caller reported one.
    pub cost_usd: Option<f64>,
    /// Token count consumed, if reported.
    pub token_count: u64,
    /// Tool invocations made during execution.
    pub tool_calls: Vec<ToolCall>,
    /// Summary of the input, capped at 500 characters. Replaced by its SHA-256
    /// hex digest when the submitter requests PII masking.
    pub input_summary: Option<String>,
    /// Summary of the output, same capping/masking rules as `input_summary`.
    pub output_summary: Option<String>,
    /// The declared execution environment (e.g. "python3.11/docker").
    pub runtime_env: Option<String>,
    /// Declared tool/resource permissions for this execution, used by the
    /// security dimension to reward agents that stay within bounds.
    pub declared_permissions: Vec<String>,
    /// `true` if this execution was flagged (by the caller or a downstream
    /// sandbox) as having triggered a security event.
    pub security_event: bool,
    /// SHA-256 of the canonical payload (excludes server-assigned fields).
    pub trace_hash: String,
    /// The signed certificate issued for this trace.
    pub certificate: Certificate,
    /// `trust_score_after - trust_score_before`, recorded at persistence time.
    pub trust_delta: f64,
    /// When the ledger persisted this trace.
    pub created_at: DateTime<Utc>,
}

/// The portion of a trace that is hashed and signed. Excludes fields the
/// server assigns after the fact (`trace_id`, `certificate`, `trust_delta`,
/// `created_at`), so that the same logical submission always hashes the same
/// way regardless of when or how many times it is (re-)submitted.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalTracePayload<'a> {
    /// See [`Trace::agent_id`].
    pub agent_id: AgentId,
    /// See [`Trace::task_description`].
    pub task_description: &'a str,
    /// See [`Trace::status`].
    pub status: TraceStatus,
    /// See [`Trace::duration_ms`].
    pub duration_ms: u64,
    /// See [`Trace::category`].
    pub category: Category,
    /// See [`Trace::cost_usd`].
    pub cost_usd: Option<f64>,
    /// See [`Trace::token_count`].
    pub token_count: u64,
    /// See [`Trace::tool_calls`].
    pub tool_calls: &'a [ToolCall],
    /// See [`Trace::input_summary`] (post PII-masking, if requested).
    pub input_summary: Option<&'a str>,
    /// See [`Trace::output_summary`] (post PII-masking, if requested).
    pub output_summary: Option<&'a str>,
    /// See [`Trace::runtime_env`].
    pub runtime_env: Option<&'a str>,
}

/// The proof block of a certificate: who signed, when, and with what algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateProof {
    /// Always `"ECDSA-secp256k1"`.
    #[serde(rename = "type")]
    pub proof_type: String,
    /// When the certificate was issued.
    pub created: DateTime<Utc>,
    /// Hex-encoded SEC1 public key, independently verifiable against the
    /// `.well-known` discovery endpoint.
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// DER-encoded ECDSA signature, hex-encoded.
    pub signature: String,
    /// The signing algorithm identifier, currently always `"ECDSA-secp256k1"`.
    pub alg: String,
}

/// The publicly verifiable envelope issued for every persisted trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    /// JSON-LD context URI.
    #[serde(rename = "@context")]
    pub context: String,
    /// JSON-LD type discriminator, always `"CertifiedExecutionTrace"`.
    #[serde(rename = "@type")]
    pub cert_type: String,
    /// The signed payload summary.
    pub payload: CertificatePayload,
    /// The cryptographic proof over `payload`.
    pub proof: CertificateProof,
}

/// The payload block of a certificate: a compact summary of the trace, not the
/// full record, sufficient for a third party to verify the certificate matches
/// a claimed trace without re-fetching it from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificatePayload {
    /// See [`Trace::trace_id`].
    pub trace_id: TraceId,
    /// See [`Trace::agent_id`].
    pub agent_id: AgentId,
    /// See [`Trace::status`].
    pub status: TraceStatus,
    /// The agent's composite trust score immediately after this trace.
    pub trust_score_after: f64,
    /// See [`Trace::trace_hash`].
    pub trace_hash: String,
    /// See [`Trace::created_at`].
    pub created: DateTime<Utc>,
}
