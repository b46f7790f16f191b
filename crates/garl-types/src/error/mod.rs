//! Core error types for the Garl reputation oracle.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
///
/// The HTTP adapter (external to this crate) maps these codes onto status
/// lines; the core never leaks internal detail (stack traces, SQL) across
/// that boundary, only the code and the `Display` message.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors surfaced by trace validation (schema, field bounds, cross-field rules).
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field was missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    /// A field exceeded its documented length or value bound.
    #[error("field {field} out of bounds: {reason}")]
    OutOfBounds {
        /// The offending field name.
        field: &'static str,
        /// A human-readable explanation of the bound that was violated.
        reason: String,
    },
    /// An open-shape JSON payload (`metadata`, `tool_calls`) exceeded its size cap.
    #[error("payload {field} exceeds {limit} bytes")]
    PayloadTooLarge {
        /// The offending field name.
        field: &'static str,
        /// The configured size cap, in bytes.
        limit: usize,
    },
    /// The submitted category is not one of the closed enumeration values.
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    /// A generic, unspecified validation failure.
    #[error("validation failed: {0}")]
    Other(String),
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "VALIDATION_MISSING_FIELD",
            Self::OutOfBounds { .. } => "VALIDATION_OUT_OF_BOUNDS",
            Self::PayloadTooLarge { .. } => "VALIDATION_PAYLOAD_TOO_LARGE",
            Self::UnknownCategory(_) => "VALIDATION_UNKNOWN_CATEGORY",
            Self::Other(_) => "VALIDATION_FAILED",
        }
    }
}

/// Errors from the signing module (canonicalisation, hashing, ECDSA sign/verify).
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The signature failed cryptographic verification.
    #[error("signature verification failed")]
    VerificationFailed,
    /// The configured signing key is malformed.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    /// Canonical serialisation of the payload failed.
    #[error("canonicalisation failed: {0}")]
    Canonicalisation(String),
    /// A generic failure in the underlying cryptographic library.
    #[error("cryptographic operation failed: {0}")]
    OperationFailed(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::VerificationFailed => "CRYPTO_VERIFICATION_FAILED",
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::Canonicalisation(_) => "CRYPTO_CANONICALISATION_FAILED",
            Self::OperationFailed(_) => "CRYPTO_OPERATION_FAILED",
        }
    }
}

/// Errors surfaced by the storage abstraction.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A generic error from the underlying storage backend.
    #[error("backend error: {0}")]
    Backend(String),
    /// The requested entity was not found.
    #[error("not found")]
    NotFound,
    /// A uniqueness constraint (e.g. `(agent_id, trace_hash)`) was violated.
    #[error("duplicate entry: {0}")]
    Duplicate(String),
    /// An append-only entity was mutated or deleted, which is never valid.
    #[error("attempted to mutate append-only entity: {0}")]
    AppendOnlyViolation(String),
    /// Encoding a value for storage failed.
    #[error("encode error: {0}")]
    Encode(String),
    /// Decoding a value read from storage failed.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "STORAGE_BACKEND_ERROR",
            Self::NotFound => "STORAGE_NOT_FOUND",
            Self::Duplicate(_) => "STORAGE_DUPLICATE",
            Self::AppendOnlyViolation(_) => "STORAGE_APPEND_ONLY_VIOLATION",
            Self::Encode(_) => "STORAGE_ENCODE_ERROR",
            Self::Decode(_) => "STORAGE_DECODE_ERROR",
        }
    }
}

/// Errors from dispatching a webhook notification. These never propagate to the
/// submitter of a trace; they are logged and recorded against the subscription.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The delivery attempt timed out.
    #[error("webhook delivery timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The subscriber responded with a non-2xx status after exhausting retries.
    #[error("webhook delivery failed with status {0} after retries")]
    NonSuccessStatus(u16),
    /// A transport-level error occurred talking to the subscriber.
    #[error("webhook transport error: {0}")]
    Transport(String),
    /// The in-memory dispatch queue was full and the event was dropped.
    #[error("webhook queue full, event dropped")]
    QueueFull,
}

impl ErrorCode for DispatchError {
    fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "DISPATCH_TIMEOUT",
            Self::NonSuccessStatus(_) => "DISPATCH_NON_SUCCESS_STATUS",
            Self::Transport(_) => "DISPATCH_TRANSPORT_ERROR",
            Self::QueueFull => "DISPATCH_QUEUE_FULL",
        }
    }
}

/// The unified error type surfaced at the boundary of the core engine.
///
/// Every variant carries enough information for the (external) HTTP adapter to
/// pick a status code via [`ErrorCode::code`] without inspecting internals.
#[derive(Debug, Error)]
pub enum GarlError {
    /// Schema or field-bounds violation. Maps to 4xx.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    /// Missing or unknown API key. Maps to 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The API key belongs to a different agent, or the agent is soft-deleted. Maps to 403.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The requested agent, trace, endorsement, or webhook id is unknown. Maps to 404.
    #[error("not found: {0}")]
    NotFound(String),
    /// `(agent_id, trace_hash)` or `(endorser_id, target_id)` already exists. Maps to 409.
    #[error("duplicate: {0}")]
    Duplicate(String),
    /// A non-idempotent operation conflicted with concurrent state. Maps to 409.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The rate limiter tripped before the request reached the engine. Maps to 429.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds the caller should wait before retrying.
        retry_after_secs: u64,
    },
    /// The signing key is malformed or storage was unreachable at startup. Fatal.
    #[error("configuration error: {0}")]
    Config(String),
    /// A transient storage failure occurred mid-request. Maps to 5xx.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    /// Self-endorsement was attempted.
    #[error("an agent cannot endorse itself")]
    SelfEndorsement,
}

impl ErrorCode for GarlError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.code(),
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Duplicate(_) => "DUPLICATE",
            Self::Conflict(_) => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Storage(e) => e.code(),
            Self::Crypto(e) => e.code(),
            Self::SelfEndorsement => "SELF_ENDORSEMENT",
        }
    }
}

impl From<DispatchError> for GarlError {
    fn from(e: DispatchError) -> Self {
        // Dispatch failures are logged, never surfaced to a trace submitter; this
        // conversion exists only for callers (e.g. admin tooling) that inspect
        // webhook delivery outcomes directly through the same error boundary.
        GarlError::Conflict(format!("webhook dispatch: {e}"))
    }
}
