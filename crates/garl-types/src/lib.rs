#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Garl Types
//!
//! Foundational data structures, error types, and configuration objects for the
//! Garl reputation oracle.
//!
//! ## Architectural role
//!
//! This crate has minimal dependencies and is itself a dependency of almost
//! every other crate in the workspace: `Agent`, `Trace`, `ReputationHistory`,
//! `Endorsement`, and `Webhook` are defined once here so that the engine,
//! storage, crypto, and webhook crates all speak the same vocabulary.

/// The maximum length, in bytes, of a trace's `task_description`.
pub const MAX_TASK_DESCRIPTION_BYTES: usize = 1000;
/// The maximum length, in bytes, of a trace's `input_summary` / `output_summary`.
pub const MAX_SUMMARY_BYTES: usize = 500;
/// The maximum size, in bytes, of the opaque `metadata` / `tool_calls` JSON blobs.
pub const MAX_OPEN_SHAPE_BYTES: usize = 4 * 1024;
/// The maximum number of traces accepted in a single batch submission.
pub const MAX_BATCH_SIZE: usize = 50;

/// A crate-wide `Result` alias with [`error::GarlError`] as the default error.
pub type Result<T, E = crate::error::GarlError> = std::result::Result<T, E>;

/// Core application-level data structures: `Agent`, `Trace`, `Endorsement`, `Webhook`, ...
pub mod app;
/// Read-only configuration records injected into the engine at startup.
pub mod config;
/// The unified set of error types surfaced by the core.
pub mod error;
