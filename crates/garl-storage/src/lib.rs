#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Garl Storage
//!
//! Persists the four entity kinds the core reasons about — agents, traces,
//! reputation history, endorsements, and webhooks — behind a single
//! [`Storage`] trait. Traces, reputation history, and endorsements are
//! append-only: the trait has no `update_trace`, `update_reputation_history`,
//! or `update_endorsement` method, so the append-only invariant is enforced
//! at the type boundary rather than trusted to callers.
//!
//! Two implementations ship here: [`memory::InMemoryStorage`], backed by
//! `dashmap`, used by tests and as the zero-configuration default; and
//! [`redb_store::RedbStorage`], an embedded, pure-Rust, ACID key-value store,
//! for operators who want durability without standing up a relational
//! database (explicitly out of scope for this core; see `SPEC_FULL.md`).

mod memory;
mod redb_store;
mod traits;

pub use memory::InMemoryStorage;
pub use redb_store::RedbStorage;
pub use traits::Storage;
