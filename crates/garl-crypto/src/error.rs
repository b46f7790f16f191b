// Path: crates/garl-crypto/src/error.rs
//! Local error type for the `garl-crypto` crate.

// Re-export the canonical error type from the types crate.
pub use garl_types::error::CryptoError;
