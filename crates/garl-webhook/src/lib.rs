// Path: crates/garl-webhook/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Garl Webhook Dispatcher
//!
//! Background fan-out of [`garl_types::app::WebhookEvent`]s to the
//! subscriptions that opted into them (`SPEC_FULL.md` §4.6): HMAC-SHA256
//! signed body, 5s per-attempt timeout, `{1s, 2s, 4s}` retry backoff, then
//! drop-and-log. At-least-once, best-effort ordering per subscriber.
//!
//! Grounded in the teacher's `relayer/src/gateway.rs` retry loop, generalized
//! from a query-gateway client to an outbound webhook sender.

mod dispatcher;
mod handle;
mod signing;

pub use dispatcher::Dispatcher;
pub use handle::DispatchHandle;
pub use signing::sign_body;
