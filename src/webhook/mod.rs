//! Webhook dispatcher (C9): signed, retried, circuit-breaker-gated delivery
//! of tick/event payloads to each agent's registered endpoint.

pub mod dispatcher;
pub mod signing;
pub mod stats;

pub use dispatcher::{DeliveryOutcome, WebhookDispatcher};
