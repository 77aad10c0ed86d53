//! Wire envelope for the socket channel (spec.md §4.8).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every event type the tick pipeline or action processor may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Trade,
    News,
    PriceUpdate,
    TickUpdate,
    Alert,
    OrderFilled,
    Investigation,
    MarginCall,
    MarketUpdate,
}

impl EventType {
    /// Events gated on AUTH and delivered only to the owning agent,
    /// regardless of channel subscription (spec.md §4.8: "AUTH must precede
    /// per-agent channels").
    pub fn is_private(&self) -> bool {
        matches!(self, EventType::OrderFilled | EventType::Alert | EventType::MarginCall)
    }
}

/// `{type, timestamp, sequence, payload}` — `sequence` is assigned per
/// connection at send time, never carried on the bus envelope itself.
#[derive(Debug, Clone, Serialize)]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: String,
    pub sequence: u64,
    pub payload: Value,
    /// Set on replayed (as opposed to live) events so clients can
    /// distinguish them per spec.md §4.10.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub replay: bool,
}

/// What travels on the internal broadcast bus before a connection stamps a
/// sequence number and timestamp onto it.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub event_type: EventType,
    pub channel: String,
    pub payload: Value,
    /// Present for private event types; the only agent this message may be
    /// delivered to.
    pub target_agent_id: Option<String>,
}

impl BusMessage {
    pub fn public(channel: impl Into<String>, event_type: EventType, payload: Value) -> Self {
        Self { event_type, channel: channel.into(), payload, target_agent_id: None }
    }

    pub fn private(agent_id: impl Into<String>, event_type: EventType, payload: Value) -> Self {
        Self {
            event_type,
            channel: "agent".to_string(),
            payload,
            target_agent_id: Some(agent_id.into()),
        }
    }
}
