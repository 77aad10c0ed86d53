//! Agent identity and account state.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::secrets::redact;

/// Lifecycle status of an agent. Terminal statuses forbid trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Bankrupt,
    Imprisoned,
    Fled,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Bankrupt => "bankrupt",
            AgentStatus::Imprisoned => "imprisoned",
            AgentStatus::Fled => "fled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AgentStatus::Active),
            "bankrupt" => Some(AgentStatus::Bankrupt),
            "imprisoned" => Some(AgentStatus::Imprisoned),
            "fled" => Some(AgentStatus::Fled),
            _ => None,
        }
    }

    /// Terminal statuses forbid trading (spec.md §3 Agent lifecycle).
    pub fn can_trade(&self) -> bool {
        matches!(self, AgentStatus::Active)
    }
}

/// An autonomous agent's persisted account state.
#[derive(Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub display_name: String,
    pub role: String,
    pub status: AgentStatus,
    pub cash: Decimal,
    pub margin_used: Decimal,
    pub margin_limit: Decimal,
    pub reputation: i64,
    pub alliance_id: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_failures: u32,
    pub last_webhook_error: Option<String>,
    pub last_webhook_success_at: Option<i64>,
    pub last_response_time_ms: Option<u64>,
    pub avg_response_time_ms: Option<u64>,
    pub webhook_success_count: u64,
}

impl Agent {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, starting_cash: Decimal) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role: "trader".to_string(),
            status: AgentStatus::Active,
            cash: starting_cash,
            margin_used: Decimal::ZERO,
            margin_limit: Decimal::ZERO,
            reputation: 50,
            alliance_id: None,
            webhook_url: None,
            webhook_secret: None,
            webhook_failures: 0,
            last_webhook_error: None,
            last_webhook_success_at: None,
            last_response_time_ms: None,
            avg_response_time_ms: None,
            webhook_success_count: 0,
        }
    }
}

/// Hand-written so `webhook_secret` never appears in cleartext if an `Agent`
/// is ever logged or debug-printed as a whole.
impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("status", &self.status)
            .field("cash", &self.cash)
            .field("margin_used", &self.margin_used)
            .field("margin_limit", &self.margin_limit)
            .field("reputation", &self.reputation)
            .field("alliance_id", &self.alliance_id)
            .field("webhook_url", &self.webhook_url)
            .field("webhook_secret", &self.webhook_secret.as_deref().map(redact))
            .field("webhook_failures", &self.webhook_failures)
            .field("last_webhook_error", &self.last_webhook_error)
            .field("last_webhook_success_at", &self.last_webhook_success_at)
            .field("last_response_time_ms", &self.last_response_time_ms)
            .field("avg_response_time_ms", &self.avg_response_time_ms)
            .field("webhook_success_count", &self.webhook_success_count)
            .finish()
    }
}

/// A single position held by an agent in one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub agent_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub avg_cost: Decimal,
}
