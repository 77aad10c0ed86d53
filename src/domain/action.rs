//! Agent actions as a tagged sum (spec.md §9 "Dynamic action dispatch" redesign
//! note): one variant per action type instead of an open switch, so every
//! precondition lives in one place and `process` is a single exhaustive match.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::order::{OrderType, Side};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    Buy {
        symbol: String,
        quantity: i64,
        order_type: OrderType,
        price: Option<rust_decimal::Decimal>,
    },
    Sell {
        symbol: String,
        quantity: i64,
        order_type: OrderType,
        price: Option<rust_decimal::Decimal>,
    },
    Short {
        symbol: String,
        quantity: i64,
        order_type: OrderType,
        price: Option<rust_decimal::Decimal>,
    },
    Cover {
        symbol: String,
        quantity: i64,
        order_type: OrderType,
        price: Option<rust_decimal::Decimal>,
    },
    CancelOrder {
        order_id: String,
    },
    Rumor {
        target_symbol: String,
        content: String,
    },
    Message {
        recipient_id: String,
        content: String,
    },
    Ally {
        target_agent_id: String,
    },
    AllyAccept {
        alliance_id: String,
    },
    AllyReject {
        alliance_id: String,
        reason: Option<String>,
    },
    AllyDissolve {
        alliance_id: String,
    },
    Bribe {
        target_agent_id: String,
        amount: rust_decimal::Decimal,
    },
    Whistleblow {
        target_agent_id: String,
        crime_type: super::investigation::CrimeType,
        evidence: String,
    },
    Flee {
        destination: String,
    },
}

impl Action {
    /// The wire-level/log-level tag for this action (used for the Action
    /// audit row and for ActionResult.action).
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Buy { .. } => "BUY",
            Action::Sell { .. } => "SELL",
            Action::Short { .. } => "SHORT",
            Action::Cover { .. } => "COVER",
            Action::CancelOrder { .. } => "CANCEL_ORDER",
            Action::Rumor { .. } => "RUMOR",
            Action::Message { .. } => "MESSAGE",
            Action::Ally { .. } => "ALLY",
            Action::AllyAccept { .. } => "ALLY_ACCEPT",
            Action::AllyReject { .. } => "ALLY_REJECT",
            Action::AllyDissolve { .. } => "ALLY_DISSOLVE",
            Action::Bribe { .. } => "BRIBE",
            Action::Whistleblow { .. } => "WHISTLEBLOW",
            Action::Flee { .. } => "FLEE",
        }
    }

    pub fn target_symbol(&self) -> Option<&str> {
        match self {
            Action::Buy { symbol, .. }
            | Action::Sell { symbol, .. }
            | Action::Short { symbol, .. }
            | Action::Cover { symbol, .. } => Some(symbol),
            Action::Rumor { target_symbol, .. } => Some(target_symbol),
            _ => None,
        }
    }

    pub fn target_agent_id(&self) -> Option<&str> {
        match self {
            Action::Message { recipient_id, .. } => Some(recipient_id),
            Action::Ally { target_agent_id } => Some(target_agent_id),
            Action::Bribe { target_agent_id, .. } => Some(target_agent_id),
            Action::Whistleblow { target_agent_id, .. } => Some(target_agent_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action: String,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ActionResult {
    pub fn ok(action: &str, data: Value) -> Self {
        Self {
            action: action.to_string(),
            success: true,
            message: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn ok_msg(action: &str, message: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.to_string(),
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn fail(action: &str, message: impl Into<String>) -> Self {
        Self {
            action: action.to_string(),
            success: false,
            message: message.into(),
            data: None,
        }
    }
}
