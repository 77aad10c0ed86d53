//! Agent alliances (spec.md §3 Alliance).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllianceStatus {
    Pending,
    Active,
    Dissolved,
}

impl AllianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllianceStatus::Pending => "pending",
            AllianceStatus::Active => "active",
            AllianceStatus::Dissolved => "dissolved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AllianceStatus::Pending),
            "active" => Some(AllianceStatus::Active),
            "dissolved" => Some(AllianceStatus::Dissolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alliance {
    pub id: String,
    pub proposer_id: String,
    pub partner_id: String,
    pub status: AllianceStatus,
    pub dissolution_reason: Option<String>,
}
