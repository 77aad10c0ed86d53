//! Law-enforcement investigations (spec.md §3 Investigation).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrimeType {
    InsiderTrading,
    MarketManipulation,
    Spoofing,
    WashTrading,
    PumpAndDump,
    Coordination,
    AccountingFraud,
    Bribery,
    TaxEvasion,
    Obstruction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    Open,
    Charged,
    Trial,
    Convicted,
    Acquitted,
    Settled,
}

impl InvestigationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestigationStatus::Open => "open",
            InvestigationStatus::Charged => "charged",
            InvestigationStatus::Trial => "trial",
            InvestigationStatus::Convicted => "convicted",
            InvestigationStatus::Acquitted => "acquitted",
            InvestigationStatus::Settled => "settled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(InvestigationStatus::Open),
            "charged" => Some(InvestigationStatus::Charged),
            "trial" => Some(InvestigationStatus::Trial),
            "convicted" => Some(InvestigationStatus::Convicted),
            "acquitted" => Some(InvestigationStatus::Acquitted),
            "settled" => Some(InvestigationStatus::Settled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investigation {
    pub id: String,
    pub target_agent_id: String,
    pub crime_type: CrimeType,
    pub status: InvestigationStatus,
    pub tick_opened: u64,
    pub tick_charged: Option<u64>,
    pub fine_amount: Option<rust_decimal::Decimal>,
    pub sentence_years: Option<u32>,
    pub imprisoned_until_tick: Option<u64>,
}
