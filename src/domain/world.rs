//! World-level simulation state (spec.md §3 WorldState, §4.11).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    Normal,
    Bull,
    Bear,
    Crash,
    Bubble,
}

impl MarketRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::Normal => "normal",
            MarketRegime::Bull => "bull",
            MarketRegime::Bear => "bear",
            MarketRegime::Crash => "crash",
            MarketRegime::Bubble => "bubble",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(MarketRegime::Normal),
            "bull" => Some(MarketRegime::Bull),
            "bear" => Some(MarketRegime::Bear),
            "crash" => Some(MarketRegime::Crash),
            "bubble" => Some(MarketRegime::Bubble),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub tick: u64,
    pub market_open: bool,
    pub regime: MarketRegime,
    pub interest_rate: Decimal,
    pub inflation_rate: Decimal,
    pub gdp_growth: Decimal,
    pub last_tick_at: i64,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            tick: 0,
            market_open: true,
            regime: MarketRegime::Normal,
            interest_rate: Decimal::new(5, 2),
            inflation_rate: Decimal::new(2, 2),
            gdp_growth: Decimal::new(2, 2),
            last_tick_at: 0,
        }
    }
}

/// A transient market-wide or per-symbol/sector event (spec.md §3 MarketEvent).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: String,
    pub event_type: String,
    pub symbol: Option<String>,
    pub sector: Option<String>,
    pub impact: f64,
    pub duration: u64,
    pub remaining_duration: u64,
    pub tick_issued: u64,
    pub headline: String,
    pub created_at: i64,
}

impl MarketEvent {
    pub fn is_active(&self) -> bool {
        self.remaining_duration > 0
    }

    pub fn decay(&mut self) {
        self.remaining_duration = self.remaining_duration.saturating_sub(1);
    }
}
