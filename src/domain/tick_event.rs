//! Persisted per-tick event records (spec.md §3 TickEventRecord, §4.10).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::news::NewsArticle;
use super::order::Trade;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub volume: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickEventRecord {
    pub tick: u64,
    pub timestamp: i64,
    pub trades: Vec<Trade>,
    pub news: Vec<NewsArticle>,
    pub price_updates: Vec<PriceUpdate>,
}
