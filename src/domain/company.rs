//! Tradable instruments.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub current_price: Decimal,
    pub previous_close: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub market_cap: Decimal,
    pub shares_outstanding: i64,
    pub volatility: Decimal,
    pub beta: Decimal,
    pub sentiment: Decimal,
    pub is_public: bool,
}

impl Company {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, sector: impl Into<String>, price: Decimal, shares_outstanding: i64) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            sector: sector.into(),
            current_price: price,
            previous_close: price,
            open: price,
            high: price,
            low: price,
            market_cap: price * Decimal::from(shares_outstanding),
            shares_outstanding,
            volatility: Decimal::new(2, 2), // 0.02 default
            beta: Decimal::ONE,
            sentiment: Decimal::ZERO,
            is_public: true,
        }
    }

    /// Roll the high/low window at a new trading-day boundary (spec.md §4.7 step 4).
    pub fn rotate_day(&mut self) {
        self.previous_close = self.current_price;
        self.open = self.current_price;
        self.high = self.current_price;
        self.low = self.current_price;
    }

    /// Record a trade/mid price observed this tick, widening the day's high/low.
    pub fn observe_price(&mut self, price: Decimal) {
        self.current_price = price;
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.market_cap = price * Decimal::from(self.shares_outstanding);
    }
}
