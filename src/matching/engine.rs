//! Matching engine (C5): registry of per-symbol order books behind a
//! `RwLock<HashMap<..>>`, single-writer per symbol via a per-book `Mutex`,
//! per spec.md §5's concurrency model.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::Order;

use super::book::{BestBidAsk, Depth, OrderBook, OrderBookSnapshot, SubmitOutcome};

#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("quantity must be positive")]
    NonPositiveQuantity,
}

/// Owns every symbol's `OrderBook`. Cheap to clone (`Arc` internally) so it
/// can be shared across the tick pipeline, action processor, and REST
/// handlers without a global lock on reads.
#[derive(Clone)]
pub struct MatchingEngine {
    books: Arc<RwLock<HashMap<String, Arc<Mutex<OrderBook>>>>>,
    tick: Arc<Mutex<u64>>,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            books: Arc::new(RwLock::new(HashMap::new())),
            tick: Arc::new(Mutex::new(0)),
        }
    }

    /// Allocates an empty book per symbol. Idempotent: existing books are
    /// left untouched.
    pub fn initialize(&self, symbols: &[String]) {
        let mut books = self.books.write();
        for symbol in symbols {
            books
                .entry(symbol.clone())
                .or_insert_with(|| Arc::new(Mutex::new(OrderBook::new(symbol.clone()))));
        }
    }

    pub fn set_tick(&self, tick: u64) {
        *self.tick.lock() = tick;
        let books = self.books.read();
        for book in books.values() {
            book.lock().set_tick(tick);
        }
    }

    pub fn current_tick(&self) -> u64 {
        *self.tick.lock()
    }

    fn book_for(&self, symbol: &str) -> Option<Arc<Mutex<OrderBook>>> {
        self.books.read().get(symbol).cloned()
    }

    /// Unknown symbol → no-op success with empty fills and full remaining
    /// (spec.md §4.5 failure semantics); negative/zero quantity is rejected
    /// upstream by the action processor, so only a defensive check here.
    pub fn submit_order(&self, order: &Order) -> Result<SubmitOutcome, MatchingError> {
        if order.quantity <= 0 {
            return Err(MatchingError::NonPositiveQuantity);
        }

        let Some(book) = self.book_for(&order.symbol) else {
            return Ok(SubmitOutcome {
                remaining_quantity: order.remaining(),
                ..Default::default()
            });
        };

        let mut book = book.lock();
        let outcome = book.submit_order(order);

        if let Some(last_fill) = outcome.fills.last() {
            let triggered = book.drain_triggered_stops(last_fill.price);
            drop(book);
            for stop_order in triggered {
                // Triggered stops convert to MARKET and re-enter the book;
                // their own fills surface on the next tick's submissions,
                // not folded into this call's outcome.
                let _ = self.submit_order(&stop_order);
            }
        }

        Ok(outcome)
    }

    pub fn cancel_order(&self, symbol: &str, order_id: &str) -> bool {
        match self.book_for(symbol) {
            Some(book) => book.lock().cancel_order(order_id),
            None => false,
        }
    }

    /// Queues a STOP order off-book without attempting to match it.
    pub fn queue_stop(&self, order: &Order) {
        if let Some(book) = self.book_for(&order.symbol) {
            book.lock().queue_stop(order);
        }
    }

    pub fn best_bid_ask(&self, symbol: &str) -> BestBidAsk {
        match self.book_for(symbol) {
            Some(book) => book.lock().best_bid_ask(),
            None => BestBidAsk::default(),
        }
    }

    pub fn mid_price(&self, symbol: &str, fallback: Decimal) -> Decimal {
        match self.book_for(symbol) {
            Some(book) => book.lock().mid_price(fallback),
            None => fallback,
        }
    }

    pub fn depth(&self, symbol: &str) -> Depth {
        match self.book_for(symbol) {
            Some(book) => book.lock().depth(),
            None => Depth::default(),
        }
    }

    pub fn order_book(&self, symbol: &str) -> OrderBookSnapshot {
        match self.book_for(symbol) {
            Some(book) => book.lock().snapshot(),
            None => OrderBookSnapshot::default(),
        }
    }

    pub fn clear_all(&self) {
        let books = self.books.read();
        for book in books.values() {
            book.lock().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, OrderType, Side};
    use rust_decimal_macros::dec;

    fn limit(id: &str, agent: &str, side: Side, qty: i64, price: Decimal) -> Order {
        Order {
            id: id.to_string(),
            agent_id: agent.to_string(),
            symbol: "ACME".to_string(),
            side,
            order_type: OrderType::Limit,
            quantity: qty,
            filled_quantity: 0,
            price: Some(price),
            status: OrderStatus::Open,
            tick_submitted: 0,
        }
    }

    #[test]
    fn unknown_symbol_submit_is_a_no_op_success() {
        let engine = MatchingEngine::new();
        let order = limit("o1", "agent", Side::Buy, 10, dec!(10.00));
        let outcome = engine.submit_order(&order).unwrap();
        assert!(outcome.fills.is_empty());
        assert_eq!(outcome.remaining_quantity, 10);
    }

    #[test]
    fn initialize_is_idempotent() {
        let engine = MatchingEngine::new();
        engine.initialize(&["ACME".to_string()]);
        engine.submit_order(&limit("o1", "maker", Side::Buy, 10, dec!(9.00))).unwrap();
        engine.initialize(&["ACME".to_string()]);
        assert_eq!(engine.best_bid_ask("ACME").bid, Some(dec!(9.00)));
    }

    #[test]
    fn crossing_orders_produce_fills_and_best_price_updates() {
        let engine = MatchingEngine::new();
        engine.initialize(&["ACME".to_string()]);

        engine.submit_order(&limit("o1", "maker", Side::Sell, 50, dec!(150.00))).unwrap();
        engine.submit_order(&limit("o2", "maker", Side::Sell, 50, dec!(155.00))).unwrap();

        let outcome = engine
            .submit_order(&limit("o3", "taker", Side::Buy, 60, dec!(160.00)))
            .unwrap();
        assert_eq!(outcome.fills.len(), 2);
        assert_eq!(outcome.fills[0].price, dec!(150.00));
        assert_eq!(outcome.fills[1].price, dec!(155.00));
        assert_eq!(outcome.remaining_quantity, 0);

        assert_eq!(engine.best_bid_ask("ACME").ask, Some(dec!(155.00)));
    }

    #[test]
    fn negative_quantity_rejected() {
        let engine = MatchingEngine::new();
        engine.initialize(&["ACME".to_string()]);
        let mut order = limit("o1", "agent", Side::Buy, 10, dec!(10.00));
        order.quantity = -5;
        assert!(engine.submit_order(&order).is_err());
    }

    #[test]
    fn clear_all_empties_every_book() {
        let engine = MatchingEngine::new();
        engine.initialize(&["ACME".to_string()]);
        engine.submit_order(&limit("o1", "maker", Side::Buy, 10, dec!(9.00))).unwrap();
        engine.clear_all();
        assert_eq!(engine.best_bid_ask("ACME").bid, None);
    }

    #[test]
    fn cancel_unknown_symbol_returns_false() {
        let engine = MatchingEngine::new();
        assert!(!engine.cancel_order("NOPE", "o1"));
    }
}
