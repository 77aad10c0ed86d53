//! Per-symbol limit order book (C5): `BTreeMap` price levels plus
//! `VecDeque` FIFO queues per level, matching spec.md §4.5's exact
//! operation set.

use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{Order, OrderStatus, OrderType, Side, Trade};

/// A resting order at one price level. Distinct from `domain::Order`: the
/// book only needs enough to match and report fills; the full order record
/// lives in the persistence gateway.
#[derive(Debug, Clone)]
struct RestingOrder {
    order_id: String,
    agent_id: String,
    price: Decimal,
    original_quantity: i64,
    remaining: i64,
    tick_submitted: u64,
}

#[derive(Debug, Default)]
struct PriceLevel {
    orders: VecDeque<RestingOrder>,
    total_size: i64,
}

impl PriceLevel {
    fn push(&mut self, order: RestingOrder) {
        self.total_size += order.remaining;
        self.orders.push_back(order);
    }

    fn remove(&mut self, order_id: &str) -> Option<RestingOrder> {
        let idx = self.orders.iter().position(|o| o.order_id == order_id)?;
        let order = self.orders.remove(idx)?;
        self.total_size -= order.remaining;
        Some(order)
    }

    fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// A fill produced by a single match between an incoming order and one
/// resting order (spec.md §4.5 step 5).
#[derive(Debug, Clone)]
pub struct Fill {
    pub price: Decimal,
    pub quantity: i64,
    pub resting_order_id: String,
    pub resting_agent_id: String,
}

/// Cumulative effect of this matching call on one resting order that was
/// touched (spec.md §4.5: "affectedRestingOrders").
#[derive(Debug, Clone)]
pub struct AffectedOrder {
    pub order_id: String,
    pub filled_quantity_delta: i64,
    pub cumulative_filled_quantity: i64,
    pub total_quantity: i64,
    pub avg_fill_price: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct SubmitOutcome {
    pub fills: Vec<Fill>,
    pub affected_resting_orders: Vec<AffectedOrder>,
    pub remaining_quantity: i64,
}

#[derive(Debug, Clone)]
struct PendingStop {
    order_id: String,
    agent_id: String,
    side: Side,
    quantity: i64,
    stop_price: Decimal,
    tick_submitted: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BestBidAsk {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Depth {
    pub bid_depth: Decimal,
    pub ask_depth: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

/// One symbol's live limit order book. Bids keyed ascending by price with
/// the best (highest) bid read off the last entry via plain `BTreeMap`
/// `last_key_value()`/`first_key_value()`.
pub struct OrderBook {
    symbol: String,
    bids: BTreeMap<Decimal, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
    stop_orders: Vec<PendingStop>,
    tick: u64,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            stop_orders: Vec::new(),
            tick: 0,
        }
    }

    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Queue a STOP order off-book (spec.md §4.5 Open Question resolution —
    /// never visible to `depth`/`snapshot` until triggered).
    pub fn queue_stop(&mut self, order: &Order) {
        self.stop_orders.push(PendingStop {
            order_id: order.id.clone(),
            agent_id: order.agent_id.clone(),
            side: order.side,
            quantity: order.remaining(),
            stop_price: order.price.unwrap_or_default(),
            tick_submitted: order.tick_submitted,
        });
    }

    /// Pop every stop order whose trigger has been crossed by the latest
    /// trade price, converting each to a MARKET order (spec.md resolution).
    pub fn drain_triggered_stops(&mut self, last_trade_price: Decimal) -> Vec<Order> {
        let (triggered, remaining): (Vec<_>, Vec<_>) =
            self.stop_orders.drain(..).partition(|stop| match stop.side {
                Side::Buy => last_trade_price >= stop.stop_price,
                Side::Sell => last_trade_price <= stop.stop_price,
            });
        self.stop_orders = remaining;

        triggered
            .into_iter()
            .map(|stop| Order {
                id: stop.order_id,
                agent_id: stop.agent_id,
                symbol: self.symbol.clone(),
                side: stop.side,
                order_type: OrderType::Market,
                quantity: stop.quantity,
                filled_quantity: 0,
                price: None,
                status: OrderStatus::Pending,
                tick_submitted: stop.tick_submitted,
            })
            .collect()
    }

    fn opposing_side_empty(&self, side: Side) -> bool {
        match side {
            Side::Buy => self.asks.is_empty(),
            Side::Sell => self.bids.is_empty(),
        }
    }

    /// Whether the incoming order's limit still permits matching against
    /// the best opposing price (spec.md §4.5 step 3).
    fn limit_crosses(side: Side, limit: Decimal, opposing_price: Decimal) -> bool {
        match side {
            Side::Buy => opposing_price <= limit,
            Side::Sell => opposing_price >= limit,
        }
    }

    fn best_opposing_price(&self, side: Side) -> Option<Decimal> {
        match side {
            Side::Buy => self.asks.keys().next().copied(),
            Side::Sell => self.bids.keys().next_back().copied(),
        }
    }

    pub fn submit_order(&mut self, order: &Order) -> SubmitOutcome {
        let mut outcome = SubmitOutcome {
            remaining_quantity: order.remaining(),
            ..Default::default()
        };
        let mut affected: Vec<AffectedOrder> = Vec::new();

        while outcome.remaining_quantity > 0 && !self.opposing_side_empty(order.side) {
            let Some(best_price) = self.best_opposing_price(order.side) else {
                break;
            };

            if order.order_type == OrderType::Limit {
                let limit = order.price.unwrap_or_default();
                if !Self::limit_crosses(order.side, limit, best_price) {
                    break;
                }
            }

            let level_empty_after = {
                let level = match order.side {
                    Side::Buy => self.asks.get_mut(&best_price),
                    Side::Sell => self.bids.get_mut(&best_price),
                };
                let Some(level) = level else { break };

                let Some(resting) = level.orders.front_mut() else {
                    break;
                };

                let fill_qty = outcome.remaining_quantity.min(resting.remaining);
                resting.remaining -= fill_qty;
                level.total_size -= fill_qty;
                outcome.remaining_quantity -= fill_qty;

                outcome.fills.push(Fill {
                    price: best_price,
                    quantity: fill_qty,
                    resting_order_id: resting.order_id.clone(),
                    resting_agent_id: resting.agent_id.clone(),
                });

                match affected.iter_mut().find(|a| a.order_id == resting.order_id) {
                    Some(existing) => {
                        let total_value = existing.avg_fill_price * Decimal::from(existing.filled_quantity_delta)
                            + best_price * Decimal::from(fill_qty);
                        existing.filled_quantity_delta += fill_qty;
                        existing.cumulative_filled_quantity += fill_qty;
                        existing.avg_fill_price = total_value / Decimal::from(existing.filled_quantity_delta);
                    }
                    None => {
                        let already_filled = resting.original_quantity - resting.remaining - fill_qty;
                        affected.push(AffectedOrder {
                            order_id: resting.order_id.clone(),
                            filled_quantity_delta: fill_qty,
                            cumulative_filled_quantity: already_filled + fill_qty,
                            total_quantity: resting.original_quantity,
                            avg_fill_price: best_price,
                        });
                    }
                }

                let resting_id = resting.order_id.clone();
                if resting.remaining == 0 {
                    level.remove(&resting_id);
                }

                level.is_empty()
            };

            if level_empty_after {
                match order.side {
                    Side::Buy => {
                        self.asks.remove(&best_price);
                    }
                    Side::Sell => {
                        self.bids.remove(&best_price);
                    }
                }
            }
        }

        outcome.affected_resting_orders = affected;

        if outcome.remaining_quantity > 0 && order.order_type == OrderType::Limit {
            let price = order.price.unwrap_or_default();
            let level = match order.side {
                Side::Buy => self.bids.entry(price).or_default(),
                Side::Sell => self.asks.entry(price).or_default(),
            };
            level.push(RestingOrder {
                order_id: order.id.clone(),
                agent_id: order.agent_id.clone(),
                price,
                original_quantity: order.quantity,
                remaining: outcome.remaining_quantity,
                tick_submitted: order.tick_submitted,
            });
        }

        outcome
    }

    pub fn cancel_order(&mut self, order_id: &str) -> bool {
        for (price, level) in self.bids.iter_mut() {
            if level.remove(order_id).is_some() {
                let price = *price;
                if level.is_empty() {
                    self.bids.remove(&price);
                }
                return true;
            }
        }
        for (price, level) in self.asks.iter_mut() {
            if level.remove(order_id).is_some() {
                let price = *price;
                if level.is_empty() {
                    self.asks.remove(&price);
                }
                return true;
            }
        }
        if let Some(idx) = self.stop_orders.iter().position(|s| s.order_id == order_id) {
            self.stop_orders.remove(idx);
            return true;
        }
        false
    }

    pub fn best_bid_ask(&self) -> BestBidAsk {
        BestBidAsk {
            bid: self.bids.keys().next_back().copied(),
            ask: self.asks.keys().next().copied(),
        }
    }

    pub fn mid_price(&self, fallback: Decimal) -> Decimal {
        let bba = self.best_bid_ask();
        match (bba.bid, bba.ask) {
            (Some(bid), Some(ask)) => (bid + ask) / Decimal::TWO,
            _ => fallback,
        }
    }

    pub fn depth(&self) -> Depth {
        let bid_depth = self
            .bids
            .iter()
            .map(|(price, level)| *price * Decimal::from(level.total_size))
            .sum();
        let ask_depth = self
            .asks
            .iter()
            .map(|(price, level)| *price * Decimal::from(level.total_size))
            .sum();
        Depth { bid_depth, ask_depth }
    }

    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            bids: self
                .bids
                .iter()
                .rev()
                .map(|(price, level)| BookLevel {
                    price: *price,
                    quantity: level.total_size,
                })
                .collect(),
            asks: self
                .asks
                .iter()
                .map(|(price, level)| BookLevel {
                    price: *price,
                    quantity: level.total_size,
                })
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.stop_orders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn limit_order(id: &str, agent: &str, side: Side, qty: i64, price: Decimal) -> Order {
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

    fn market_order(id: &str, agent: &str, side: Side, qty: i64) -> Order {
        Order {
            id: id.to_string(),
            agent_id: agent.to_string(),
            symbol: "ACME".to_string(),
            side,
            order_type: OrderType::Market,
            quantity: qty,
            filled_quantity: 0,
            price: None,
            status: OrderStatus::Open,
            tick_submitted: 0,
        }
    }

    #[test]
    fn resting_limit_order_fills_against_crossing_market_order() {
        let mut book = OrderBook::new("ACME");
        book.submit_order(&limit_order("o1", "maker", Side::Sell, 100, dec!(10.00)));

        let outcome = book.submit_order(&market_order("o2", "taker", Side::Buy, 40));
        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].quantity, 40);
        assert_eq!(outcome.fills[0].price, dec!(10.00));
        assert_eq!(outcome.remaining_quantity, 0);

        let snapshot = book.snapshot();
        assert_eq!(snapshot.asks[0].quantity, 60);
    }

    #[test]
    fn price_time_priority_fills_earliest_order_first() {
        let mut book = OrderBook::new("ACME");
        book.submit_order(&limit_order("o1", "maker1", Side::Sell, 10, dec!(10.00)));
        book.submit_order(&limit_order("o2", "maker2", Side::Sell, 10, dec!(10.00)));

        let outcome = book.submit_order(&market_order("taker", "taker", Side::Buy, 15));
        assert_eq!(outcome.fills[0].resting_order_id, "o1");
        assert_eq!(outcome.fills[0].quantity, 10);
        assert_eq!(outcome.fills[1].resting_order_id, "o2");
        assert_eq!(outcome.fills[1].quantity, 5);
    }

    #[test]
    fn limit_order_does_not_cross_worse_price() {
        let mut book = OrderBook::new("ACME");
        book.submit_order(&limit_order("o1", "maker", Side::Sell, 10, dec!(10.00)));

        let outcome = book.submit_order(&limit_order("o2", "taker", Side::Buy, 10, dec!(9.00)));
        assert!(outcome.fills.is_empty());
        assert_eq!(outcome.remaining_quantity, 10);

        let bba = book.best_bid_ask();
        assert_eq!(bba.bid, Some(dec!(9.00)));
        assert_eq!(bba.ask, Some(dec!(10.00)));
    }

    #[test]
    fn cancel_removes_resting_order() {
        let mut book = OrderBook::new("ACME");
        book.submit_order(&limit_order("o1", "maker", Side::Buy, 10, dec!(9.00)));
        assert!(book.cancel_order("o1"));
        assert!(!book.cancel_order("o1"));
        assert_eq!(book.best_bid_ask().bid, None);
    }

    #[test]
    fn unknown_symbol_cancel_is_a_no_op() {
        let mut book = OrderBook::new("ACME");
        assert!(!book.cancel_order("does-not-exist"));
    }

    #[test]
    fn stop_order_triggers_on_crossing_trade_price() {
        let mut book = OrderBook::new("ACME");
        let mut stop = market_order("s1", "agent", Side::Sell, 5);
        stop.order_type = OrderType::Stop;
        stop.price = Some(dec!(8.00));
        book.queue_stop(&stop);

        let none_triggered = book.drain_triggered_stops(dec!(9.00));
        assert!(none_triggered.is_empty());

        let triggered = book.drain_triggered_stops(dec!(7.50));
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].order_type, OrderType::Market);
    }
}
