//! The 8-step per-tick settlement pipeline (spec.md §4.7 steps 2-8; step 1
//! — action ingress under a per-agent lock — runs synchronously inside
//! `ActionProcessor` before a fill ever reaches this pipeline's queue).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::warn;

use crate::actions::{PendingFill, PendingFillQueue};
use crate::config::Config;
use crate::domain::{
    AgentStatus, Company, Holding, MarketEvent, MarketRegime, NewsArticle, NewsSource, PriceUpdate,
    Side, TickEventRecord, Trade,
};
use crate::matching::MatchingEngine;
use crate::persistence::{GatewayResult, PersistenceGateway};
use crate::realtime::{BusMessage, EventBus, EventType};
use crate::resilience::{retry_async, RetryProfile};
use crate::webhook::WebhookDispatcher;
use crate::world::RegimePolicy;

/// Everything this tick produced, returned for callers (tests, the
/// `/world/tick` handler) that want to inspect the outcome directly rather
/// than only observing it on the event bus.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub tick: u64,
    pub trades: Vec<Trade>,
    pub price_updates: Vec<PriceUpdate>,
    pub regime: MarketRegime,
    pub market_open: bool,
    pub margin_calls: Vec<String>,
    pub bankruptcies: Vec<String>,
}

pub struct TickPipeline {
    gateway: Arc<dyn PersistenceGateway>,
    engine: MatchingEngine,
    bus: EventBus,
    pending_fills: PendingFillQueue,
    regime_policy: Arc<dyn RegimePolicy>,
    webhooks: Arc<WebhookDispatcher>,
    news_source: Arc<dyn NewsSource>,
    config: Arc<Config>,
    recent_changes: Mutex<VecDeque<Decimal>>,
    active_events: Mutex<Vec<MarketEvent>>,
}

impl TickPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        engine: MatchingEngine,
        bus: EventBus,
        pending_fills: PendingFillQueue,
        regime_policy: Arc<dyn RegimePolicy>,
        webhooks: Arc<WebhookDispatcher>,
        news_source: Arc<dyn NewsSource>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            gateway,
            engine,
            bus,
            pending_fills,
            regime_policy,
            webhooks,
            news_source,
            config,
            recent_changes: Mutex::new(VecDeque::new()),
            active_events: Mutex::new(Vec::new()),
        }
    }

    /// Every durable write inside the tick pipeline goes through this: two
    /// extra attempts on a short backoff (spec.md §7's DATABASE retry
    /// profile), since a tick that drops a write silently is worse than one
    /// that takes an extra 100ms.
    async fn persist<F>(&self, mut op: F) -> GatewayResult<()>
    where
        F: FnMut() -> GatewayResult<()>,
    {
        retry_async(RetryProfile::DATABASE, || async { op() }).await
    }

    /// Runs one full tick to completion. Never returns early on a per-agent
    /// failure — settlement errors for one fill are logged and skipped so
    /// the tick always finishes (spec.md §4.7: "the tick always completes").
    pub async fn run_tick(&self, tick: u64) -> TickOutcome {
        self.engine.set_tick(tick);

        let fills = std::mem::take(&mut *self.pending_fills.lock());
        let trades = self.settle_fills(tick, fills).await;

        let (margin_calls, bankruptcies) = self.recompute_margin_and_solvency().await;

        let price_updates = self.recompute_prices(tick, &trades).await;

        let (regime, market_open) = self.evolve_world_state(tick, &price_updates).await;

        let news = self.news_source.poll(tick);
        for article in &news {
            if let Err(err) = self.persist(|| self.gateway.insert_news(article)).await {
                warn!(error = %err, "failed to persist generated news article");
            }
        }

        self.emit_events(tick, &trades, &price_updates, &news, regime, market_open, &margin_calls, &bankruptcies);

        let record = TickEventRecord {
            tick,
            timestamp: chrono::Utc::now().timestamp(),
            trades: trades.clone(),
            news: news.clone(),
            price_updates: price_updates.clone(),
        };
        if let Err(err) = self.persist(|| self.gateway.insert_tick_event(&record)).await {
            warn!(error = %err, "failed to persist tick event record");
        }
        let prune_before = tick.saturating_sub(self.config.tick_event_retention);
        if let Err(err) = self.persist(|| self.gateway.prune_tick_events_before(prune_before)).await {
            warn!(error = %err, "failed to prune retired tick events");
        }

        self.schedule_webhooks(tick, &trades, &margin_calls, &bankruptcies);

        TickOutcome { tick, trades, price_updates, regime, market_open, margin_calls, bankruptcies }
    }

    /// Step 3: debit/credit cash, adjust holdings, apply resting-order fill
    /// deltas, and turn every `Fill` into a persisted `Trade`.
    async fn settle_fills(&self, tick: u64, fills: Vec<PendingFill>) -> Vec<Trade> {
        let mut trades = Vec::new();

        for pending in fills {
            for fill in &pending.fills {
                let (buyer_id, seller_id, buyer_order_id, seller_order_id) = match pending.incoming_side {
                    Side::Buy => (
                        pending.incoming_agent_id.clone(),
                        fill.resting_agent_id.clone(),
                        pending.incoming_order_id.clone(),
                        fill.resting_order_id.clone(),
                    ),
                    Side::Sell => (
                        fill.resting_agent_id.clone(),
                        pending.incoming_agent_id.clone(),
                        fill.resting_order_id.clone(),
                        pending.incoming_order_id.clone(),
                    ),
                };

                let trade = Trade {
                    id: uuid::Uuid::new_v4().to_string(),
                    symbol: pending.symbol.clone(),
                    buyer_id: buyer_id.clone(),
                    seller_id: seller_id.clone(),
                    buyer_order_id,
                    seller_order_id,
                    price: fill.price,
                    quantity: fill.quantity,
                    tick,
                };

                if let Err(err) = self.persist(|| self.gateway.insert_trade(&trade)).await {
                    warn!(error = %err, "failed to persist trade");
                    continue;
                }

                self.settle_side(&buyer_id, &pending.symbol, fill.quantity, fill.price).await;
                self.settle_side(&seller_id, &pending.symbol, -fill.quantity, fill.price).await;

                trades.push(trade);
            }

            for affected in &pending.affected_resting_orders {
                if let Err(err) = self.apply_resting_fill(&affected.order_id, affected.cumulative_filled_quantity).await {
                    warn!(error = %err, order_id = %affected.order_id, "failed to update resting order after fill");
                }
            }
        }

        trades
    }

    /// `signed_quantity`: positive for a buy-side fill, negative for a
    /// sell-side fill (short sales drive the holding negative, matching
    /// `Holding.quantity`'s role as a signed position).
    async fn settle_side(&self, agent_id: &str, symbol: &str, signed_quantity: i64, price: Decimal) {
        let Ok(Some(mut agent)) = self.gateway.get_agent(agent_id) else {
            warn!(agent_id, "settlement referenced an unknown agent");
            return;
        };

        let notional = Decimal::from(signed_quantity) * price;
        agent.cash -= notional;

        let mut holding = self
            .gateway
            .get_holding(agent_id, symbol)
            .ok()
            .flatten()
            .unwrap_or_else(|| Holding {
                agent_id: agent_id.to_string(),
                symbol: symbol.to_string(),
                quantity: 0,
                avg_cost: price,
            });

        let old_quantity = holding.quantity;
        let new_quantity = old_quantity + signed_quantity;

        let same_direction_increase = old_quantity == 0
            || (old_quantity > 0 && signed_quantity > 0)
            || (old_quantity < 0 && signed_quantity < 0);

        if same_direction_increase && new_quantity != 0 {
            let old_notional = Decimal::from(old_quantity.abs()) * holding.avg_cost;
            let added_notional = Decimal::from(signed_quantity.abs()) * price;
            holding.avg_cost = (old_notional + added_notional) / Decimal::from(new_quantity.abs());
        } else if old_quantity.signum() != new_quantity.signum() && new_quantity != 0 {
            // Position flipped through zero (e.g. covering a short into a
            // long); the surviving quantity is a fresh position at this
            // trade's price.
            holding.avg_cost = price;
        }
        holding.quantity = new_quantity;

        if let Err(err) = self.persist(|| self.gateway.upsert_holding(&holding)).await {
            warn!(error = %err, agent_id, symbol, "failed to persist holding");
        }
        if let Err(err) = self.persist(|| self.gateway.update_agent(&agent)).await {
            warn!(error = %err, agent_id, "failed to persist settled cash balance");
        }
    }

    async fn apply_resting_fill(&self, order_id: &str, cumulative_filled_quantity: i64) -> GatewayResult<()> {
        let Some(mut order) = self.gateway.get_order(order_id)? else {
            return Ok(());
        };
        order.filled_quantity = cumulative_filled_quantity;
        order.recompute_status();
        if order.filled_quantity < order.quantity && order.status == crate::domain::OrderStatus::Pending {
            order.status = crate::domain::OrderStatus::Open;
        }
        self.persist(|| self.gateway.update_order(&order)).await
    }

    /// Step 3 continuation: recompute `marginUsed` for every agent holding a
    /// short position, emit MARGIN_CALL / transition to bankrupt.
    async fn recompute_margin_and_solvency(&self) -> (Vec<String>, Vec<String>) {
        let mut margin_calls = Vec::new();
        let mut bankruptcies = Vec::new();

        let Ok(agents) = self.gateway.list_agents() else {
            return (margin_calls, bankruptcies);
        };

        for mut agent in agents {
            if !matches!(agent.status, AgentStatus::Active) {
                continue;
            }

            let Ok(holdings) = self.gateway.list_holdings_for(&agent.id) else { continue };
            let margin_used: Decimal = holdings
                .iter()
                .filter(|h| h.quantity < 0)
                .map(|h| {
                    let price = self
                        .gateway
                        .get_company(&h.symbol)
                        .ok()
                        .flatten()
                        .map(|c| c.current_price)
                        .unwrap_or(h.avg_cost);
                    Decimal::from(h.quantity.unsigned_abs()) * price * self.config.default_margin_requirement
                })
                .sum();

            if margin_used == agent.margin_used {
                continue;
            }
            agent.margin_used = margin_used;

            if margin_used > agent.margin_limit {
                margin_calls.push(agent.id.clone());
            }
            if agent.cash < Decimal::ZERO && margin_used >= agent.margin_limit {
                agent.status = AgentStatus::Bankrupt;
                bankruptcies.push(agent.id.clone());
            }

            if let Err(err) = self.persist(|| self.gateway.update_agent(&agent)).await {
                warn!(error = %err, agent_id = %agent.id, "failed to persist margin recomputation");
            }
        }

        (margin_calls, bankruptcies)
    }

    /// Step 4: recompute `currentPrice`/high/low per symbol, rotate the
    /// day's open/previousClose at trading-day boundaries. The per-symbol
    /// recomputation is independent, so it fans out across `rayon`'s pool
    /// before the (sequential, retried) persistence writes.
    async fn recompute_prices(&self, tick: u64, trades: &[Trade]) -> Vec<PriceUpdate> {
        let Ok(companies) = self.gateway.list_companies() else { return Vec::new() };

        let mut last_trade_price: HashMap<&str, Decimal> = HashMap::new();
        for trade in trades {
            last_trade_price.insert(trade.symbol.as_str(), trade.price);
        }

        let day_boundary = self.config.ticks_per_trading_day > 0
            && tick > 0
            && tick % self.config.ticks_per_trading_day == 0;

        let recomputed: Vec<(Company, Option<PriceUpdate>)> = companies
            .into_par_iter()
            .map(|mut company| {
                let old_price = company.current_price;
                let new_price = last_trade_price
                    .get(company.symbol.as_str())
                    .copied()
                    .unwrap_or_else(|| self.engine.mid_price(&company.symbol, old_price));

                company.observe_price(new_price);
                if day_boundary {
                    company.rotate_day();
                }

                let update = (new_price != old_price).then(|| {
                    let volume: i64 = trades.iter().filter(|t| t.symbol == company.symbol).map(|t| t.quantity).sum();
                    let change = new_price - old_price;
                    let change_percent = if old_price != Decimal::ZERO { change / old_price } else { Decimal::ZERO };
                    PriceUpdate { symbol: company.symbol.clone(), old_price, new_price, change, change_percent, volume }
                });

                (company, update)
            })
            .collect();

        let mut updates = Vec::new();
        for (company, update) in recomputed {
            if let Some(update) = update {
                updates.push(update);
            }
            if let Err(err) = self.persist(|| self.gateway.update_company(&company)).await {
                warn!(error = %err, symbol = %company.symbol, "failed to persist recomputed company price");
            }
        }

        updates
    }

    /// Step 5: decay active market events and run the regime policy over a
    /// rolling window of this tick's aggregate price-change magnitude.
    /// Returns the regime alongside the `marketOpen` flag so callers don't
    /// have to re-derive it from `tick`/config themselves.
    async fn evolve_world_state(&self, tick: u64, price_updates: &[PriceUpdate]) -> (MarketRegime, bool) {
        {
            let mut events = self.active_events.lock();
            for event in events.iter_mut() {
                event.decay();
            }
            events.retain(MarketEvent::is_active);
        }

        let aggregate_change = if price_updates.is_empty() {
            Decimal::ZERO
        } else {
            let sum: Decimal = price_updates.iter().map(|u| u.change_percent).sum();
            sum / Decimal::from(price_updates.len())
        };

        let mut window = self.recent_changes.lock();
        window.push_back(aggregate_change);
        while window.len() as u64 > self.config.regime_window_ticks.max(1) {
            window.pop_front();
        }
        let window_vec: Vec<Decimal> = window.iter().copied().collect();
        drop(window);

        let mut state = self.gateway.get_world_state().unwrap_or_default();
        let regime = self.regime_policy.next(&state, &window_vec);

        state.tick = tick;
        state.regime = regime;
        state.last_tick_at = chrono::Utc::now().timestamp();
        state.market_open = tick % self.config.ticks_per_trading_day.max(1) < self.config.market_close_tick;
        let market_open = state.market_open;
        if let Err(err) = self.persist(|| self.gateway.save_world_state(&state)).await {
            warn!(error = %err, "failed to persist world state");
        }

        (regime, market_open)
    }

    /// Step 6: publish every event type named in spec.md §4.8 for this tick.
    #[allow(clippy::too_many_arguments)]
    fn emit_events(
        &self,
        tick: u64,
        trades: &[Trade],
        price_updates: &[PriceUpdate],
        news: &[NewsArticle],
        regime: MarketRegime,
        market_open: bool,
        margin_calls: &[String],
        bankruptcies: &[String],
    ) {
        if !price_updates.is_empty() {
            self.bus.publish(BusMessage::public(
                "prices",
                EventType::PriceUpdate,
                json!({ "tick": tick, "updates": price_updates }),
            ));
        }

        for trade in trades {
            self.bus.publish(BusMessage::public(
                format!("symbol:{}", trade.symbol),
                EventType::Trade,
                serde_json::to_value(trade).unwrap_or_default(),
            ));
            self.bus
                .publish(BusMessage::private(&trade.buyer_id, EventType::OrderFilled, serde_json::to_value(trade).unwrap_or_default()));
            self.bus
                .publish(BusMessage::private(&trade.seller_id, EventType::OrderFilled, serde_json::to_value(trade).unwrap_or_default()));
        }

        for article in news {
            self.bus.publish(BusMessage::public("news", EventType::News, serde_json::to_value(article).unwrap_or_default()));
        }

        self.bus.publish(BusMessage::public(
            "tick_updates",
            EventType::TickUpdate,
            json!({ "tick": tick, "regime": regime.as_str(), "marketOpen": market_open }),
        ));

        for agent_id in margin_calls {
            self.bus.publish(BusMessage::private(agent_id, EventType::MarginCall, json!({ "tick": tick })));
        }
        for agent_id in bankruptcies {
            self.bus.publish(BusMessage::private(agent_id, EventType::Alert, json!({ "tick": tick, "reason": "bankrupt" })));
        }
    }

    /// Step 8: hand every agent with a registered webhook a delivery task.
    /// Fire-and-forget per spec.md — the tick does not wait on delivery.
    fn schedule_webhooks(&self, tick: u64, trades: &[Trade], margin_calls: &[String], bankruptcies: &[String]) {
        let Ok(agents) = self.gateway.list_agents() else { return };
        let mut notify: HashMap<String, Vec<serde_json::Value>> = HashMap::new();

        for trade in trades {
            for agent_id in [&trade.buyer_id, &trade.seller_id] {
                notify
                    .entry(agent_id.clone())
                    .or_default()
                    .push(json!({ "type": "ORDER_FILLED", "trade": trade }));
            }
        }
        for agent_id in margin_calls {
            notify.entry(agent_id.clone()).or_default().push(json!({ "type": "MARGIN_CALL", "tick": tick }));
        }
        for agent_id in bankruptcies {
            notify.entry(agent_id.clone()).or_default().push(json!({ "type": "ALERT", "tick": tick, "reason": "bankrupt" }));
        }

        for agent in agents {
            let Some(events) = notify.remove(&agent.id) else { continue };
            let Some(url) = agent.webhook_url.clone() else { continue };
            let secret = agent.webhook_secret.clone().unwrap_or_default();
            let webhooks = self.webhooks.clone();
            let gateway = self.gateway.clone();
            let prior_avg = agent.avg_response_time_ms;
            let prior_count = agent.webhook_success_count;
            let agent_id = agent.id.clone();

            tokio::spawn(async move {
                for payload in events {
                    let outcome = webhooks.deliver(&agent_id, &url, &secret, &payload, prior_avg, prior_count).await;
                    if let Ok(Some(mut fresh)) = gateway.get_agent(&agent_id) {
                        if outcome.success {
                            fresh.last_webhook_success_at = Some(chrono::Utc::now().timestamp());
                            fresh.avg_response_time_ms = outcome.response_time_ms;
                            fresh.last_response_time_ms = outcome.response_time_ms;
                            fresh.webhook_success_count += 1;
                            fresh.webhook_failures = 0;
                            fresh.last_webhook_error = None;
                        } else {
                            fresh.webhook_failures += 1;
                            fresh.last_webhook_error = outcome.error.clone();
                        }
                        let _ = gateway.update_agent(&fresh);
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Agent, Company, NullNewsSource, OrderType};
    use crate::matching::Fill;
    use crate::persistence::memory::MemoryGateway;
    use crate::world::DefaultRegimePolicy;
    use rust_decimal_macros::dec;

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            database_url: ":memory:".to_string(),
            jwt_secret: "x".repeat(32),
            api_secret: "x".repeat(32),
            bind_addr: "0.0.0.0:0".to_string(),
            tick_interval_ms: 1000,
            ticks_per_trading_day: 390,
            ticks_after_hours: 60,
            market_open_tick: 0,
            market_close_tick: 390,
            max_order_quantity: 1_000_000,
            min_order_quantity: 1,
            min_price: dec!(0.01),
            max_price: dec!(1000000),
            max_leverage: 10,
            default_margin_requirement: dec!(0.5),
            tick_event_retention: 10_000,
            webhook_concurrency: 4,
            regime_window_ticks: 50,
            starting_cash: dec!(100000),
        })
    }

    fn pipeline() -> (TickPipeline, Arc<MemoryGateway>, PendingFillQueue) {
        let gateway = Arc::new(MemoryGateway::new());
        let engine = MatchingEngine::new();
        engine.initialize(&["AAPL".to_string()]);
        let bus = EventBus::new();
        let pending_fills: PendingFillQueue = Arc::new(Mutex::new(Vec::new()));
        let webhooks = Arc::new(WebhookDispatcher::new(4));
        let pipeline = TickPipeline::new(
            gateway.clone(),
            engine,
            bus,
            pending_fills.clone(),
            Arc::new(DefaultRegimePolicy),
            webhooks,
            Arc::new(NullNewsSource),
            test_config(),
        );
        (pipeline, gateway, pending_fills)
    }

    #[tokio::test]
    async fn settling_a_fill_moves_cash_and_holdings_both_ways() {
        let (pipeline, gateway, pending_fills) = pipeline();

        let buyer = Agent::new("buyer", "Buyer", dec!(100000));
        let seller = Agent::new("seller", "Seller", dec!(100000));
        gateway.create_agent(&buyer).unwrap();
        gateway.create_agent(&seller).unwrap();
        gateway
            .update_company(&Company::new("AAPL", "Apple", "tech", dec!(150), 1_000_000))
            .unwrap();

        let resting_order = crate::domain::Order {
            id: "resting-1".to_string(),
            agent_id: "seller".to_string(),
            symbol: "AAPL".to_string(),
            side: Side::Sell,
            order_type: OrderType::Limit,
            quantity: 10,
            filled_quantity: 0,
            price: Some(dec!(150)),
            status: crate::domain::OrderStatus::Open,
            tick_submitted: 0,
        };
        gateway.insert_order(&resting_order).unwrap();

        pending_fills.lock().push(PendingFill {
            symbol: "AAPL".to_string(),
            incoming_order_id: "taker-1".to_string(),
            incoming_agent_id: "buyer".to_string(),
            incoming_side: Side::Buy,
            fills: vec![Fill {
                price: dec!(150),
                quantity: 10,
                resting_order_id: "resting-1".to_string(),
                resting_agent_id: "seller".to_string(),
            }],
            affected_resting_orders: vec![],
        });

        let outcome = pipeline.run_tick(1).await;
        assert_eq!(outcome.trades.len(), 1);

        let buyer_after = gateway.get_agent("buyer").unwrap().unwrap();
        let seller_after = gateway.get_agent("seller").unwrap().unwrap();
        assert_eq!(buyer_after.cash, dec!(100000) - dec!(1500));
        assert_eq!(seller_after.cash, dec!(100000) + dec!(1500));

        let buyer_holding = gateway.get_holding("buyer", "AAPL").unwrap().unwrap();
        assert_eq!(buyer_holding.quantity, 10);
        let seller_holding = gateway.get_holding("seller", "AAPL").unwrap().unwrap();
        assert_eq!(seller_holding.quantity, -10);
    }

    #[tokio::test]
    async fn short_position_accrues_margin_and_can_trigger_a_margin_call() {
        let (pipeline, gateway, pending_fills) = pipeline();

        let mut shorter = Agent::new("shorter", "Shorter", dec!(1000));
        shorter.margin_limit = dec!(100);
        gateway.create_agent(&shorter).unwrap();
        let buyer = Agent::new("buyer", "Buyer", dec!(100000));
        gateway.create_agent(&buyer).unwrap();
        gateway
            .update_company(&Company::new("AAPL", "Apple", "tech", dec!(150), 1_000_000))
            .unwrap();

        pending_fills.lock().push(PendingFill {
            symbol: "AAPL".to_string(),
            incoming_order_id: "short-1".to_string(),
            incoming_agent_id: "shorter".to_string(),
            incoming_side: Side::Sell,
            fills: vec![Fill {
                price: dec!(150),
                quantity: 10,
                resting_order_id: "resting-1".to_string(),
                resting_agent_id: "buyer".to_string(),
            }],
            affected_resting_orders: vec![],
        });

        let outcome = pipeline.run_tick(1).await;
        assert_eq!(outcome.margin_calls, vec!["shorter".to_string()]);

        let shorter_after = gateway.get_agent("shorter").unwrap().unwrap();
        assert_eq!(shorter_after.margin_used, dec!(750));
    }

    #[tokio::test]
    async fn tick_with_no_fills_still_persists_a_tick_event_record() {
        let (pipeline, gateway, _pending_fills) = pipeline();
        let outcome = pipeline.run_tick(5).await;
        assert!(outcome.trades.is_empty());

        let records = gateway.get_tick_events_since(4).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tick, 5);
    }
}
