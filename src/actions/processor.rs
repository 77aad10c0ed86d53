//! Single dispatch point for every agent `Action` (spec.md §4.6): one
//! `process` entry point, one exhaustive match over the tagged sum, one
//! audit write path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use crate::domain::{
    Action, ActionResult, Agent, Alliance, AllianceStatus, CrimeType, Investigation,
    InvestigationStatus, Message, NewsArticle, Order, OrderStatus, OrderType, Side,
};
use crate::matching::{AffectedOrder, Fill, MatchingEngine};
use crate::persistence::{ActionLogEntry, GatewayResult, PersistenceGateway};

/// A matching result produced synchronously at submission time, queued for
/// the tick pipeline to settle (spec.md §4.6: "margin, cash checks, and
/// settlement happen in the tick pipeline post-match, not in the
/// processor").
#[derive(Debug, Clone)]
pub struct PendingFill {
    pub symbol: String,
    pub incoming_order_id: String,
    pub incoming_agent_id: String,
    pub incoming_side: Side,
    pub fills: Vec<Fill>,
    pub affected_resting_orders: Vec<AffectedOrder>,
}

/// Shared between the action processor (producer, one push per matched
/// order) and the tick pipeline (consumer, drained once per tick).
pub type PendingFillQueue = Arc<Mutex<Vec<PendingFill>>>;

/// Flat cash cost debited on FLEE; not named by a specific constant in the
/// interface contract, so kept here as the one place to tune it.
const FLIGHT_COST: Decimal = dec!(5000);

/// Probability that a BRIBE opens an investigation against the briber
/// (spec.md §4.6: "policy implementation-defined... not part of the
/// contract boundary").
const BRIBE_INVESTIGATION_PROBABILITY: f64 = 0.15;

const WHISTLEBLOW_REPUTATION_BONUS: i64 = 10;
const RUMOR_REPUTATION_COST: i64 = 5;
const MIN_REPUTATION_FOR_RUMOR: i64 = 5;

pub struct ActionContext {
    pub agent_id: String,
    pub agent: Agent,
    pub tick: u64,
}

/// Owns the gateway and matching engine handles needed to execute every
/// action type, plus the queue fills are staged on for the tick pipeline.
pub struct ActionProcessor {
    gateway: Arc<dyn PersistenceGateway>,
    engine: MatchingEngine,
    pending_fills: PendingFillQueue,
    agent_locks: RwLock<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ActionProcessor {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, engine: MatchingEngine, pending_fills: PendingFillQueue) -> Self {
        Self { gateway, engine, pending_fills, agent_locks: RwLock::new(HashMap::new()) }
    }

    /// Action ingress for one agent is serialized end to end (spec.md §5):
    /// callers hold this for the duration of a request's action batch and
    /// release it before any fanout (webhook delivery, event publication)
    /// that happens later in the tick pipeline.
    pub fn agent_lock(&self, agent_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        if let Some(lock) = self.agent_locks.read().get(agent_id) {
            return lock.clone();
        }
        self.agent_locks
            .write()
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Dispatches `action`, always logging the outcome (success or failure)
    /// as the sole write path into the Action audit table.
    pub fn process(&self, ctx: &ActionContext, action: Action) -> ActionResult {
        let payload = serde_json::to_value(&action).unwrap_or(serde_json::Value::Null);
        let type_name = action.type_name();
        let target_symbol = action.target_symbol().map(|s| s.to_string());
        let target_agent_id = action.target_agent_id().map(|s| s.to_string());

        let result = match action {
            Action::Buy { symbol, quantity, order_type, price } => {
                self.handle_order(ctx, &symbol, Side::Buy, quantity, order_type, price, "BUY")
            }
            Action::Sell { symbol, quantity, order_type, price } => {
                self.handle_order(ctx, &symbol, Side::Sell, quantity, order_type, price, "SELL")
            }
            Action::Short { symbol, quantity, order_type, price } => {
                self.handle_order(ctx, &symbol, Side::Sell, quantity, order_type, price, "SHORT")
            }
            Action::Cover { symbol, quantity, order_type, price } => {
                self.handle_order(ctx, &symbol, Side::Buy, quantity, order_type, price, "COVER")
            }
            Action::CancelOrder { order_id } => self.handle_cancel_order(ctx, &order_id),
            Action::Rumor { target_symbol, content } => self.handle_rumor(ctx, &target_symbol, &content),
            Action::Message { recipient_id, content } => self.handle_message(ctx, &recipient_id, &content),
            Action::Ally { target_agent_id } => self.handle_ally(ctx, &target_agent_id),
            Action::AllyAccept { alliance_id } => self.handle_ally_accept(ctx, &alliance_id),
            Action::AllyReject { alliance_id, reason } => self.handle_ally_reject(ctx, &alliance_id, reason),
            Action::AllyDissolve { alliance_id } => self.handle_ally_dissolve(ctx, &alliance_id),
            Action::Bribe { target_agent_id, amount } => self.handle_bribe(ctx, &target_agent_id, amount),
            Action::Whistleblow { target_agent_id, crime_type, evidence } => {
                self.handle_whistleblow(ctx, &target_agent_id, crime_type, &evidence)
            }
            Action::Flee { destination } => self.handle_flee(ctx, &destination),
        };

        let result = result.unwrap_or_else(|err| ActionResult::fail(type_name, format!("internal error: {err}")));

        let log_entry = ActionLogEntry {
            tick: ctx.tick,
            agent_id: ctx.agent_id.clone(),
            action_type: type_name.to_string(),
            target_symbol,
            target_agent_id,
            payload,
            result: serde_json::to_value(&result).unwrap_or(serde_json::Value::Null),
        };
        if let Err(err) = self.gateway.log_action(&log_entry) {
            tracing::warn!(error = %err, "failed to persist action audit row");
        }

        result
    }

    fn handle_order(
        &self,
        ctx: &ActionContext,
        symbol: &str,
        side: Side,
        quantity: i64,
        order_type: OrderType,
        price: Option<Decimal>,
        label: &str,
    ) -> GatewayResult<ActionResult> {
        if quantity < 1 {
            return Ok(ActionResult::fail(label, "Invalid quantity"));
        }
        if !ctx.agent.status.can_trade() {
            return Ok(ActionResult::fail(label, format!("Agent is {}", ctx.agent.status.as_str())));
        }
        if order_type == OrderType::Limit && price.is_none() {
            return Ok(ActionResult::fail(label, "LIMIT orders require a price"));
        }

        let mut order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: ctx.agent_id.clone(),
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            filled_quantity: 0,
            price,
            status: OrderStatus::Pending,
            tick_submitted: ctx.tick,
        };

        if order_type == OrderType::Stop {
            self.engine.queue_stop(&order);
        } else {
            match self.engine.submit_order(&order) {
                Ok(outcome) => {
                    order.filled_quantity = order.quantity - outcome.remaining_quantity;
                    order.recompute_status();
                    if order.status == OrderStatus::Pending
                        && outcome.remaining_quantity > 0
                        && order_type == OrderType::Limit
                    {
                        // Rests on the book rather than sitting pending forever.
                        order.status = OrderStatus::Open;
                    }
                    if !outcome.fills.is_empty() {
                        self.pending_fills.lock().push(PendingFill {
                            symbol: symbol.to_string(),
                            incoming_order_id: order.id.clone(),
                            incoming_agent_id: ctx.agent_id.clone(),
                            incoming_side: side,
                            fills: outcome.fills,
                            affected_resting_orders: outcome.affected_resting_orders,
                        });
                    }
                }
                Err(err) => return Ok(ActionResult::fail(label, err.to_string())),
            }
        }
        self.gateway.insert_order(&order)?;

        Ok(ActionResult::ok(label, json!({ "orderId": order.id, "filledQuantity": order.filled_quantity })))
    }

    fn handle_cancel_order(&self, ctx: &ActionContext, order_id: &str) -> GatewayResult<ActionResult> {
        let label = "CANCEL_ORDER";
        let Some(mut order) = self.gateway.get_order(order_id)? else {
            return Ok(ActionResult::fail(label, "Order not found"));
        };
        if order.agent_id != ctx.agent_id {
            return Ok(ActionResult::fail(label, "Not your order"));
        }
        if !order.status.is_cancellable() {
            return Ok(ActionResult::fail(label, "Order cannot be cancelled"));
        }

        self.engine.cancel_order(&order.symbol, order_id);
        order.status = OrderStatus::Cancelled;
        self.gateway.update_order(&order)?;

        Ok(ActionResult::ok(label, json!({ "orderId": order_id })))
    }

    fn handle_rumor(&self, ctx: &ActionContext, target_symbol: &str, content: &str) -> GatewayResult<ActionResult> {
        let label = "RUMOR";
        if ctx.agent.reputation < MIN_REPUTATION_FOR_RUMOR {
            return Ok(ActionResult::fail(label, "Insufficient reputation"));
        }

        let mut agent = ctx.agent.clone();
        agent.reputation -= RUMOR_REPUTATION_COST;
        self.gateway.update_agent(&agent)?;

        let headline = format!("RUMOR: {}", truncate(content, 100));
        let article = NewsArticle {
            id: uuid::Uuid::new_v4().to_string(),
            tick: ctx.tick,
            headline,
            content: content.to_string(),
            category: "rumor".to_string(),
            sentiment: 0.0,
            symbols: vec![target_symbol.to_string()],
            agent_ids: vec![ctx.agent_id.clone()],
            is_breaking: false,
        };
        self.gateway.insert_news(&article)?;

        Ok(ActionResult::ok(label, json!({ "newsId": article.id })))
    }

    fn handle_message(&self, ctx: &ActionContext, recipient_id: &str, content: &str) -> GatewayResult<ActionResult> {
        let label = "MESSAGE";
        if self.gateway.get_agent(recipient_id)?.is_none() {
            return Ok(ActionResult::fail(label, "Recipient not found"));
        }

        let message = Message::direct(ctx.tick, ctx.agent_id.clone(), recipient_id, content);
        self.gateway.insert_message(&message)?;

        Ok(ActionResult::ok(label, json!({ "messageId": message.id })))
    }

    fn handle_ally(&self, ctx: &ActionContext, target_agent_id: &str) -> GatewayResult<ActionResult> {
        let label = "ALLY";
        let Some(target) = self.gateway.get_agent(target_agent_id)? else {
            return Ok(ActionResult::fail(label, "Target agent not found"));
        };
        if !target.status.can_trade() {
            return Ok(ActionResult::fail(label, "Target agent is not active"));
        }

        let alliance = Alliance {
            id: uuid::Uuid::new_v4().to_string(),
            proposer_id: ctx.agent_id.clone(),
            partner_id: target_agent_id.to_string(),
            status: AllianceStatus::Pending,
            dissolution_reason: None,
        };
        self.gateway.insert_alliance(&alliance)?;

        let subject = format!("Alliance Proposal ({})", alliance.id);
        let proposal = Message::alliance(ctx.tick, ctx.agent_id.clone(), target_agent_id, subject, "");
        self.gateway.insert_message(&proposal)?;

        Ok(ActionResult::ok(label, json!({ "allianceId": alliance.id })))
    }

    fn handle_ally_accept(&self, ctx: &ActionContext, alliance_id: &str) -> GatewayResult<ActionResult> {
        let label = "ALLY_ACCEPT";
        let Some(mut alliance) = self.gateway.get_alliance(alliance_id)? else {
            return Ok(ActionResult::fail(label, "Alliance not found"));
        };
        if alliance.status != AllianceStatus::Pending {
            return Ok(ActionResult::fail(label, "Alliance is not pending"));
        }
        if self
            .gateway
            .find_alliance_proposal(alliance_id, &ctx.agent_id)?
            .is_none()
        {
            return Ok(ActionResult::fail(label, "Alliance proposal not found"));
        }

        alliance.status = AllianceStatus::Active;
        self.gateway.update_alliance(&alliance)?;

        let confirmation = Message::alliance(
            ctx.tick,
            ctx.agent_id.clone(),
            alliance.proposer_id.clone(),
            format!("Alliance Proposal ({alliance_id})"),
            "accepted",
        );
        self.gateway.insert_message(&confirmation)?;

        Ok(ActionResult::ok(
            label,
            json!({ "allianceId": alliance_id, "partnerId": alliance.proposer_id }),
        ))
    }

    fn handle_ally_reject(
        &self,
        ctx: &ActionContext,
        alliance_id: &str,
        reason: Option<String>,
    ) -> GatewayResult<ActionResult> {
        let label = "ALLY_REJECT";
        let Some(mut alliance) = self.gateway.get_alliance(alliance_id)? else {
            return Ok(ActionResult::fail(label, "Alliance not found"));
        };
        if alliance.status != AllianceStatus::Pending {
            return Ok(ActionResult::fail(label, "Alliance is not pending"));
        }
        if self
            .gateway
            .find_alliance_proposal(alliance_id, &ctx.agent_id)?
            .is_none()
        {
            return Ok(ActionResult::fail(label, "Alliance proposal not found"));
        }

        alliance.status = AllianceStatus::Dissolved;
        alliance.dissolution_reason = Some(reason.unwrap_or_else(|| "Proposal rejected".to_string()));
        self.gateway.update_alliance(&alliance)?;

        let notice = Message::alliance(
            ctx.tick,
            ctx.agent_id.clone(),
            alliance.proposer_id.clone(),
            format!("Alliance Proposal ({alliance_id})"),
            "rejected",
        );
        self.gateway.insert_message(&notice)?;

        Ok(ActionResult::ok(
            label,
            json!({ "allianceId": alliance_id, "proposerId": alliance.proposer_id }),
        ))
    }

    fn handle_ally_dissolve(&self, ctx: &ActionContext, alliance_id: &str) -> GatewayResult<ActionResult> {
        let label = "ALLY_DISSOLVE";
        let Some(mut alliance) = self.gateway.get_alliance(alliance_id)? else {
            return Ok(ActionResult::fail(label, "Alliance not found"));
        };
        if alliance.status != AllianceStatus::Active {
            return Ok(ActionResult::fail(label, "Alliance is not active"));
        }
        if alliance.proposer_id != ctx.agent_id && alliance.partner_id != ctx.agent_id {
            return Ok(ActionResult::fail(label, "Not a party to this alliance"));
        }

        alliance.status = AllianceStatus::Dissolved;
        alliance.dissolution_reason = Some("Dissolved by member".to_string());
        self.gateway.update_alliance(&alliance)?;

        Ok(ActionResult::ok(label, json!({ "allianceId": alliance_id })))
    }

    fn handle_bribe(&self, ctx: &ActionContext, target_agent_id: &str, amount: Decimal) -> GatewayResult<ActionResult> {
        let label = "BRIBE";
        if ctx.agent.cash < amount {
            return Ok(ActionResult::fail(label, "Insufficient funds"));
        }
        let Some(mut target) = self.gateway.get_agent(target_agent_id)? else {
            return Ok(ActionResult::fail(label, "Target agent not found"));
        };

        let mut briber = ctx.agent.clone();
        briber.cash -= amount;
        target.cash += amount;
        self.gateway.update_agent(&briber)?;
        self.gateway.update_agent(&target)?;

        if rand::thread_rng().gen_bool(BRIBE_INVESTIGATION_PROBABILITY) {
            let investigation = Investigation {
                id: uuid::Uuid::new_v4().to_string(),
                target_agent_id: ctx.agent_id.clone(),
                crime_type: CrimeType::Bribery,
                status: InvestigationStatus::Open,
                tick_opened: ctx.tick,
                tick_charged: None,
                fine_amount: None,
                sentence_years: None,
                imprisoned_until_tick: None,
            };
            self.gateway.insert_investigation(&investigation)?;
        }

        Ok(ActionResult::ok(label, json!({ "amount": amount.to_string() })))
    }

    fn handle_whistleblow(
        &self,
        ctx: &ActionContext,
        target_agent_id: &str,
        crime_type: CrimeType,
        evidence: &str,
    ) -> GatewayResult<ActionResult> {
        let label = "WHISTLEBLOW";
        if evidence.trim().is_empty() {
            return Ok(ActionResult::fail(label, "Evidence is required"));
        }
        if self.gateway.get_agent(target_agent_id)?.is_none() {
            return Ok(ActionResult::fail(label, "Target agent not found"));
        }

        let investigation = Investigation {
            id: uuid::Uuid::new_v4().to_string(),
            target_agent_id: target_agent_id.to_string(),
            crime_type,
            status: InvestigationStatus::Open,
            tick_opened: ctx.tick,
            tick_charged: None,
            fine_amount: None,
            sentence_years: None,
            imprisoned_until_tick: None,
        };
        self.gateway.insert_investigation(&investigation)?;

        let mut agent = ctx.agent.clone();
        agent.reputation += WHISTLEBLOW_REPUTATION_BONUS;
        self.gateway.update_agent(&agent)?;

        Ok(ActionResult::ok(label, json!({ "investigationId": investigation.id })))
    }

    fn handle_flee(&self, ctx: &ActionContext, destination: &str) -> GatewayResult<ActionResult> {
        let label = "FLEE";
        if self.gateway.get_open_investigation_for(&ctx.agent_id)?.is_none() {
            return Ok(ActionResult::fail(label, "No reason to flee"));
        }

        let mut agent = ctx.agent.clone();
        agent.cash -= FLIGHT_COST;
        agent.status = crate::domain::AgentStatus::Fled;
        self.gateway.update_agent(&agent)?;

        Ok(ActionResult::ok(label, json!({ "destination": destination })))
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentStatus;
    use crate::persistence::memory::MemoryGateway;
    use rust_decimal_macros::dec;

    fn processor() -> (ActionProcessor, Arc<MemoryGateway>, MatchingEngine) {
        let gateway = Arc::new(MemoryGateway::new());
        let engine = MatchingEngine::new();
        engine.initialize(&["AAPL".to_string()]);
        let pending_fills: PendingFillQueue = Arc::new(Mutex::new(Vec::new()));
        (ActionProcessor::new(gateway.clone(), engine.clone(), pending_fills), gateway, engine)
    }

    fn ctx(agent: Agent) -> ActionContext {
        ActionContext { agent_id: agent.id.clone(), agent, tick: 1 }
    }

    #[test]
    fn buy_market_creates_pending_order() {
        let (processor, gateway, _engine) = processor();
        let agent = Agent::new("a1", "Trader", dec!(100000));
        gateway.create_agent(&agent).unwrap();

        let result = processor.process(
            &ctx(agent),
            Action::Buy { symbol: "AAPL".to_string(), quantity: 10, order_type: OrderType::Market, price: None },
        );
        assert!(result.success);
        assert!(gateway.get_order(result.data.unwrap()["orderId"].as_str().unwrap()).unwrap().is_some());
    }

    #[test]
    fn bankrupt_agent_cannot_trade() {
        let (processor, gateway, _engine) = processor();
        let mut agent = Agent::new("a1", "Trader", dec!(100000));
        agent.status = AgentStatus::Bankrupt;
        gateway.create_agent(&agent).unwrap();

        let result = processor.process(
            &ctx(agent),
            Action::Buy { symbol: "AAPL".to_string(), quantity: 10, order_type: OrderType::Market, price: None },
        );
        assert!(!result.success);
        assert!(result.message.contains("bankrupt"));
    }

    #[test]
    fn limit_order_without_price_is_rejected() {
        let (processor, gateway, _engine) = processor();
        let agent = Agent::new("a1", "Trader", dec!(100000));
        gateway.create_agent(&agent).unwrap();

        let result = processor.process(
            &ctx(agent),
            Action::Buy { symbol: "AAPL".to_string(), quantity: 10, order_type: OrderType::Limit, price: None },
        );
        assert!(!result.success);
        assert_eq!(result.message, "LIMIT orders require a price");
    }

    #[test]
    fn cancel_order_ownership_is_enforced() {
        let (processor, gateway, _engine) = processor();
        let agent_a = Agent::new("a1", "A", dec!(100000));
        let agent_b = Agent::new("a2", "B", dec!(100000));
        gateway.create_agent(&agent_a).unwrap();
        gateway.create_agent(&agent_b).unwrap();

        let buy = processor.process(
            &ctx(agent_a.clone()),
            Action::Buy { symbol: "AAPL".to_string(), quantity: 10, order_type: OrderType::Limit, price: Some(dec!(150)) },
        );
        let order_id = buy.data.unwrap()["orderId"].as_str().unwrap().to_string();

        let result = processor.process(&ctx(agent_b), Action::CancelOrder { order_id });
        assert!(!result.success);
        assert_eq!(result.message, "Not your order");
    }

    #[test]
    fn rumor_below_reputation_floor_is_rejected() {
        let (processor, gateway, _engine) = processor();
        let mut agent = Agent::new("a1", "Trader", dec!(100000));
        agent.reputation = 3;
        gateway.create_agent(&agent).unwrap();

        let result = processor.process(
            &ctx(agent),
            Action::Rumor { target_symbol: "AAPL".to_string(), content: "flying car".to_string() },
        );
        assert!(!result.success);
        assert_eq!(result.message, "Insufficient reputation");
    }

    #[test]
    fn rumor_deducts_exactly_five_reputation() {
        let (processor, gateway, _engine) = processor();
        let agent = Agent::new("a1", "Trader", dec!(100000));
        gateway.create_agent(&agent).unwrap();

        let result = processor.process(
            &ctx(agent),
            Action::Rumor { target_symbol: "AAPL".to_string(), content: "flying car".to_string() },
        );
        assert!(result.success);
        let updated = gateway.get_agent("a1").unwrap().unwrap();
        assert_eq!(updated.reputation, 45);
    }

    #[test]
    fn flee_requires_open_investigation() {
        let (processor, gateway, _engine) = processor();
        let agent = Agent::new("a1", "Trader", dec!(100000));
        gateway.create_agent(&agent).unwrap();

        let result = processor.process(&ctx(agent), Action::Flee { destination: "Monaco".to_string() });
        assert!(!result.success);
        assert_eq!(result.message, "No reason to flee");
    }

    #[test]
    fn unknown_recipient_message_is_rejected() {
        let (processor, gateway, _engine) = processor();
        let agent = Agent::new("a1", "Trader", dec!(100000));
        gateway.create_agent(&agent).unwrap();

        let result = processor.process(
            &ctx(agent),
            Action::Message { recipient_id: "ghost".to_string(), content: "hi".to_string() },
        );
        assert!(!result.success);
        assert_eq!(result.message, "Recipient not found");
    }

    #[test]
    fn crossing_order_fills_synchronously_and_queues_settlement() {
        let gateway = Arc::new(MemoryGateway::new());
        let engine = MatchingEngine::new();
        engine.initialize(&["AAPL".to_string()]);
        let pending_fills: PendingFillQueue = Arc::new(Mutex::new(Vec::new()));
        let processor = ActionProcessor::new(gateway.clone(), engine.clone(), pending_fills.clone());

        let seller = Agent::new("seller", "Seller", dec!(100000));
        let buyer = Agent::new("buyer", "Buyer", dec!(100000));
        gateway.create_agent(&seller).unwrap();
        gateway.create_agent(&buyer).unwrap();

        let sell = processor.process(
            &ctx(seller),
            Action::Sell { symbol: "AAPL".to_string(), quantity: 10, order_type: OrderType::Limit, price: Some(dec!(150)) },
        );
        assert!(sell.success);
        let sell_order_id = sell.data.unwrap()["orderId"].as_str().unwrap().to_string();
        let resting = gateway.get_order(&sell_order_id).unwrap().unwrap();
        assert_eq!(resting.status, OrderStatus::Open);
        assert_eq!(resting.filled_quantity, 0);

        let buy = processor.process(
            &ctx(buyer),
            Action::Buy { symbol: "AAPL".to_string(), quantity: 10, order_type: OrderType::Market, price: None },
        );
        assert!(buy.success);
        let buy_order_id = buy.data.unwrap()["orderId"].as_str().unwrap().to_string();
        let filled = gateway.get_order(&buy_order_id).unwrap().unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        assert_eq!(filled.filled_quantity, 10);

        // The incoming order's fills were queued; the resting sell order's
        // persisted copy still shows its pre-match state until the tick
        // pipeline settles it and calls update_order.
        let queued = pending_fills.lock();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].fills.len(), 1);
        assert_eq!(queued[0].fills[0].quantity, 10);
    }

    #[test]
    fn every_action_is_logged_regardless_of_outcome() {
        let (processor, gateway, _engine) = processor();
        let agent = Agent::new("a1", "Trader", dec!(100000));
        gateway.create_agent(&agent).unwrap();

        processor.process(&ctx(agent), Action::Flee { destination: "Monaco".to_string() });
        assert_eq!(gateway.action_log_len(), 1);
    }
}
