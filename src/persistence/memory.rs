//! In-memory fake gateway, used by unit and integration tests so the rest
//! of the codebase never mocks `PersistenceGateway` ad hoc (spec.md §9).

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::domain::{
    Agent, Alliance, Company, Holding, Investigation, Message, NewsArticle, Order, Trade,
    TickEventRecord, WorldState,
};

use super::{ActionLogEntry, GatewayError, GatewayResult, PersistenceGateway};

#[derive(Default)]
struct Inner {
    agents: HashMap<String, Agent>,
    orders: HashMap<String, Order>,
    trades: Vec<Trade>,
    companies: HashMap<String, Company>,
    holdings: HashMap<(String, String), Holding>,
    news: Vec<NewsArticle>,
    messages: Vec<Message>,
    alliances: HashMap<String, Alliance>,
    investigations: HashMap<String, Investigation>,
    actions: Vec<ActionLogEntry>,
    tick_events: Vec<TickEventRecord>,
    world_state: WorldState,
}

pub struct MemoryGateway {
    inner: Mutex<Inner>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-only introspection into the audit log; production code never
    /// reads actions back out, it only writes via `log_action`.
    pub fn action_log_len(&self) -> usize {
        self.inner.lock().actions.len()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn create_agent(&self, agent: &Agent) -> GatewayResult<()> {
        self.inner.lock().agents.insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    fn get_agent(&self, id: &str) -> GatewayResult<Option<Agent>> {
        Ok(self.inner.lock().agents.get(id).cloned())
    }

    fn update_agent(&self, agent: &Agent) -> GatewayResult<()> {
        self.inner.lock().agents.insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    fn list_agents(&self) -> GatewayResult<Vec<Agent>> {
        Ok(self.inner.lock().agents.values().cloned().collect())
    }

    fn insert_order(&self, order: &Order) -> GatewayResult<()> {
        self.inner.lock().orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    fn update_order(&self, order: &Order) -> GatewayResult<()> {
        self.inner.lock().orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    fn get_order(&self, id: &str) -> GatewayResult<Option<Order>> {
        Ok(self.inner.lock().orders.get(id).cloned())
    }

    fn list_open_orders(&self, symbol: &str) -> GatewayResult<Vec<Order>> {
        Ok(self
            .inner
            .lock()
            .orders
            .values()
            .filter(|o| o.symbol == symbol && o.status.is_cancellable())
            .cloned()
            .collect())
    }

    fn list_open_orders_for_agent(&self, agent_id: &str) -> GatewayResult<Vec<Order>> {
        Ok(self
            .inner
            .lock()
            .orders
            .values()
            .filter(|o| o.agent_id == agent_id && o.status.is_cancellable())
            .cloned()
            .collect())
    }

    fn insert_trade(&self, trade: &Trade) -> GatewayResult<()> {
        self.inner.lock().trades.push(trade.clone());
        Ok(())
    }

    fn list_trades(&self, symbol: &str, limit: usize) -> GatewayResult<Vec<Trade>> {
        let inner = self.inner.lock();
        let mut out: Vec<Trade> = inner.trades.iter().filter(|t| t.symbol == symbol).cloned().collect();
        out.reverse();
        out.truncate(limit);
        Ok(out)
    }

    fn get_company(&self, symbol: &str) -> GatewayResult<Option<Company>> {
        Ok(self.inner.lock().companies.get(symbol).cloned())
    }

    fn list_companies(&self) -> GatewayResult<Vec<Company>> {
        Ok(self.inner.lock().companies.values().cloned().collect())
    }

    fn update_company(&self, company: &Company) -> GatewayResult<()> {
        self.inner.lock().companies.insert(company.symbol.clone(), company.clone());
        Ok(())
    }

    fn upsert_holding(&self, holding: &Holding) -> GatewayResult<()> {
        self.inner
            .lock()
            .holdings
            .insert((holding.agent_id.clone(), holding.symbol.clone()), holding.clone());
        Ok(())
    }

    fn get_holding(&self, agent_id: &str, symbol: &str) -> GatewayResult<Option<Holding>> {
        Ok(self
            .inner
            .lock()
            .holdings
            .get(&(agent_id.to_string(), symbol.to_string()))
            .cloned())
    }

    fn list_holdings_for(&self, agent_id: &str) -> GatewayResult<Vec<Holding>> {
        Ok(self
            .inner
            .lock()
            .holdings
            .values()
            .filter(|h| h.agent_id == agent_id)
            .cloned()
            .collect())
    }

    fn insert_news(&self, article: &NewsArticle) -> GatewayResult<()> {
        self.inner.lock().news.push(article.clone());
        Ok(())
    }

    fn list_news(&self, limit: usize) -> GatewayResult<Vec<NewsArticle>> {
        let inner = self.inner.lock();
        let mut out = inner.news.clone();
        out.reverse();
        out.truncate(limit);
        Ok(out)
    }

    fn insert_message(&self, message: &Message) -> GatewayResult<()> {
        self.inner.lock().messages.push(message.clone());
        Ok(())
    }

    fn list_messages_for(&self, agent_id: &str) -> GatewayResult<Vec<Message>> {
        Ok(self
            .inner
            .lock()
            .messages
            .iter()
            .filter(|m| m.recipient_id.as_deref() == Some(agent_id) || m.recipient_id.is_none())
            .cloned()
            .collect())
    }

    fn find_alliance_proposal(&self, alliance_id: &str, recipient_id: &str) -> GatewayResult<Option<Message>> {
        Ok(self
            .inner
            .lock()
            .messages
            .iter()
            .find(|m| {
                m.channel == "alliance"
                    && m.recipient_id.as_deref() == Some(recipient_id)
                    && m.subject.as_deref().map(|s| s.contains(alliance_id)).unwrap_or(false)
            })
            .cloned())
    }

    fn insert_alliance(&self, alliance: &Alliance) -> GatewayResult<()> {
        self.inner.lock().alliances.insert(alliance.id.clone(), alliance.clone());
        Ok(())
    }

    fn get_alliance(&self, id: &str) -> GatewayResult<Option<Alliance>> {
        Ok(self.inner.lock().alliances.get(id).cloned())
    }

    fn update_alliance(&self, alliance: &Alliance) -> GatewayResult<()> {
        self.inner.lock().alliances.insert(alliance.id.clone(), alliance.clone());
        Ok(())
    }

    fn insert_investigation(&self, investigation: &Investigation) -> GatewayResult<()> {
        self.inner
            .lock()
            .investigations
            .insert(investigation.id.clone(), investigation.clone());
        Ok(())
    }

    fn get_open_investigation_for(&self, agent_id: &str) -> GatewayResult<Option<Investigation>> {
        Ok(self
            .inner
            .lock()
            .investigations
            .values()
            .find(|i| {
                i.target_agent_id == agent_id
                    && matches!(
                        i.status,
                        crate::domain::InvestigationStatus::Open | crate::domain::InvestigationStatus::Charged
                    )
            })
            .cloned())
    }

    fn update_investigation(&self, investigation: &Investigation) -> GatewayResult<()> {
        self.inner
            .lock()
            .investigations
            .insert(investigation.id.clone(), investigation.clone());
        Ok(())
    }

    fn list_most_wanted(&self, limit: usize) -> GatewayResult<Vec<Investigation>> {
        let inner = self.inner.lock();
        let mut out: Vec<Investigation> = inner
            .investigations
            .values()
            .filter(|i| matches!(i.status, crate::domain::InvestigationStatus::Open | crate::domain::InvestigationStatus::Charged))
            .cloned()
            .collect();
        out.sort_by_key(|i| std::cmp::Reverse(i.tick_opened));
        out.truncate(limit);
        Ok(out)
    }

    fn list_imprisoned(&self, limit: usize) -> GatewayResult<Vec<Agent>> {
        let inner = self.inner.lock();
        let mut out: Vec<Agent> = inner
            .agents
            .values()
            .filter(|a| a.status == crate::domain::AgentStatus::Imprisoned)
            .cloned()
            .collect();
        out.truncate(limit);
        Ok(out)
    }

    fn log_action(&self, entry: &ActionLogEntry) -> GatewayResult<()> {
        self.inner.lock().actions.push(entry.clone());
        Ok(())
    }

    fn insert_tick_event(&self, record: &TickEventRecord) -> GatewayResult<()> {
        self.inner.lock().tick_events.push(record.clone());
        Ok(())
    }

    fn get_tick_events_since(&self, tick: u64) -> GatewayResult<Vec<TickEventRecord>> {
        Ok(self
            .inner
            .lock()
            .tick_events
            .iter()
            .filter(|r| r.tick > tick)
            .cloned()
            .collect())
    }

    fn prune_tick_events_before(&self, tick: u64) -> GatewayResult<()> {
        self.inner.lock().tick_events.retain(|r| r.tick >= tick);
        Ok(())
    }

    fn oldest_retained_tick(&self) -> GatewayResult<Option<u64>> {
        Ok(self.inner.lock().tick_events.iter().map(|r| r.tick).min())
    }

    fn get_world_state(&self) -> GatewayResult<WorldState> {
        Ok(self.inner.lock().world_state.clone())
    }

    fn save_world_state(&self, state: &WorldState) -> GatewayResult<()> {
        self.inner.lock().world_state = state.clone();
        Ok(())
    }
}
