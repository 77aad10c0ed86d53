//! Persistence gateway (C4): transactional access to every durable entity.
//!
//! spec.md §9 calls the source's mock-heavy DB access out for redesign:
//! "reimplement behind an interface exposing only the transactions in §6;
//! supply an in-memory fake for tests." `PersistenceGateway` is that
//! interface; `sqlite::SqliteGateway` and `memory::MemoryGateway` are its two
//! implementations.

pub mod memory;
pub mod sqlite;

use crate::domain::{
    Agent, Alliance, Company, Holding, Investigation, Message, NewsArticle, Order, Trade,
    TickEventRecord, WorldState,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// A logged record of one action-processor invocation (spec.md §4.6 logAction).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ActionLogEntry {
    pub tick: u64,
    pub agent_id: String,
    pub action_type: String,
    pub target_symbol: Option<String>,
    pub target_agent_id: Option<String>,
    pub payload: serde_json::Value,
    pub result: serde_json::Value,
}

/// The full set of transactions the core needs against durable state
/// (spec.md §6 persistence schema; enumerated per-entity in SPEC_FULL.md §4).
pub trait PersistenceGateway: Send + Sync {
    fn create_agent(&self, agent: &Agent) -> GatewayResult<()>;
    fn get_agent(&self, id: &str) -> GatewayResult<Option<Agent>>;
    fn update_agent(&self, agent: &Agent) -> GatewayResult<()>;
    fn list_agents(&self) -> GatewayResult<Vec<Agent>>;

    fn insert_order(&self, order: &Order) -> GatewayResult<()>;
    fn update_order(&self, order: &Order) -> GatewayResult<()>;
    fn get_order(&self, id: &str) -> GatewayResult<Option<Order>>;
    fn list_open_orders(&self, symbol: &str) -> GatewayResult<Vec<Order>>;
    fn list_open_orders_for_agent(&self, agent_id: &str) -> GatewayResult<Vec<Order>>;

    fn insert_trade(&self, trade: &Trade) -> GatewayResult<()>;
    fn list_trades(&self, symbol: &str, limit: usize) -> GatewayResult<Vec<Trade>>;

    fn get_company(&self, symbol: &str) -> GatewayResult<Option<Company>>;
    fn list_companies(&self) -> GatewayResult<Vec<Company>>;
    fn update_company(&self, company: &Company) -> GatewayResult<()>;

    fn upsert_holding(&self, holding: &Holding) -> GatewayResult<()>;
    fn get_holding(&self, agent_id: &str, symbol: &str) -> GatewayResult<Option<Holding>>;
    fn list_holdings_for(&self, agent_id: &str) -> GatewayResult<Vec<Holding>>;

    fn insert_news(&self, article: &NewsArticle) -> GatewayResult<()>;
    fn list_news(&self, limit: usize) -> GatewayResult<Vec<NewsArticle>>;

    fn insert_message(&self, message: &Message) -> GatewayResult<()>;
    fn list_messages_for(&self, agent_id: &str) -> GatewayResult<Vec<Message>>;
    fn find_alliance_proposal(&self, alliance_id: &str, recipient_id: &str) -> GatewayResult<Option<Message>>;

    fn insert_alliance(&self, alliance: &Alliance) -> GatewayResult<()>;
    fn get_alliance(&self, id: &str) -> GatewayResult<Option<Alliance>>;
    fn update_alliance(&self, alliance: &Alliance) -> GatewayResult<()>;

    fn insert_investigation(&self, investigation: &Investigation) -> GatewayResult<()>;
    fn get_open_investigation_for(&self, agent_id: &str) -> GatewayResult<Option<Investigation>>;
    fn update_investigation(&self, investigation: &Investigation) -> GatewayResult<()>;
    fn list_most_wanted(&self, limit: usize) -> GatewayResult<Vec<Investigation>>;
    fn list_imprisoned(&self, limit: usize) -> GatewayResult<Vec<Agent>>;

    fn log_action(&self, entry: &ActionLogEntry) -> GatewayResult<()>;

    fn insert_tick_event(&self, record: &TickEventRecord) -> GatewayResult<()>;
    fn get_tick_events_since(&self, tick: u64) -> GatewayResult<Vec<TickEventRecord>>;
    fn prune_tick_events_before(&self, tick: u64) -> GatewayResult<()>;
    fn oldest_retained_tick(&self) -> GatewayResult<Option<u64>>;

    fn get_world_state(&self) -> GatewayResult<WorldState>;
    fn save_world_state(&self, state: &WorldState) -> GatewayResult<()>;
}
