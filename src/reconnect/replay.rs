//! Reconnection replay (C10): WORLD_STATE + PORTFOLIO checkpoints followed
//! by a synthesized-sequence replay of persisted `TickEventRecord`s for
//! `(lastKnownTick, currentTick]`.

use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::domain::{Holding, Order, WorldState};
use crate::persistence::PersistenceGateway;
use crate::realtime::event::{EventType, WireEvent};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("lastKnownTick is beyond the retention horizon")]
    BeyondRetentionHorizon,
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone)]
pub struct PortfolioSnapshot {
    pub cash: Decimal,
    pub holdings: Vec<Holding>,
    pub open_orders: Vec<Order>,
}

#[derive(Debug, Clone)]
pub struct ReplayPlan {
    pub world_state: WorldState,
    pub portfolio: PortfolioSnapshot,
    /// Discrete events for `(lastKnownTick, currentTick]`, in ascending
    /// tick order, with `replay=true` and a sequence synthesized from 0.
    pub events: Vec<WireEvent>,
}

/// Builds the full reconnect payload for one agent. Callers are expected to
/// send `world_state`/`portfolio` as their own checkpoint frames, then each
/// `events` entry in order, then a RECOVERY_COMPLETE sentinel.
pub fn build_replay(
    gateway: &dyn PersistenceGateway,
    agent_id: &str,
    last_known_tick: u64,
) -> Result<ReplayPlan, ReplayError> {
    if let Some(oldest) = gateway.oldest_retained_tick().map_err(|e| ReplayError::Storage(e.to_string()))? {
        if last_known_tick + 1 < oldest {
            return Err(ReplayError::BeyondRetentionHorizon);
        }
    }

    let world_state = gateway.get_world_state().map_err(|e| ReplayError::Storage(e.to_string()))?;

    let agent = gateway
        .get_agent(agent_id)
        .map_err(|e| ReplayError::Storage(e.to_string()))?
        .ok_or_else(|| ReplayError::Storage("agent not found".to_string()))?;
    let holdings = gateway
        .list_holdings_for(agent_id)
        .map_err(|e| ReplayError::Storage(e.to_string()))?;
    let open_orders = gateway
        .list_open_orders_for_agent(agent_id)
        .map_err(|e| ReplayError::Storage(e.to_string()))?;

    let records = gateway
        .get_tick_events_since(last_known_tick)
        .map_err(|e| ReplayError::Storage(e.to_string()))?;

    let mut sequence = 0u64;
    let mut events = Vec::new();
    for record in records {
        if !record.price_updates.is_empty() {
            sequence += 1;
            events.push(replay_event(
                EventType::PriceUpdate,
                sequence,
                json!({ "tick": record.tick, "updates": record.price_updates }),
            ));
        }
        for trade in &record.trades {
            sequence += 1;
            events.push(replay_event(EventType::Trade, sequence, serde_json::to_value(trade).unwrap_or_default()));
        }
        for article in &record.news {
            sequence += 1;
            events.push(replay_event(EventType::News, sequence, serde_json::to_value(article).unwrap_or_default()));
        }
    }

    Ok(ReplayPlan {
        world_state,
        portfolio: PortfolioSnapshot { cash: agent.cash, holdings, open_orders },
        events,
    })
}

fn replay_event(event_type: EventType, sequence: u64, payload: serde_json::Value) -> WireEvent {
    WireEvent {
        event_type,
        timestamp: chrono::Utc::now().to_rfc3339(),
        sequence,
        payload,
        replay: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Agent, PriceUpdate, TickEventRecord};
    use crate::persistence::memory::MemoryGateway;
    use rust_decimal_macros::dec;

    #[test]
    fn beyond_retention_horizon_is_rejected() {
        let gateway = MemoryGateway::new();
        gateway.create_agent(&Agent::new("a1", "Trader", dec!(1000))).unwrap();
        for tick in 100..110 {
            gateway
                .insert_tick_event(&TickEventRecord { tick, timestamp: 0, trades: vec![], news: vec![], price_updates: vec![] })
                .unwrap();
        }
        gateway.prune_tick_events_before(100).unwrap();

        let result = build_replay(&gateway, "a1", 10);
        assert!(matches!(result, Err(ReplayError::BeyondRetentionHorizon)));
    }

    #[test]
    fn replay_emits_events_in_ascending_tick_order() {
        let gateway = MemoryGateway::new();
        gateway.create_agent(&Agent::new("a1", "Trader", dec!(1000))).unwrap();
        gateway
            .insert_tick_event(&TickEventRecord {
                tick: 1,
                timestamp: 0,
                trades: vec![],
                news: vec![],
                price_updates: vec![PriceUpdate {
                    symbol: "AAPL".to_string(),
                    old_price: dec!(100),
                    new_price: dec!(101),
                    change: dec!(1),
                    change_percent: dec!(1),
                    volume: 10,
                }],
            })
            .unwrap();

        let plan = build_replay(&gateway, "a1", 0).unwrap();
        assert_eq!(plan.events.len(), 1);
        assert_eq!(plan.events[0].sequence, 1);
        assert!(plan.events[0].replay);
    }
}
