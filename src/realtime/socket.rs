//! Inbound `/ws` handler (C8): `WebSocketUpgrade` into a `handle_socket`
//! loop that `tokio::select!`s over a broadcast receiver and the client
//! socket, with per-connection subscription state, AUTH, and bounded
//! backpressure.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::auth::CredentialStore;
use crate::persistence::PersistenceGateway;
use crate::reconnect::{build_replay, ReplayError};

use super::bus::EventBus;
use super::event::{BusMessage, EventType, WireEvent};

/// Outbound queue high-water mark (spec.md §5): beyond this, PRICE_UPDATE is
/// dropped; any other event type closes the connection instead.
const OUTBOUND_HIGH_WATER_MARK: usize = 256;

#[derive(Clone)]
pub struct SocketState {
    pub bus: EventBus,
    pub credentials: Arc<CredentialStore>,
    pub gateway: Arc<dyn PersistenceGateway>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "UPPERCASE")]
enum ClientOp {
    Auth {
        #[serde(rename = "apiKey")]
        api_key: String,
        /// Present on a reconnect (spec.md §9): the last tick the client
        /// observed before dropping, triggering a replay of everything
        /// since instead of a bare AUTH_ACK.
        #[serde(rename = "lastKnownTick")]
        last_known_tick: Option<u64>,
    },
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
    Ping,
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<SocketState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

struct Connection {
    subscribed: HashSet<String>,
    authenticated_agent_id: Option<String>,
    sequence: u64,
    outbound: VecDeque<BusMessage>,
}

impl Connection {
    fn new() -> Self {
        Self {
            subscribed: HashSet::new(),
            authenticated_agent_id: None,
            sequence: 0,
            outbound: VecDeque::new(),
        }
    }

    fn accepts(&self, msg: &BusMessage) -> bool {
        match &msg.target_agent_id {
            Some(target) => self.authenticated_agent_id.as_deref() == Some(target.as_str()),
            None => self.subscribed.contains(&msg.channel),
        }
    }

    /// Returns `false` when admitting `msg` would require closing the
    /// connection (a non-droppable event arriving at a full queue).
    fn enqueue(&mut self, msg: BusMessage) -> bool {
        if self.outbound.len() < OUTBOUND_HIGH_WATER_MARK {
            self.outbound.push_back(msg);
            return true;
        }
        if msg.event_type == EventType::PriceUpdate {
            return true; // lossy by design
        }
        false
    }

    fn next_wire_event(&mut self, msg: BusMessage) -> WireEvent {
        self.sequence += 1;
        WireEvent {
            event_type: msg.event_type,
            timestamp: Utc::now().to_rfc3339(),
            sequence: self.sequence,
            payload: msg.payload,
            replay: false,
        }
    }
}

async fn handle_socket(mut socket: WebSocket, state: SocketState) {
    let mut rx = state.bus.subscribe();
    let mut conn = Connection::new();

    loop {
        tokio::select! {
            bus_msg = rx.recv() => {
                match bus_msg {
                    Ok(msg) => {
                        if !conn.accepts(&msg) {
                            continue;
                        }
                        if !conn.enqueue(msg) {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            client_msg = socket.recv() => {
                match client_msg {
                    Some(Ok(Message::Text(text))) => {
                        if !handle_client_op(&text, &mut conn, &mut socket, &state).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket receive error");
                        break;
                    }
                }
            }
        }

        while let Some(msg) = conn.outbound.pop_front() {
            let wire = conn.next_wire_event(msg);
            let text = serde_json::to_string(&wire).unwrap_or_else(|_| "{}".to_string());
            if socket.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
    }
}

/// Returns `false` when the connection should close (AUTH failure).
async fn handle_client_op(text: &str, conn: &mut Connection, socket: &mut WebSocket, state: &SocketState) -> bool {
    let Ok(op) = serde_json::from_str::<ClientOp>(text) else {
        return true;
    };

    match op {
        ClientOp::Auth { api_key, last_known_tick } => match state.credentials.verify(&api_key) {
            Ok(Some(agent_id)) => {
                conn.authenticated_agent_id = Some(agent_id.clone());
                let ack = json!({ "type": "AUTH_ACK", "agentId": agent_id });
                let _ = socket.send(Message::Text(ack.to_string())).await;

                if let Some(last_known_tick) = last_known_tick {
                    send_replay(socket, conn, &state, &agent_id, last_known_tick).await;
                }
                true
            }
            _ => {
                let err = json!({ "type": "ERROR", "message": "authentication failed" });
                let _ = socket.send(Message::Text(err.to_string())).await;
                false
            }
        },
        ClientOp::Subscribe { channels } => {
            conn.subscribed.extend(channels);
            true
        }
        ClientOp::Unsubscribe { channels } => {
            for channel in channels {
                conn.subscribed.remove(&channel);
            }
            true
        }
        ClientOp::Ping => {
            let pong = json!({ "type": "PONG" });
            let _ = socket.send(Message::Text(pong.to_string())).await;
            true
        }
    }
}

/// Sends the reconnect payload (spec.md §9): WORLD_STATE + PORTFOLIO
/// checkpoints, every missed event in order, then RECOVERY_COMPLETE. A
/// `lastKnownTick` beyond the retention horizon degrades to an error asking
/// the client to resync from REST instead of replaying.
async fn send_replay(socket: &mut WebSocket, conn: &mut Connection, state: &SocketState, agent_id: &str, last_known_tick: u64) {
    let plan = match build_replay(state.gateway.as_ref(), agent_id, last_known_tick) {
        Ok(plan) => plan,
        Err(ReplayError::BeyondRetentionHorizon) => {
            let err = json!({
                "type": "ERROR",
                "message": "lastKnownTick is beyond the retention horizon; refetch state via REST",
            });
            let _ = socket.send(Message::Text(err.to_string())).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, agent_id, "failed to build reconnect replay plan");
            return;
        }
    };

    let world_state = json!({ "type": "WORLD_STATE", "state": plan.world_state });
    let _ = socket.send(Message::Text(world_state.to_string())).await;

    let portfolio = json!({
        "type": "PORTFOLIO",
        "cash": plan.portfolio.cash,
        "holdings": plan.portfolio.holdings,
        "openOrders": plan.portfolio.open_orders,
    });
    let _ = socket.send(Message::Text(portfolio.to_string())).await;

    for event in plan.events {
        conn.sequence = conn.sequence.max(event.sequence);
        let text = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        if socket.send(Message::Text(text)).await.is_err() {
            return;
        }
    }

    let complete = json!({ "type": "RECOVERY_COMPLETE" });
    let _ = socket.send(Message::Text(complete.to_string())).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unauthenticated_connection_does_not_accept_private_events() {
        let conn = Connection::new();
        let msg = BusMessage::private("agent-1", EventType::OrderFilled, json!({}));
        assert!(!conn.accepts(&msg));
    }

    #[test]
    fn authenticated_connection_accepts_its_own_private_events() {
        let mut conn = Connection::new();
        conn.authenticated_agent_id = Some("agent-1".to_string());
        let own = BusMessage::private("agent-1", EventType::OrderFilled, json!({}));
        let other = BusMessage::private("agent-2", EventType::OrderFilled, json!({}));
        assert!(conn.accepts(&own));
        assert!(!conn.accepts(&other));
    }

    #[test]
    fn public_channel_requires_subscription() {
        let mut conn = Connection::new();
        let msg = BusMessage::public("trades", EventType::Trade, json!({}));
        assert!(!conn.accepts(&msg));
        conn.subscribed.insert("trades".to_string());
        assert!(conn.accepts(&msg));
    }

    #[test]
    fn price_update_is_dropped_once_queue_is_full() {
        let mut conn = Connection::new();
        for _ in 0..OUTBOUND_HIGH_WATER_MARK {
            conn.outbound.push_back(BusMessage::public("prices", EventType::PriceUpdate, json!({})));
        }
        let accepted = conn.enqueue(BusMessage::public("prices", EventType::PriceUpdate, json!({})));
        assert!(accepted);
        assert_eq!(conn.outbound.len(), OUTBOUND_HIGH_WATER_MARK);
    }

    #[test]
    fn trade_event_signals_close_once_queue_is_full() {
        let mut conn = Connection::new();
        for _ in 0..OUTBOUND_HIGH_WATER_MARK {
            conn.outbound.push_back(BusMessage::public("trades", EventType::Trade, json!({})));
        }
        let accepted = conn.enqueue(BusMessage::public("trades", EventType::Trade, json!({})));
        assert!(!accepted);
    }

    #[test]
    fn sequence_increments_per_event_sent() {
        let mut conn = Connection::new();
        let first = conn.next_wire_event(BusMessage::public("trades", EventType::Trade, json!({})));
        let second = conn.next_wire_event(BusMessage::public("trades", EventType::Trade, json!({})));
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
    }
}
