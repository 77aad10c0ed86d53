//! Read-mostly REST surface (spec.md §6): catalog/leaderboard reads plus
//! the `/actions` ingress endpoint. Everything here is a thin translation
//! layer over the gateway, matching engine, and action processor — no
//! business rules live in a handler.

pub mod actions;
pub mod health;
pub mod market;
pub mod news;
pub mod ops;
pub mod world;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::actions::ActionProcessor;
use crate::matching::MatchingEngine;
use crate::persistence::PersistenceGateway;
use crate::webhook::WebhookDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn PersistenceGateway>,
    pub engine: MatchingEngine,
    pub action_processor: Arc<ActionProcessor>,
    pub webhooks: Arc<WebhookDispatcher>,
}

/// The unauthenticated + authenticated API routes, excluding `/auth/*` and
/// `/ws` (wired separately in `main.rs` since they carry their own state
/// types).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/actions", post(actions::submit_actions))
        .route("/market/stocks", get(market::list_stocks))
        .route("/market/stocks/:symbol", get(market::get_stock))
        .route("/market/orderbook/:symbol", get(market::order_book))
        .route("/market/trades/:symbol", get(market::recent_trades))
        .route("/world/status", get(world::status))
        .route("/world/tick", get(world::tick))
        .route("/world/leaderboard", get(world::leaderboard))
        .route("/world/investigations/most-wanted", get(world::most_wanted))
        .route("/world/prison", get(world::prison))
        .route("/news", get(news::list_news))
        .route("/health", get(health::health))
        .route("/ops/webhooks/:agent_id", get(ops::get_breaker))
        .route("/ops/webhooks/:agent_id/trip", post(ops::trip_breaker))
        .route("/ops/webhooks/:agent_id/reset", post(ops::reset_breaker))
        .with_state(state)
}
