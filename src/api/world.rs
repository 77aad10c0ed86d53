//! `/world/*` reads (spec.md §6): world clock, leaderboard, enforcement
//! rosters.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Investigation, WorldState};

use super::AppState;

const DEFAULT_LEADERBOARD_LIMIT: usize = 50;
const DEFAULT_MOST_WANTED_LIMIT: usize = 20;
const DEFAULT_PRISON_LIMIT: usize = 20;
const MAX_LIMIT: usize = 200;

pub async fn status(State(state): State<AppState>) -> Json<WorldState> {
    Json(state.gateway.get_world_state().unwrap_or_default())
}

#[derive(Debug, Serialize)]
pub struct TickResponse {
    pub tick: u64,
}

pub async fn tick(State(state): State<AppState>) -> Json<TickResponse> {
    let world_state = state.gateway.get_world_state().unwrap_or_default();
    Json(TickResponse { tick: world_state.tick })
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "netWorth")]
    pub net_worth: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

pub async fn leaderboard(State(state): State<AppState>, Query(query): Query<LimitQuery>) -> Json<Vec<LeaderboardEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT).min(MAX_LIMIT);

    let prices: HashMap<String, Decimal> = state
        .gateway
        .list_companies()
        .unwrap_or_default()
        .into_iter()
        .map(|c| (c.symbol, c.current_price))
        .collect();

    let mut entries: Vec<LeaderboardEntry> = state
        .gateway
        .list_agents()
        .unwrap_or_default()
        .into_iter()
        .map(|agent| {
            let holdings_value: Decimal = state
                .gateway
                .list_holdings_for(&agent.id)
                .unwrap_or_default()
                .into_iter()
                .map(|h| Decimal::from(h.quantity) * prices.get(&h.symbol).copied().unwrap_or(h.avg_cost))
                .sum();
            LeaderboardEntry {
                agent_id: agent.id,
                display_name: agent.display_name,
                net_worth: agent.cash + holdings_value,
            }
        })
        .collect();

    entries.sort_by(|a, b| b.net_worth.cmp(&a.net_worth));
    entries.truncate(limit);
    Json(entries)
}

pub async fn most_wanted(State(state): State<AppState>, Query(query): Query<LimitQuery>) -> Json<Vec<Investigation>> {
    let limit = query.limit.unwrap_or(DEFAULT_MOST_WANTED_LIMIT).min(MAX_LIMIT);
    Json(state.gateway.list_most_wanted(limit).unwrap_or_default())
}

#[derive(Debug, Serialize)]
pub struct PrisonerEntry {
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

pub async fn prison(State(state): State<AppState>, Query(query): Query<LimitQuery>) -> Json<Vec<PrisonerEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_PRISON_LIMIT).min(MAX_LIMIT);
    let prisoners = state
        .gateway
        .list_imprisoned(limit)
        .unwrap_or_default()
        .into_iter()
        .map(|a| PrisonerEntry { agent_id: a.id, display_name: a.display_name })
        .collect();
    Json(prisoners)
}
