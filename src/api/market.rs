//! `/market/*` catalog reads (spec.md §6).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::domain::{Company, Trade};
use crate::matching::OrderBookSnapshot;

use super::AppState;

const MAX_TRADE_LIMIT: usize = 100;
const DEFAULT_TRADE_LIMIT: usize = 50;

pub async fn list_stocks(State(state): State<AppState>) -> Json<Vec<Company>> {
    Json(state.gateway.list_companies().unwrap_or_default())
}

pub async fn get_stock(State(state): State<AppState>, Path(symbol): Path<String>) -> Result<Json<Company>, StatusCode> {
    match state.gateway.get_company(&symbol) {
        Ok(Some(company)) => Ok(Json(company)),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

pub async fn order_book(State(state): State<AppState>, Path(symbol): Path<String>) -> Json<OrderBookSnapshot> {
    Json(state.engine.order_book(&symbol))
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    limit: Option<usize>,
}

pub async fn recent_trades(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<TradesQuery>,
) -> Json<Vec<Trade>> {
    let limit = query.limit.unwrap_or(DEFAULT_TRADE_LIMIT).min(MAX_TRADE_LIMIT);
    Json(state.gateway.list_trades(&symbol, limit).unwrap_or_default())
}
