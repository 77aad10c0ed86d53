//! `GET /news` (spec.md §6).

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::domain::NewsArticle;

use super::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct NewsQuery {
    limit: Option<usize>,
}

pub async fn list_news(State(state): State<AppState>, Query(query): Query<NewsQuery>) -> Json<Vec<NewsArticle>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    Json(state.gateway.list_news(limit).unwrap_or_default())
}
