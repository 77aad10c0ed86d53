//! `/ops/webhooks/*` (spec.md §4.9): operator control over a per-agent
//! circuit breaker, for manually isolating or restoring an endpoint without
//! waiting on the automatic failure/recovery state machine.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::resilience::CircuitState;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct BreakerStateResponse {
    #[serde(rename = "agentId")]
    pub agent_id: String,
    pub state: Option<CircuitState>,
}

pub async fn get_breaker(State(state): State<AppState>, Path(agent_id): Path<String>) -> Json<BreakerStateResponse> {
    let breaker_state = state.webhooks.breaker_state(&agent_id);
    Json(BreakerStateResponse { agent_id, state: breaker_state })
}

pub async fn trip_breaker(State(state): State<AppState>, Path(agent_id): Path<String>) -> Json<BreakerStateResponse> {
    state.webhooks.trip_breaker(&agent_id);
    Json(BreakerStateResponse { agent_id: agent_id.clone(), state: state.webhooks.breaker_state(&agent_id) })
}

pub async fn reset_breaker(State(state): State<AppState>, Path(agent_id): Path<String>) -> Json<BreakerStateResponse> {
    state.webhooks.reset_breaker(&agent_id);
    Json(BreakerStateResponse { agent_id: agent_id.clone(), state: state.webhooks.breaker_state(&agent_id) })
}
