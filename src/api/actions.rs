//! `POST /actions` (spec.md §6): the only write path into the simulation.
//! Authenticated agents submit a batch of actions, each dispatched through
//! the single `ActionProcessor` entry point and returned in submission
//! order.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::actions::ActionContext;
use crate::auth::middleware::extract_claims;
use crate::domain::{Action, ActionResult};

use super::AppState;

/// spec.md §6: a single request may not submit more than this many actions.
const MAX_ACTIONS_PER_REQUEST: usize = 10;

#[derive(Debug, Deserialize)]
pub struct SubmitActionsRequest {
    pub actions: Vec<Action>,
}

#[derive(Debug, Serialize)]
pub struct SubmitActionsResponse {
    pub results: Vec<ActionResult>,
}

pub async fn submit_actions(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<SubmitActionsResponse>, ApiError> {
    let agent_id = extract_claims(&request)
        .map(|claims| claims.sub.clone())
        .ok_or(ApiError::Unauthorized)?;

    let (_, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| ApiError::BadRequest("could not read request body".to_string()))?;
    let payload: SubmitActionsRequest = serde_json::from_slice(&bytes)
        .map_err(|err| ApiError::BadRequest(format!("invalid request body: {err}")))?;

    if payload.actions.is_empty() {
        return Err(ApiError::BadRequest("at least one action is required".to_string()));
    }
    if payload.actions.len() > MAX_ACTIONS_PER_REQUEST {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_ACTIONS_PER_REQUEST} actions per request"
        )));
    }

    let agent = state
        .gateway
        .get_agent(&agent_id)
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .ok_or(ApiError::Unauthorized)?;

    let tick = state.engine.current_tick();
    let ctx = ActionContext { agent_id: agent_id.clone(), agent, tick };

    let lock = state.action_processor.agent_lock(&agent_id);
    let results = {
        let _guard = lock.lock().await;
        payload
            .actions
            .into_iter()
            .map(|action| state.action_processor.process(&ctx, action))
            .collect()
    };

    Ok(Json(SubmitActionsResponse { results }))
}

pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, message).into_response()
    }
}
