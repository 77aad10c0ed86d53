//! `/auth/register` and `/auth/verify` (spec.md §6).

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rust_decimal::Decimal;
use tracing::info;

use crate::domain::Agent;
use crate::persistence::PersistenceGateway;

use super::models::{RegisterRequest, RegisterResponse, VerifyRequest, VerifyResponse};
use super::store::CredentialStore;

#[derive(Clone)]
pub struct AuthState {
    pub credentials: Arc<CredentialStore>,
    pub gateway: Arc<dyn PersistenceGateway>,
    pub starting_cash: Decimal,
    pub max_leverage: u32,
}

impl AuthState {
    pub fn new(
        credentials: Arc<CredentialStore>,
        gateway: Arc<dyn PersistenceGateway>,
        starting_cash: Decimal,
        max_leverage: u32,
    ) -> Self {
        Self {
            credentials,
            gateway,
            starting_cash,
            max_leverage,
        }
    }
}

pub async fn register(
    State(state): State<AuthState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, AuthApiError> {
    let (api_key, agent_id) = state
        .credentials
        .register()
        .map_err(|e| AuthApiError::Internal(e.to_string()))?;

    let mut agent = Agent::new(agent_id.clone(), body.display_name, state.starting_cash);
    agent.margin_limit = state.starting_cash * Decimal::from(state.max_leverage);
    if let Some(role) = body.role {
        agent.role = role;
    }

    state
        .gateway
        .create_agent(&agent)
        .map_err(|e| AuthApiError::Internal(e.to_string()))?;

    info!(agent_id = %agent_id, "agent registered");

    Ok(Json(RegisterResponse { api_key, agent_id }))
}

pub async fn verify(
    State(state): State<AuthState>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AuthApiError> {
    let agent_id = state
        .credentials
        .verify(&body.api_key)
        .map_err(|e| AuthApiError::Internal(e.to_string()))?;

    Ok(Json(VerifyResponse {
        valid: agent_id.is_some(),
        agent_id,
    }))
}

#[derive(Debug)]
pub enum AuthApiError {
    Internal(String),
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AuthApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::MemoryGateway;
    use rust_decimal_macros::dec;
    use tempfile::NamedTempFile;

    fn test_state() -> (AuthState, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let credentials = Arc::new(CredentialStore::new(temp.path().to_str().unwrap()).unwrap());
        let gateway: Arc<dyn PersistenceGateway> = Arc::new(MemoryGateway::new());
        (AuthState::new(credentials, gateway, dec!(10000), 10), temp)
    }

    #[tokio::test]
    async fn register_creates_agent_and_credential() {
        let (state, _temp) = test_state();
        let response = register(
            State(state.clone()),
            Json(RegisterRequest {
                display_name: "Test Trader".to_string(),
                role: None,
            }),
        )
        .await
        .unwrap();

        let agent = state.gateway.get_agent(&response.agent_id).unwrap();
        assert!(agent.is_some());
        assert_eq!(agent.unwrap().cash, dec!(10000));
    }

    #[tokio::test]
    async fn verify_round_trips_through_register() {
        let (state, _temp) = test_state();
        let registered = register(
            State(state.clone()),
            Json(RegisterRequest {
                display_name: "Test Trader".to_string(),
                role: None,
            }),
        )
        .await
        .unwrap();

        let verified = verify(
            State(state),
            Json(VerifyRequest {
                api_key: registered.api_key.clone(),
            }),
        )
        .await
        .unwrap();

        assert!(verified.valid);
        assert_eq!(verified.agent_id.as_deref(), Some(registered.agent_id.as_str()));
    }

    #[tokio::test]
    async fn verify_rejects_unknown_key() {
        let (state, _temp) = test_state();
        let verified = verify(
            State(state),
            Json(VerifyRequest {
                api_key: "wss_live_bogus".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(!verified.valid);
    }
}
