//! Request authentication (spec.md §6: Bearer apiKey or signed session token).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{jwt::JwtHandler, models::Claims, store::CredentialStore};

#[derive(Clone)]
pub struct AuthLayerState {
    pub credentials: Arc<CredentialStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

/// Validates either a raw `wss_live_` API key or a signed session token and
/// injects `Claims{sub: agentId}` into the request extensions.
pub async fn auth_middleware(
    State(state): State<AuthLayerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token_from_query = req.uri().query().and_then(|query| {
        query
            .split('&')
            .find(|pair| pair.starts_with("token="))
            .and_then(|pair| pair.split('=').nth(1))
            .map(|t| t.to_string())
    });

    let token_from_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    let token = token_from_header
        .or(token_from_query)
        .ok_or(AuthError::MissingToken)?;

    let claims = resolve_claims(&state, &token)?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

fn resolve_claims(state: &AuthLayerState, token: &str) -> Result<Claims, AuthError> {
    if token.starts_with("wss_live_") {
        let agent_id = state
            .credentials
            .verify(token)
            .map_err(|_| AuthError::InvalidToken)?
            .ok_or(AuthError::InvalidToken)?;
        Ok(Claims {
            sub: agent_id,
            exp: usize::MAX,
        })
    } else {
        state
            .jwt_handler
            .validate_token(token)
            .map_err(|_| AuthError::InvalidToken)
    }
}

pub fn extract_claims(req: &Request) -> Option<&Claims> {
    req.extensions().get::<Claims>()
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "missing authorization token"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid or expired token"),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_responses_are_unauthorized() {
        assert_eq!(
            AuthError::MissingToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn extract_claims_reads_request_extensions() {
        let mut req = Request::new(axum::body::Body::empty());
        assert!(extract_claims(&req).is_none());

        req.extensions_mut().insert(Claims {
            sub: "agent-1".to_string(),
            exp: 123,
        });
        assert_eq!(extract_claims(&req).unwrap().sub, "agent-1");
    }
}
