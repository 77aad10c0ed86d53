//! Signed session tokens (spec.md §6: "Auth via `Authorization: Bearer
//! <apiKey>` or signed session token").

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use super::models::Claims;

pub struct JwtHandler {
    secret: String,
    expiration_hours: i64,
}

impl JwtHandler {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            expiration_hours: 24,
        }
    }

    /// Issue a session token bound to an agent id.
    pub fn generate_token(&self, agent_id: &str) -> Result<(String, usize)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::hours(self.expiration_hours))
            .context("invalid timestamp")?
            .timestamp() as usize;
        let expires_in = (self.expiration_hours * 3600) as usize;

        let claims = Claims {
            sub: agent_id.to_string(),
            exp: expiration,
        };

        debug!(agent_id, expires_in, "issuing session token");

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("failed to sign session token")?;

        Ok((token, expires_in))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .context("invalid or expired session token")?;

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_agent_id() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());
        let (token, expires_in) = handler.generate_token("agent-42").unwrap();
        assert!(!token.is_empty());
        assert_eq!(expires_in, 24 * 3600);

        let claims = handler.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "agent-42");
    }

    #[test]
    fn invalid_token_rejected() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());
        assert!(handler.validate_token("invalid.token.here").is_err());
    }

    #[test]
    fn different_secrets_reject() {
        let handler1 = JwtHandler::new("secret1".to_string());
        let handler2 = JwtHandler::new("secret2".to_string());

        let (token, _) = handler1.generate_token("agent-1").unwrap();
        assert!(handler2.validate_token(&token).is_err());
    }

    #[test]
    fn claims_carry_expiration_in_the_future() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());
        let (token, _) = handler.generate_token("agent-1").unwrap();
        let claims = handler.validate_token(&token).unwrap();
        assert!(claims.exp > Utc::now().timestamp() as usize);
    }
}
