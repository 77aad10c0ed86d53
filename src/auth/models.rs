//! Authentication data structures (spec.md §6 ingress auth).

use serde::{Deserialize, Serialize};

/// Session-token claims. `sub` is the agent id (spec.md §3 Agent.id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// `POST /auth/register` request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub display_name: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// `POST /auth/register` response (spec.md §6: `{apiKey, agentId}`).
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
}

/// `POST /auth/verify` request body.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// `POST /auth/verify` response (spec.md §6: `{valid, agentId?}`).
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(rename = "agentId", skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

/// An agent's stored credential: an opaque high-entropy API key, identified
/// only by its hash — not a username/password pair, see DESIGN.md for why
/// bcrypt was dropped in favor of SHA-256.
#[derive(Debug, Clone)]
pub struct AgentCredential {
    pub agent_id: String,
    pub api_key_hash: String,
    pub created_at: String,
}

impl AgentCredential {
    /// Generate a new opaque API key string (`wss_live_<uuid>`).
    pub fn generate_key() -> String {
        format!("wss_live_{}", uuid::Uuid::new_v4().simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique_and_prefixed() {
        let a = AgentCredential::generate_key();
        let b = AgentCredential::generate_key();
        assert!(a.starts_with("wss_live_"));
        assert!(b.starts_with("wss_live_"));
        assert_ne!(a, b);
    }
}
