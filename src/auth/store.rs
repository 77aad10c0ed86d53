//! Agent credential storage (spec.md §6 `/auth/register`, `/auth/verify`).
//!
//! Its own SQLite connection, schema-on-open, full CRUD. API keys are
//! high-entropy random tokens, not user-chosen passwords, so a plain
//! SHA-256 digest is sufficient to defeat a database read without
//! bcrypt's deliberately expensive verify — see
//! DESIGN.md.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use super::models::AgentCredential;

pub struct CredentialStore {
    db_path: String,
}

fn hash_key(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

impl CredentialStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS agent_credentials (
                agent_id TEXT PRIMARY KEY,
                api_key_hash TEXT UNIQUE NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Mint a fresh API key bound to a new agent id, returning both.
    pub fn register(&self) -> Result<(String, String)> {
        let agent_id = Uuid::new_v4().to_string();
        let api_key = AgentCredential::generate_key();
        let credential = AgentCredential {
            agent_id: agent_id.clone(),
            api_key_hash: hash_key(&api_key),
            created_at: Utc::now().to_rfc3339(),
        };

        let conn = Connection::open(&self.db_path)?;
        conn.execute(
            "INSERT INTO agent_credentials (agent_id, api_key_hash, created_at)
             VALUES (?1, ?2, ?3)",
            params![credential.agent_id, credential.api_key_hash, credential.created_at],
        )
        .context("failed to insert agent credential")?;

        info!(agent_id = %agent_id, "registered new agent credential");
        Ok((api_key, agent_id))
    }

    /// Resolve a raw API key to its owning agent id, if valid.
    pub fn verify(&self, api_key: &str) -> Result<Option<String>> {
        let hash = hash_key(api_key);
        let conn = Connection::open(&self.db_path)?;
        let result = conn
            .query_row(
                "SELECT agent_id FROM agent_credentials WHERE api_key_hash = ?1",
                params![hash],
                |row| row.get::<_, String>(0),
            )
            .optional_agent_id()?;
        Ok(result)
    }
}

/// Small adapter so `query_row`'s `QueryReturnedNoRows` reads as `Ok(None)`
/// without pulling in `rusqlite::OptionalExtension` at every call site.
trait OptionalAgentId {
    fn optional_agent_id(self) -> Result<Option<String>>;
}

impl OptionalAgentId for rusqlite::Result<String> {
    fn optional_agent_id(self) -> Result<Option<String>> {
        match self {
            Ok(id) => Ok(Some(id)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (CredentialStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = CredentialStore::new(db_path).unwrap();
        (store, temp_file)
    }

    #[test]
    fn register_then_verify_round_trip() {
        let (store, _temp) = create_test_store();
        let (api_key, agent_id) = store.register().unwrap();

        let resolved = store.verify(&api_key).unwrap();
        assert_eq!(resolved, Some(agent_id));
    }

    #[test]
    fn unknown_key_does_not_verify() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.verify("wss_live_bogus").unwrap(), None);
    }

    #[test]
    fn two_registrations_yield_distinct_agents() {
        let (store, _temp) = create_test_store();
        let (_, agent_a) = store.register().unwrap();
        let (_, agent_b) = store.register().unwrap();
        assert_ne!(agent_a, agent_b);
    }
}
