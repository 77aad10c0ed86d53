//! Direct and alliance-proposal messages (spec.md §3 Message).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub tick: u64,
    pub sender_id: String,
    pub recipient_id: Option<String>,
    pub channel: String,
    pub subject: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub is_deleted: bool,
    pub read_at: Option<i64>,
}

impl Message {
    pub fn direct(tick: u64, sender_id: impl Into<String>, recipient_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tick,
            sender_id: sender_id.into(),
            recipient_id: Some(recipient_id.into()),
            channel: "direct".to_string(),
            subject: None,
            content: content.into(),
            is_read: false,
            is_deleted: false,
            read_at: None,
        }
    }

    pub fn alliance(tick: u64, sender_id: impl Into<String>, recipient_id: impl Into<String>, subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tick,
            sender_id: sender_id.into(),
            recipient_id: Some(recipient_id.into()),
            channel: "alliance".to_string(),
            subject: Some(subject.into()),
            content: content.into(),
            is_read: false,
            is_deleted: false,
            read_at: None,
        }
    }
}
