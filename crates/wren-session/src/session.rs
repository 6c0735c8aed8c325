use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wren_channel::ChannelMessage;

const SESSION_ID_SEPARATOR: &str = ":";

/// Builds the canonical session id for a (channel type, chat id) pair.
pub fn session_id(channel_type: &str, chat_id: &str) -> String {
    format!("{channel_type}{SESSION_ID_SEPARATOR}{chat_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Durable conversation state for one (channel type, chat id).
///
/// History is mutated only by appending messages; the orchestrator's
/// explicit metadata writes are the only other mutation. Synthetic
/// control messages (iteration-limit notices, fallback feedback) are
/// never written here.
pub struct AgentSession {
    pub id: String,
    pub channel_type: String,
    pub chat_id: String,
    #[serde(default)]
    pub messages: Vec<ChannelMessage>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentSession {
    pub fn new(channel_type: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let channel_type = channel_type.into();
        let chat_id = chat_id.into();
        let now = Utc::now();
        Self {
            id: session_id(&channel_type, &chat_id),
            channel_type,
            chat_id,
            messages: Vec::new(),
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a message to history and refreshes the session timestamp.
    pub fn push_message(&mut self, message: ChannelMessage) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn set_metadata(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
        self.updated_at = Utc::now();
    }

    /// Reads a metadata value as a non-empty string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        match self.metadata.get(key) {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn assistant_message_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| message.is_assistant_message())
            .count()
    }
}
