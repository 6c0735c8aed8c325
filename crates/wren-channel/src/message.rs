use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wren_ai::MessageRole;

/// Metadata keys understood by the orchestrator on inbound messages and
/// session metadata.
pub mod metadata_keys {
    /// Boolean: the message was generated autonomously, not by a human.
    /// Suppresses rate limiting and the feedback guarantee.
    pub const AUTO_MODE: &str = "auto.mode";

    /// String: transport-level chat id used for ephemeral signals such as
    /// typing indicators. May differ from the logical chat id.
    pub const TRANSPORT_CHAT_ID: &str = "transport.chat.id";

    /// String: stable, channel-agnostic conversation key.
    pub const CONVERSATION_KEY: &str = "conversation.key";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Attachment delivered alongside a text message (photos, documents).
pub struct Attachment {
    pub attachment_id: String,
    pub url: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// One message in a conversation, as received from a channel adapter or as
/// stored in session history.
pub struct ChannelMessage {
    pub role: MessageRole,
    pub content: Option<String>,
    pub channel_type: String,
    pub chat_id: String,
    #[serde(default)]
    pub sender_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl ChannelMessage {
    pub fn user(
        channel_type: impl Into<String>,
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(text.into()),
            channel_type: channel_type.into(),
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn assistant(
        channel_type: impl Into<String>,
        chat_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(text.into()),
            channel_type: channel_type.into(),
            chat_id: chat_id.into(),
            sender_id: String::new(),
            timestamp: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn is_user_message(&self) -> bool {
        self.role == MessageRole::User
    }

    pub fn is_assistant_message(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    /// True when the message carries the auto-mode marker.
    pub fn is_auto_mode(&self) -> bool {
        matches!(
            self.metadata.get(metadata_keys::AUTO_MODE),
            Some(Value::Bool(true))
        )
    }

    /// Reads a metadata value as a non-empty string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        match self.metadata.get(key) {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        }
    }

    /// Message text, or the empty string for content-free messages.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}
