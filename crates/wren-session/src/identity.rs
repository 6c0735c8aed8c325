//! Helpers for resolving and persisting transport/session identity fields.
//!
//! The transport-level address used for ephemeral signals (typing
//! indicators) may differ from the logical chat id; these helpers keep the
//! binding in session metadata so replies land on the right surface.

use serde_json::Value;
use wren_channel::{metadata_keys, ChannelMessage};

use crate::session::AgentSession;

/// Transport-level chat id for the session: bound metadata first, then the
/// logical chat id.
pub fn resolve_transport_chat_id(session: &AgentSession) -> &str {
    session
        .metadata_str(metadata_keys::TRANSPORT_CHAT_ID)
        .unwrap_or(session.chat_id.as_str())
}

/// Stable conversation key for the session: bound metadata first, then the
/// suffix of the session id, then the chat id.
pub fn resolve_conversation_key(session: &AgentSession) -> &str {
    if let Some(key) = session.metadata_str(metadata_keys::CONVERSATION_KEY) {
        return key;
    }
    if let Some((_, suffix)) = session.id.split_once(':') {
        if !suffix.is_empty() {
            return suffix;
        }
    }
    session.chat_id.as_str()
}

/// Persists transport identity carried on an inbound message into session
/// metadata. Returns true when anything changed.
pub fn bind_transport_identity(session: &mut AgentSession, message: &ChannelMessage) -> bool {
    let mut changed = false;

    if let Some(transport_chat_id) = message.metadata_str(metadata_keys::TRANSPORT_CHAT_ID) {
        if session.metadata_str(metadata_keys::TRANSPORT_CHAT_ID) != Some(transport_chat_id) {
            let value = Value::String(transport_chat_id.to_string());
            session.set_metadata(metadata_keys::TRANSPORT_CHAT_ID, value);
            changed = true;
        }
    }

    if let Some(conversation_key) = message.metadata_str(metadata_keys::CONVERSATION_KEY) {
        if session.metadata_str(metadata_keys::CONVERSATION_KEY) != Some(conversation_key) {
            let value = Value::String(conversation_key.to_string());
            session.set_metadata(metadata_keys::CONVERSATION_KEY, value);
            changed = true;
        }
    }

    changed
}
