use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::message::Attachment;

#[derive(Debug, Error)]
/// Enumerates supported `ChannelError` values.
pub enum ChannelError {
    #[error("send failed: {0}")]
    Send(String),
    #[error("send timed out after {0}ms")]
    Timeout(u64),
    #[error("transport does not support attachments")]
    AttachmentsUnsupported,
}

#[async_trait]
/// Trait contract for `ChannelTransport` behavior.
///
/// One implementation per channel type. Delivery failures are returned to
/// the caller; they must never panic the turn.
pub trait ChannelTransport: Send + Sync {
    /// Channel type identifier (e.g. "telegram", "web", "webhook").
    fn channel_type(&self) -> &str;

    /// Delivers plain text to the given chat.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError>;

    /// Delivers text followed by attachments. Transports without attachment
    /// support fall back to text-only delivery.
    async fn send_message_with_attachments(
        &self,
        chat_id: &str,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<(), ChannelError> {
        let _ = attachments;
        self.send_message(chat_id, text).await
    }

    /// Best-effort typing indicator on the transport-level chat surface.
    /// Implementations swallow their own errors; callers never await a
    /// result beyond completion.
    async fn show_typing(&self, transport_chat_id: &str) {
        let _ = transport_chat_id;
    }
}

/// Transport lookup keyed by channel type.
#[derive(Default, Clone)]
pub struct TransportRegistry {
    transports: BTreeMap<String, Arc<dyn ChannelTransport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transport under its declared channel type. A later
    /// registration for the same type replaces the earlier one.
    pub fn register(&mut self, transport: Arc<dyn ChannelTransport>) {
        self.transports
            .insert(transport.channel_type().to_string(), transport);
    }

    pub fn get(&self, channel_type: &str) -> Option<Arc<dyn ChannelTransport>> {
        self.transports.get(channel_type).cloned()
    }

    pub fn channel_types(&self) -> Vec<String> {
        self.transports.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("channel_types", &self.channel_types())
            .finish()
    }
}
