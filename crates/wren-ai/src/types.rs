use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `MessageRole` values.
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// A single chat turn handed to an LLM provider.
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: text.into(),
            timestamp: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: text.into(),
            timestamp: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: text.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Chat completion request shape shared by all backends.
pub struct ChatRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
/// Token accounting reported by a backend for one completion.
pub struct ChatUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Chat completion response shape shared by all backends.
pub struct ChatResponse {
    pub content: String,
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub usage: ChatUsage,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: Some("stop".to_string()),
            usage: ChatUsage::default(),
        }
    }
}

#[derive(Debug, Error)]
/// Enumerates supported `LlmError` values.
pub enum LlmError {
    #[error("no LLM backend is configured")]
    Unavailable,
    #[error("backend returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("backend error: {0}")]
    Backend(String),
}

#[async_trait]
/// Trait contract for `LlmBackend` behavior.
///
/// The agent loop consults `is_available` before issuing any request so a
/// missing provider degrades to the generic feedback path instead of an
/// error surfaced to the user.
pub trait LlmBackend: Send + Sync {
    fn provider_id(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Backend used when no provider is configured. Never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLlmBackend;

#[async_trait]
impl LlmBackend for NoopLlmBackend {
    fn provider_id(&self) -> &str {
        "noop"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
        Err(LlmError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::{ChatMessage, ChatRequest, LlmBackend, LlmError, NoopLlmBackend};

    #[test]
    fn builds_request_with_system_prompt() {
        let request = ChatRequest::new("wren-mini", vec![ChatMessage::user("hello")])
            .with_system_prompt("be brief");
        assert_eq!(request.system_prompt.as_deref(), Some("be brief"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "hello");
    }

    #[tokio::test]
    async fn noop_backend_is_never_available() {
        let backend = NoopLlmBackend;
        assert!(!backend.is_available());
        let result = backend
            .chat(ChatRequest::new("wren-mini", vec![ChatMessage::user("hi")]))
            .await;
        assert!(matches!(result, Err(LlmError::Unavailable)));
    }
}
