//! LLM backend port consumed by the wren agent loop.
mod types;

pub use types::{
    ChatMessage, ChatRequest, ChatResponse, ChatUsage, LlmBackend, LlmError, MessageRole,
    NoopLlmBackend,
};
