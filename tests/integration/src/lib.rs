//! Shared fixtures for wren integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use wren_agent_core::{OutgoingResponse, PipelineStage, StageTransition, TurnContext};
use wren_ai::{ChatRequest, ChatResponse, LlmBackend, LlmError};
use wren_channel::{ChannelError, ChannelTransport};

/// Initializes a test logging subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("wren_agent_core=debug,wren_session=debug")
        .with_test_writer()
        .try_init();
}

/// Transport that records every delivery instead of talking to a network.
pub struct RecordingTransport {
    channel: String,
    delivered: Mutex<Vec<(String, String)>>,
    typing: AtomicUsize,
}

impl RecordingTransport {
    pub fn new(channel: &str) -> Arc<Self> {
        Arc::new(Self {
            channel: channel.to_string(),
            delivered: Mutex::new(Vec::new()),
            typing: AtomicUsize::new(0),
        })
    }

    /// Delivered (chat id, text) pairs, in send order.
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().expect("delivered lock").clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().expect("delivered lock").len()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelTransport for RecordingTransport {
    fn channel_type(&self) -> &str {
        &self.channel
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        self.delivered
            .lock()
            .expect("delivered lock")
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn show_typing(&self, _transport_chat_id: &str) {
        self.typing.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend that answers every interpretation request with a fixed line.
pub struct ScriptedBackend {
    reply: String,
}

impl ScriptedBackend {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
        })
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse::text(self.reply.clone()))
    }
}

/// Stage that answers with an echo of the inbound text and finishes the
/// turn.
pub struct EchoStage;

#[async_trait]
impl PipelineStage for EchoStage {
    fn name(&self) -> &str {
        "echo"
    }

    fn order(&self) -> i32 {
        20
    }

    async fn process(&self, context: &mut TurnContext) -> Result<()> {
        let text = format!("echo: {}", context.inbound.text());
        context.outgoing = Some(OutgoingResponse::text_only(text));
        context.final_answer_ready = true;
        Ok(())
    }
}

/// Stage that requests another iteration forever, for cap tests.
pub struct RestlessStage;

#[async_trait]
impl PipelineStage for RestlessStage {
    fn name(&self) -> &str {
        "restless"
    }

    fn order(&self) -> i32 {
        20
    }

    async fn process(&self, context: &mut TurnContext) -> Result<()> {
        context.transition_request = Some(StageTransition::to("again"));
        Ok(())
    }
}
