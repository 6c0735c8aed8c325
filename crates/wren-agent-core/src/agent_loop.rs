//! The message-turn orchestrator.
//!
//! One call to [`AgentLoop::process_message`] drives an inbound message
//! through the rate-limit gate, session resolution, the stage iteration
//! loop, and the feedback guarantee, then saves the session. Internal
//! failures are captured as [`FailureEvent`]s and never escape the turn.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wren_ai::{ChatMessage, ChatRequest, LlmBackend};
use wren_channel::{ChannelMessage, TransportRegistry};
use wren_session::{bind_transport_identity, resolve_transport_chat_id, SessionStore};

use crate::catalog::{message_keys, MessageCatalog};
use crate::config::LoopConfig;
use crate::context::{attributes, OutgoingResponse, TurnContext};
use crate::failure::FailureEvent;
use crate::outcome::FinishReason;
use crate::rate_limit::RateLimiter;
use crate::routing::ResponseRoutingStage;
use crate::stage::{sort_stages, PipelineStage};
use crate::stop::StopSignal;

const LOG_CONTENT_MAX_CHARS: usize = 200;

const INTERPRET_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Explain the following error in 1-2 sentences for the user.";

/// Core orchestrator for one conversational turn.
///
/// Stages execute sequentially in ascending `order()` within each
/// iteration; the response routing stage is constructed here and is the
/// only component that touches channel transports.
pub struct AgentLoop {
    session_store: Arc<dyn SessionStore>,
    rate_limiter: Arc<dyn RateLimiter>,
    stages: Vec<Arc<dyn PipelineStage>>,
    routing: Arc<ResponseRoutingStage>,
    transports: TransportRegistry,
    llm: Arc<dyn LlmBackend>,
    catalog: Arc<dyn MessageCatalog>,
    config: LoopConfig,
}

impl AgentLoop {
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        rate_limiter: Arc<dyn RateLimiter>,
        stages: Vec<Arc<dyn PipelineStage>>,
        transports: TransportRegistry,
        llm: Arc<dyn LlmBackend>,
        catalog: Arc<dyn MessageCatalog>,
        config: LoopConfig,
    ) -> Self {
        let routing = Arc::new(ResponseRoutingStage::new(
            transports.clone(),
            Duration::from_millis(config.send_timeout_ms),
        ));

        let mut all_stages = stages;
        all_stages.push(routing.clone() as Arc<dyn PipelineStage>);
        let stages = sort_stages(all_stages);
        let stage_names: Vec<&str> = stages.iter().map(|stage| stage.name()).collect();
        debug!(stages = ?stage_names, "pipeline assembled");

        Self {
            session_store,
            rate_limiter,
            stages,
            routing,
            transports,
            llm,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Processes one inbound message to completion.
    pub async fn process_message(&self, message: ChannelMessage) {
        self.process_message_with_stop(&message, &StopSignal::new())
            .await;
    }

    /// Processes one inbound message, honoring a cooperative stop signal
    /// checked between iterations.
    pub async fn process_message_with_stop(&self, message: &ChannelMessage, stop: &StopSignal) {
        info!(
            channel_type = %message.channel_type,
            chat_id = %message.chat_id,
            sender_id = %message.sender_id,
            "incoming message"
        );
        debug!(content = %truncate_for_log(message.text()), "inbound content");

        let auto_mode = message.is_auto_mode();
        if !auto_mode {
            let gate = self.rate_limiter.try_consume();
            if !gate.allowed {
                warn!(
                    reason = gate.reason.as_deref().unwrap_or("rate limit exceeded"),
                    retry_after_ms = gate.retry_after.map(|wait| wait.as_millis() as u64),
                    "rate limit exceeded, dropping message"
                );
                return;
            }
        }

        let mut session = match self
            .session_store
            .get_or_create(&message.channel_type, &message.chat_id)
        {
            Ok(session) => session,
            Err(store_error) => {
                error!(error = %store_error, "failed to resolve session");
                return;
            }
        };
        debug!(
            session_id = %session.id,
            history = session.messages.len(),
            "session resolved"
        );

        if bind_transport_identity(&mut session, message) {
            debug!(session_id = %session.id, "bound transport identity from inbound metadata");
        }
        session.push_message(message.clone());

        let mut context = TurnContext::new(session, message.clone(), self.config.max_iterations);
        let typing_task = self.spawn_typing_refresh(&context);

        debug!(
            max_iterations = context.max_iterations,
            "starting agent loop"
        );
        self.run_loop(&mut context, stop).await;
        self.ensure_feedback(&mut context).await;

        if let Some(task) = typing_task {
            task.abort();
        }

        // Persist even after internal failures so the inbound message and
        // any history mutations survive a restart.
        if let Err(store_error) = self.session_store.save(&context.session) {
            error!(
                session_id = %context.session.id,
                error = %store_error,
                "failed to persist session"
            );
        }

        info!(session_id = %context.session.id, "message processing complete");
    }

    async fn run_loop(&self, context: &mut TurnContext, stop: &StopSignal) {
        let max_iterations = context.max_iterations;
        let mut reached_limit = false;
        let mut iteration = 0usize;

        while iteration < max_iterations {
            context.current_iteration = iteration;
            info!(
                iteration = iteration + 1,
                max_iterations, "running iteration"
            );

            for stage in &self.stages {
                if !stage.is_enabled() {
                    debug!(stage = stage.name(), "stage disabled, skipping");
                    continue;
                }
                if !stage.should_process(context) {
                    debug!(stage = stage.name(), "stage not applicable, skipping");
                    continue;
                }

                debug!(stage = stage.name(), order = stage.order(), "running stage");
                if let Err(stage_error) = stage.process(context).await {
                    error!(
                        stage = stage.name(),
                        error = %stage_error,
                        "stage failed"
                    );
                    context.add_failure(FailureEvent::stage_exception(
                        stage.name(),
                        stage_error.to_string(),
                    ));
                }
            }

            if stop.is_requested() {
                info!(
                    iteration = iteration + 1,
                    "stop requested, terminating turn early"
                );
                break;
            }

            if !should_continue(context) {
                info!(iterations = iteration + 1, "agent loop completed");
                break;
            }

            if iteration + 1 >= max_iterations {
                reached_limit = true;
                warn!(max_iterations, "reached iteration limit, stopping");
                break;
            }

            debug!("continuing to next iteration");
            context.reset_iteration_state();
            iteration += 1;
        }

        // The termination decision consumes any pending transition request.
        context.transition_request = None;

        if reached_limit {
            context.set_attribute(attributes::ITERATION_LIMIT_REACHED, serde_json::json!(true));
            context.set_finish_reason(FinishReason::IterationLimit);
            let cap = max_iterations.to_string();
            let notice = self
                .catalog
                .message(message_keys::ITERATION_LIMIT, &[cap.as_str()]);
            self.route_synthetic(context, notice).await;
        }
    }

    /// Post-loop rule ensuring the user always receives some message,
    /// barring the auto-mode and missing-transport skip conditions.
    async fn ensure_feedback(&self, context: &mut TurnContext) {
        if context.sent_text() {
            return;
        }
        if context.is_auto_mode() {
            return;
        }
        if self
            .transports
            .get(&context.session.channel_type)
            .is_none()
        {
            debug!(
                channel_type = %context.session.channel_type,
                "no transport registered, skipping feedback guarantee"
            );
            return;
        }

        if context
            .outgoing
            .as_ref()
            .is_some_and(OutgoingResponse::has_text)
        {
            info!("feedback guarantee: routing unsent response");
            self.route_response(context).await;
            if context.sent_text() {
                return;
            }
        }

        let errors = context.collect_error_messages();
        if !errors.is_empty() && self.llm.is_available() {
            if let Some(interpretation) = self.try_interpret_errors(&errors).await {
                let text = self
                    .catalog
                    .message(message_keys::ERROR_FEEDBACK, &[interpretation.trim()]);
                info!("feedback guarantee: routing interpreted error");
                context.set_finish_reason(FinishReason::Error);
                self.route_synthetic(context, text).await;
                if context.sent_text() {
                    return;
                }
            }
        }

        info!("feedback guarantee: routing generic feedback");
        let generic = self.catalog.message(message_keys::GENERIC_FEEDBACK, &[]);
        self.route_synthetic(context, generic).await;
    }

    /// Invokes the routing stage outside the pipeline flow. The loop never
    /// performs transport calls itself.
    async fn route_response(&self, context: &mut TurnContext) {
        if !self.routing.should_process(context) {
            return;
        }
        if let Err(routing_error) = self.routing.process(context).await {
            context.add_failure(FailureEvent::routing_error(
                self.routing.name(),
                routing_error.to_string(),
            ));
        }
    }

    async fn route_synthetic(&self, context: &mut TurnContext, text: String) {
        context.outgoing = Some(OutgoingResponse::synthetic(text));
        self.route_response(context).await;
    }

    /// Asks the LLM backend to turn collected failures into one short
    /// user-facing sentence, bounded by the configured timeout.
    async fn try_interpret_errors(&self, errors: &[String]) -> Option<String> {
        let summary = errors.join("\n");
        let request = ChatRequest::new(
            self.config.interpret_model.clone(),
            vec![ChatMessage::user(summary)],
        )
        .with_system_prompt(INTERPRET_SYSTEM_PROMPT);

        let timeout = Duration::from_millis(self.config.interpret_timeout_ms);
        match tokio::time::timeout(timeout, self.llm.chat(request)).await {
            Ok(Ok(response)) if !response.content.trim().is_empty() => Some(response.content),
            Ok(Ok(_)) => {
                debug!("error interpretation returned empty content");
                None
            }
            Ok(Err(llm_error)) => {
                debug!(error = %llm_error, "error interpretation failed");
                None
            }
            Err(_) => {
                debug!(
                    timeout_ms = self.config.interpret_timeout_ms,
                    "error interpretation timed out"
                );
                None
            }
        }
    }

    fn spawn_typing_refresh(&self, context: &TurnContext) -> Option<JoinHandle<()>> {
        if self.config.typing_interval_secs == 0 {
            return None;
        }
        let transport = self.transports.get(&context.session.channel_type)?;
        let transport_chat_id = resolve_transport_chat_id(&context.session).to_string();
        let period = Duration::from_secs(self.config.typing_interval_secs);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                transport.show_typing(&transport_chat_id).await;
            }
        }))
    }
}

/// Termination priority: no transition request means the turn is done, and
/// an explicit final answer wins even when a transition is also present.
fn should_continue(context: &TurnContext) -> bool {
    context.transition_request.is_some() && !context.final_answer_ready
}

fn truncate_for_log(text: &str) -> String {
    let total_chars = text.chars().count();
    if total_chars <= LOG_CONTENT_MAX_CHARS {
        return text.to_string();
    }
    let truncate_at = text
        .char_indices()
        .nth(LOG_CONTENT_MAX_CHARS)
        .map(|(index, _)| index)
        .unwrap_or(text.len());
    let mut truncated = text[..truncate_at].to_string();
    truncated.push('…');
    truncated
}
