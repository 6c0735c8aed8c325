use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wren_channel::{Attachment, ChannelMessage};
use wren_session::AgentSession;

use crate::failure::FailureEvent;
use crate::outcome::{FinishReason, RoutingOutcome, TurnOutcome};

/// Attribute keys used for loosely-coupled signalling between stages.
/// Control-flow signals have typed fields on [`TurnContext`] instead.
pub mod attributes {
    /// String: error message from the LLM execution stage.
    pub const LLM_ERROR: &str = "llm.error";

    /// Boolean: the iteration cap was hit for this turn.
    pub const ITERATION_LIMIT_REACHED: &str = "iteration.limit.reached";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Result of one tool invocation, correlated with the originating call.
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub content: Value,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content,
            is_error: false,
        }
    }

    pub fn error(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content,
            is_error: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Request from a stage to run another iteration, typically after switching
/// the active skill/pipeline. Its presence is what keeps the loop going.
pub struct StageTransition {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StageTransition {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Transport-oriented response produced by domain stages (or the
/// orchestrator itself) and consumed by response routing.
///
/// `synthetic` marks orchestration-originated control text (iteration-limit
/// notice, fallback feedback): it is delivered to the transport but never
/// appended to durable session history.
pub struct OutgoingResponse {
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub synthetic: bool,
}

impl OutgoingResponse {
    pub fn text_only(content: impl Into<String>) -> Self {
        Self {
            text: Some(content.into()),
            attachments: Vec::new(),
            synthetic: false,
        }
    }

    pub fn synthetic(content: impl Into<String>) -> Self {
        Self {
            text: Some(content.into()),
            attachments: Vec::new(),
            synthetic: true,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn has_text(&self) -> bool {
        self.text
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }
}

/// Mutable state for one turn. Owned exclusively by the turn processing it
/// and threaded by unique reference through every stage call; never shared
/// across turns.
#[derive(Debug)]
pub struct TurnContext {
    pub session: AgentSession,
    pub inbound: ChannelMessage,
    /// Snapshot of session history including the inbound message.
    pub messages: Vec<ChannelMessage>,
    pub current_iteration: usize,
    pub max_iterations: usize,

    attributes: BTreeMap<String, Value>,

    // Per-iteration fields, cleared by `reset_iteration_state`.
    pub final_answer_ready: bool,
    pub transition_request: Option<StageTransition>,
    pub tool_results: Vec<ToolResult>,

    // Accumulated for the whole turn.
    pub failures: Vec<FailureEvent>,
    pub turn_outcome: Option<TurnOutcome>,
    pub outgoing: Option<OutgoingResponse>,
}

impl TurnContext {
    pub fn new(session: AgentSession, inbound: ChannelMessage, max_iterations: usize) -> Self {
        let messages = session.messages.clone();
        Self {
            session,
            inbound,
            messages,
            current_iteration: 0,
            max_iterations,
            attributes: BTreeMap::new(),
            final_answer_ready: false,
            transition_request: None,
            tool_results: Vec::new(),
            failures: Vec::new(),
            turn_outcome: None,
            outgoing: None,
        }
    }

    /// Clears exactly the per-iteration fields. Failures, the iteration
    /// counter, the outgoing slot, and the attribute bag survive.
    pub fn reset_iteration_state(&mut self) {
        self.final_answer_ready = false;
        self.transition_request = None;
        self.tool_results.clear();
    }

    pub fn set_attribute(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn attribute_bool(&self, key: &str) -> bool {
        matches!(self.attributes.get(key), Some(Value::Bool(true)))
    }

    pub fn add_failure(&mut self, failure: FailureEvent) {
        self.failures.push(failure);
    }

    pub fn is_auto_mode(&self) -> bool {
        self.inbound.is_auto_mode()
    }

    /// True once routing has successfully delivered text this turn.
    pub fn sent_text(&self) -> bool {
        self.turn_outcome
            .as_ref()
            .is_some_and(TurnOutcome::sent_text)
    }

    /// Sets the turn's finish reason, preserving any routing record.
    pub fn set_finish_reason(&mut self, finish_reason: FinishReason) {
        match &mut self.turn_outcome {
            Some(outcome) => outcome.finish_reason = finish_reason,
            None => self.turn_outcome = Some(TurnOutcome::new(finish_reason)),
        }
    }

    /// Merges a routing record into the turn outcome.
    pub fn record_routing_outcome(&mut self, routing: RoutingOutcome) {
        match &mut self.turn_outcome {
            Some(outcome) => outcome.routing = Some(routing),
            None => {
                self.turn_outcome =
                    Some(TurnOutcome::new(FinishReason::Normal).with_routing(routing));
            }
        }
    }

    /// Collects every error message the feedback guarantee may interpret:
    /// the LLM error attribute, failure events, and routing errors.
    pub fn collect_error_messages(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(llm_error) = self.attribute_str(attributes::LLM_ERROR) {
            errors.push(llm_error.to_string());
        }
        for failure in &self.failures {
            if !failure.message.is_empty() {
                errors.push(failure.message.clone());
            }
        }
        if let Some(error) = self
            .turn_outcome
            .as_ref()
            .and_then(|outcome| outcome.routing.as_ref())
            .and_then(|routing| routing.error.as_ref())
        {
            errors.push(error.clone());
        }
        errors
    }
}
