use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use wren_channel::{ChannelMessage, TransportRegistry};

use crate::context::{OutgoingResponse, TurnContext};
use crate::failure::FailureEvent;
use crate::outcome::RoutingOutcome;
use crate::stage::PipelineStage;

/// Routing runs last in the pipeline.
pub const RESPONSE_ROUTING_ORDER: i32 = 60;

const RESPONSE_ROUTING_NAME: &str = "response_routing";

/// The privileged stage that delivers the visible reply.
///
/// This is the only component allowed to call channel transports. Other
/// stages hand it work through the context's outgoing-response slot. Real
/// responses are appended to session history after a successful send;
/// synthetic control text never is.
pub struct ResponseRoutingStage {
    transports: TransportRegistry,
    send_timeout: Duration,
}

impl ResponseRoutingStage {
    pub fn new(transports: TransportRegistry, send_timeout: Duration) -> Self {
        Self {
            transports,
            send_timeout,
        }
    }
}

#[async_trait]
impl PipelineStage for ResponseRoutingStage {
    fn name(&self) -> &str {
        RESPONSE_ROUTING_NAME
    }

    fn order(&self) -> i32 {
        RESPONSE_ROUTING_ORDER
    }

    fn should_process(&self, context: &TurnContext) -> bool {
        context
            .outgoing
            .as_ref()
            .is_some_and(OutgoingResponse::has_text)
    }

    async fn process(&self, context: &mut TurnContext) -> Result<()> {
        if let Some(transition) = &context.transition_request {
            debug!(
                target_stage = %transition.target,
                "pipeline transition pending, skipping response routing"
            );
            return Ok(());
        }

        let Some(outgoing) = context.outgoing.clone() else {
            return Ok(());
        };
        if !outgoing.has_text() {
            debug!("no response content to route");
            return Ok(());
        }

        if context.is_auto_mode() {
            // Autonomous turns run silently: record real output in history,
            // never touch the transport.
            if !outgoing.synthetic {
                let text = outgoing.text.clone().unwrap_or_default();
                let assistant = ChannelMessage::assistant(
                    context.session.channel_type.clone(),
                    context.session.chat_id.clone(),
                    text,
                );
                context.session.push_message(assistant);
            }
            return Ok(());
        }

        let channel_type = context.session.channel_type.clone();
        let Some(transport) = self.transports.get(&channel_type) else {
            warn!(channel_type = %channel_type, "no transport registered for channel type");
            return Ok(());
        };

        let chat_id = context.session.chat_id.clone();
        let text = outgoing.text.clone().unwrap_or_default();
        info!(
            chars = text.len(),
            channel_type = %channel_type,
            chat_id = %chat_id,
            "routing response"
        );

        let send = async {
            if outgoing.attachments.is_empty() {
                transport.send_message(&chat_id, &text).await
            } else {
                transport
                    .send_message_with_attachments(&chat_id, &text, &outgoing.attachments)
                    .await
            }
        };

        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(())) => {
                context.record_routing_outcome(RoutingOutcome::sent());
                if !outgoing.synthetic {
                    let assistant = ChannelMessage::assistant(channel_type, chat_id, text);
                    context.session.push_message(assistant);
                }
            }
            Ok(Err(send_error)) => {
                error!(error = %send_error, "failed to send response");
                context.add_failure(FailureEvent::routing_error(
                    RESPONSE_ROUTING_NAME,
                    send_error.to_string(),
                ));
                context.record_routing_outcome(RoutingOutcome::failed(send_error.to_string()));
            }
            Err(_) => {
                let timeout_message =
                    format!("send timed out after {}ms", self.send_timeout.as_millis());
                error!("{timeout_message}");
                context.add_failure(FailureEvent::routing_timeout(
                    RESPONSE_ROUTING_NAME,
                    timeout_message.clone(),
                ));
                context.record_routing_outcome(RoutingOutcome::failed(timeout_message));
            }
        }

        Ok(())
    }
}
