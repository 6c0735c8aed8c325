//! Turn orchestration core for the wren conversational agent.
//!
//! The [`AgentLoop`] drives one inbound message through an ordered pipeline
//! of [`PipelineStage`]s until a reply is ready or the iteration cap is
//! hit, and guarantees the user receives some response even when internal
//! stages fail. The [`SessionRunCoordinator`] keeps turns for the same
//! session sequential while different sessions run in parallel.
mod agent_loop;
mod catalog;
mod config;
mod context;
mod coordinator;
mod failure;
mod outcome;
mod rate_limit;
mod routing;
mod stage;
mod stop;

pub use agent_loop::AgentLoop;
pub use catalog::{message_keys, MessageCatalog, StaticMessageCatalog};
pub use config::{LoopConfig, RateLimitConfig};
pub use context::{
    attributes, OutgoingResponse, StageTransition, ToolResult, TurnContext,
};
pub use coordinator::SessionRunCoordinator;
pub use failure::{FailureEvent, FailureKind, FailureSource};
pub use outcome::{FinishReason, RoutingOutcome, TurnOutcome};
pub use rate_limit::{RateLimitResult, RateLimiter, TokenBucket, TokenBucketRateLimiter};
pub use routing::{ResponseRoutingStage, RESPONSE_ROUTING_ORDER};
pub use stage::PipelineStage;
pub use stop::StopSignal;
