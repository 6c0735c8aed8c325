//! Durable per-conversation session state and its stores.
//!
//! One [`AgentSession`] exists per (channel type, chat id). The agent loop
//! loads it once per turn, appends messages, and saves it once per turn.
//! There is no optimistic-concurrency check, so the per-session run
//! coordinator keeps writers exclusive.
mod identity;
mod session;
mod store;

pub use identity::{
    bind_transport_identity, resolve_conversation_key, resolve_transport_chat_id,
};
pub use session::{session_id, AgentSession};
pub use store::{InMemorySessionStore, JsonSessionStore, SessionStore, SessionStoreError};
