//! Channel transport contract and inbound message shape.
//!
//! A transport delivers agent output to one channel type (Telegram, web,
//! webhook). The agent loop only talks to transports through the
//! [`ChannelTransport`] trait and resolves them per channel type via
//! [`TransportRegistry`], so transports stay external collaborators.
mod message;
mod transport;

pub use message::{metadata_keys, Attachment, ChannelMessage};
pub use transport::{ChannelError, ChannelTransport, TransportRegistry};
