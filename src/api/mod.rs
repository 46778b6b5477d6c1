//! Thin client for the Anthropic Messages API.
//!
//! Owns the wire request types, the typed stream-event decoding, and the
//! error taxonomy. Everything above this module works with [`StreamEvent`]s
//! and never touches HTTP or SSE framing directly.

mod client;
pub mod models;
mod types;

pub use client::Client;
pub use types::{
    ApiError, BlockStart, Delta, ErrorBody, MessageDeltaFields, MessageRequest, StartMessage,
    StreamEvent, Usage, UsageDelta, WireMessage,
};
