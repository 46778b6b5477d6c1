//! Wire types and error taxonomy for the Messages API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{BlockType, Role, Turn};

/// Errors surfaced by the API client and the event stream.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-2xx HTTP response, with whatever body text the server sent.
    #[error("api error (HTTP {status}): {message}")]
    Status { status: u16, message: String },
    /// A typed error delivered by the server, either as an HTTP error body
    /// or as an `error` event mid-stream.
    #[error("{error_type}: {message}")]
    Api { error_type: String, message: String },
    #[error("stream decode error: {0}")]
    Stream(String),
    /// The server sent an event type this client does not know about.
    #[error("unexpected event type: {0}")]
    UnexpectedEvent(String),
}

/// One streaming completion request.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    pub stream: bool,
    pub messages: Vec<WireMessage>,
}

/// A conversation turn in the request body.
#[derive(Debug, Clone, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: Vec<WireBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireBlock {
    #[serde(rename = "type")]
    pub block_type: &'static str,
    pub text: String,
}

impl From<&Turn> for WireMessage {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        let content = turn
            .blocks
            .iter()
            .filter(|b| b.block_type == BlockType::Text)
            .map(|b| WireBlock {
                block_type: "text",
                text: b.text.clone(),
            })
            .collect();
        Self { role, content }
    }
}

/// A typed event decoded from the SSE stream of one request.
///
/// The set is closed: the decoder rejects any event name outside it with
/// [`ApiError::UnexpectedEvent`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart { message: StartMessage },
    ContentBlockStart { index: usize, content_block: BlockStart },
    ContentBlockDelta { index: usize, delta: Delta },
    ContentBlockStop { index: usize },
    MessageDelta { delta: MessageDeltaFields, usage: Option<UsageDelta> },
    MessageStop,
    Ping,
    Error { error: ErrorBody },
}

/// Preliminary turn metadata carried by `message_start`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartMessage {
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Identity of a new content block carried by `content_block_start`.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockStart {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// An incremental fragment for the current block. Text deltas carry `text`,
/// tool-use deltas carry `partial_json`; both fields are optional so the
/// decoder accepts either shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub partial_json: Option<String>,
}

/// Final stop state carried by `message_delta`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDeltaFields {
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UsageDelta {
    pub output_tokens: u64,
}

/// Typed error payload, shared by HTTP error bodies and `error` events.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl From<ErrorBody> for ApiError {
    fn from(body: ErrorBody) -> Self {
        ApiError::Api {
            error_type: body.error_type,
            message: body.message,
        }
    }
}
