//! HTTP transport and SSE event decoding.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use super::types::{ApiError, ErrorBody, MessageRequest, StreamEvent};
use crate::constants::{API_BASE_URL, API_VERSION};

/// Event names this client understands. Anything else is a protocol error.
const KNOWN_EVENTS: &[&str] = &[
    "message_start",
    "content_block_start",
    "content_block_delta",
    "content_block_stop",
    "message_delta",
    "message_stop",
    "ping",
    "error",
];

/// A configured Messages API client.
pub struct Client {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

/// Error envelope returned in non-2xx HTTP bodies.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl Client {
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.unwrap_or(API_BASE_URL).trim_end_matches('/').to_string(),
        }
    }

    /// Issues one streaming request and returns the decoded event stream.
    ///
    /// HTTP-level failures are reported before any event is produced;
    /// after that, every item is one decoded [`StreamEvent`] or the error
    /// that ended the stream.
    pub async fn stream(
        &self,
        request: &MessageRequest,
    ) -> Result<impl Stream<Item = Result<StreamEvent, ApiError>>, ApiError> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status.as_u16(), &body));
        }

        Ok(response.bytes_stream().eventsource().map(|item| match item {
            Ok(event) => decode_event(&event.event, &event.data),
            Err(err) => Err(ApiError::Stream(err.to_string())),
        }))
    }
}

/// Maps a non-2xx response to the typed error when the body carries one.
fn classify_http_error(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.into(),
        Err(_) => ApiError::Status {
            status,
            message: body.to_string(),
        },
    }
}

/// Decodes one SSE event into a [`StreamEvent`].
///
/// The event name is checked against the closed known set first so an
/// unrecognized type fails as a protocol error rather than a decode error.
fn decode_event(event: &str, data: &str) -> Result<StreamEvent, ApiError> {
    if !KNOWN_EVENTS.contains(&event) {
        return Err(ApiError::UnexpectedEvent(event.to_string()));
    }
    serde_json::from_str(data)
        .map_err(|err| ApiError::Stream(format!("bad {event} payload: {err}: {data}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::BlockType;

    #[test]
    fn decodes_message_start() {
        let data = r#"{"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":12,"output_tokens":1}}}"#;
        let event = decode_event("message_start", data).unwrap();
        match event {
            StreamEvent::MessageStart { message } => {
                assert_eq!(message.usage.input_tokens, 12);
                assert_eq!(message.stop_reason, None);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn decodes_text_block_start_and_delta() {
        let start = decode_event(
            "content_block_start",
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":"hi"}}"#,
        )
        .unwrap();
        match start {
            StreamEvent::ContentBlockStart { index, content_block } => {
                assert_eq!(index, 0);
                assert_eq!(content_block.block_type, BlockType::Text);
                assert_eq!(content_block.text, "hi");
            }
            other => panic!("wrong event: {other:?}"),
        }

        let delta = decode_event(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":" there"}}"#,
        )
        .unwrap();
        match delta {
            StreamEvent::ContentBlockDelta { delta, .. } => {
                assert_eq!(delta.text.as_deref(), Some(" there"));
                assert_eq!(delta.partial_json, None);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn decodes_tool_use_block_start() {
        let event = decode_event(
            "content_block_start",
            r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"tu_1","name":"cat","input":{}}}"#,
        )
        .unwrap();
        match event {
            StreamEvent::ContentBlockStart { content_block, .. } => {
                assert_eq!(content_block.block_type, BlockType::ToolUse);
                assert_eq!(content_block.name.as_deref(), Some("cat"));
                assert_eq!(content_block.id.as_deref(), Some("tu_1"));
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn decodes_message_delta_with_usage() {
        let event = decode_event(
            "message_delta",
            r##"{"type":"message_delta","delta":{"stop_reason":"stop_sequence","stop_sequence":"#P,invoke"},"usage":{"output_tokens":42}}"##,
        )
        .unwrap();
        match event {
            StreamEvent::MessageDelta { delta, usage } => {
                assert_eq!(delta.stop_reason.as_deref(), Some("stop_sequence"));
                assert_eq!(delta.stop_sequence.as_deref(), Some("#P,invoke"));
                assert_eq!(usage.unwrap().output_tokens, 42);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_name_is_a_protocol_error() {
        let err = decode_event("content_block_shimmer", "{}").unwrap_err();
        match err {
            ApiError::UnexpectedEvent(name) => assert_eq!(name, "content_block_shimmer"),
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[test]
    fn malformed_payload_is_a_stream_error() {
        let err = decode_event("message_delta", "{not json").unwrap_err();
        assert!(matches!(err, ApiError::Stream(_)));
    }

    #[test]
    fn classifies_typed_http_error_bodies() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"try later"}}"#;
        match classify_http_error(529, body) {
            ApiError::Api { error_type, message } => {
                assert_eq!(error_type, "overloaded_error");
                assert_eq!(message, "try later");
            }
            other => panic!("wrong error: {other:?}"),
        }

        match classify_http_error(500, "gateway exploded") {
            ApiError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "gateway exploded");
            }
            other => panic!("wrong error: {other:?}"),
        }
    }
}
