//! Streaming response accumulation.
//!
//! [`Accumulator::complete`] drives one request's event stream to the end and
//! folds it into a single [`TurnResult`]: ordered content blocks, stop state,
//! and token usage. While folding, each text/partial-JSON fragment can be
//! republished on a channel so the display can render the response live.
//!
//! The fragment channel is closed exactly once on every exit path — the
//! sender is moved into the fold and dropped when it returns, success or
//! error.

use futures::{pin_mut, Stream, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::api::{ApiError, Client, MessageRequest, StreamEvent};
use crate::message::{BlockType, ContentBlock};

/// One incremental fragment republished for live display.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
}

/// A completed model turn.
#[derive(Debug, Clone, Default)]
pub struct TurnResult {
    pub content_blocks: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Folds one request's event stream into a [`TurnResult`].
pub struct Accumulator<'a> {
    client: &'a Client,
}

impl<'a> Accumulator<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Runs one request to completion.
    ///
    /// Streaming mode is forced on the request. If `fragments` is given,
    /// every delta fragment is published on it in arrival order; the channel
    /// closes when this returns.
    pub async fn complete(
        &self,
        mut request: MessageRequest,
        fragments: Option<UnboundedSender<Fragment>>,
    ) -> Result<TurnResult, ApiError> {
        request.stream = true;
        let stream = self.client.stream(&request).await?;
        accumulate(stream, fragments).await
    }
}

/// The fold itself, separated from transport so tests can feed scripted
/// event sequences.
async fn accumulate<S>(
    stream: S,
    fragments: Option<UnboundedSender<Fragment>>,
) -> Result<TurnResult, ApiError>
where
    S: Stream<Item = Result<StreamEvent, ApiError>>,
{
    pin_mut!(stream);

    let mut result = TurnResult::default();

    // Scratch state for the block currently being assembled. A block is
    // finalized only by its stop event; an error mid-block discards it.
    let mut block_type = BlockType::Text;
    let mut block_index = 0usize;
    let mut tool_name: Option<String> = None;
    let mut tool_id: Option<String> = None;
    let mut builder = String::new();

    while let Some(event) = stream.next().await {
        let event = event?;
        debug!(target: "kumo.stream", ?event, "stream event");

        match event {
            StreamEvent::MessageStart { message } => {
                result.stop_reason = message.stop_reason;
                result.stop_sequence = message.stop_sequence;
                result.input_tokens = message.usage.input_tokens;
                result.output_tokens = message.usage.output_tokens;
            }
            StreamEvent::ContentBlockStart { index, content_block } => {
                block_type = content_block.block_type;
                block_index = index;
                tool_name = content_block.name;
                tool_id = content_block.id;
                builder.clear();
                builder.push_str(&content_block.text);
            }
            StreamEvent::ContentBlockDelta { delta, .. } => {
                if let Some(text) = &delta.text {
                    builder.push_str(text);
                }
                if let Some(json) = &delta.partial_json {
                    builder.push_str(json);
                }
                if let Some(tx) = &fragments {
                    let text = delta.text.or(delta.partial_json).unwrap_or_default();
                    let _ = tx.send(Fragment { text });
                }
            }
            StreamEvent::ContentBlockStop { .. } => {
                result.content_blocks.push(ContentBlock {
                    block_type,
                    text: std::mem::take(&mut builder),
                    index: block_index,
                    tool_name: tool_name.take(),
                    tool_id: tool_id.take(),
                });
            }
            StreamEvent::MessageDelta { delta, usage } => {
                result.stop_reason = delta.stop_reason;
                result.stop_sequence = delta.stop_sequence;
                if let Some(usage) = usage {
                    result.output_tokens = usage.output_tokens;
                }
            }
            StreamEvent::MessageStop => {}
            StreamEvent::Ping => {}
            StreamEvent::Error { error } => return Err(error.into()),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BlockStart, Delta, ErrorBody, MessageDeltaFields, StartMessage, Usage, UsageDelta};
    use futures::stream;
    use tokio::sync::mpsc;

    fn text_start(index: usize, seed: &str) -> StreamEvent {
        StreamEvent::ContentBlockStart {
            index,
            content_block: BlockStart {
                block_type: BlockType::Text,
                text: seed.to_string(),
                id: None,
                name: None,
            },
        }
    }

    fn text_delta(index: usize, text: &str) -> StreamEvent {
        StreamEvent::ContentBlockDelta {
            index,
            delta: Delta {
                text: Some(text.to_string()),
                partial_json: None,
            },
        }
    }

    fn start_event(input_tokens: u64) -> StreamEvent {
        StreamEvent::MessageStart {
            message: StartMessage {
                stop_reason: None,
                stop_sequence: None,
                usage: Usage {
                    input_tokens,
                    output_tokens: 1,
                },
            },
        }
    }

    async fn run(
        events: Vec<Result<StreamEvent, ApiError>>,
        fragments: Option<UnboundedSender<Fragment>>,
    ) -> Result<TurnResult, ApiError> {
        accumulate(stream::iter(events), fragments).await
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<Fragment>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(frag) = rx.try_recv() {
            out.push(frag.text);
        }
        // The sender must be gone by now.
        assert!(rx.try_recv().is_err());
        out
    }

    #[tokio::test]
    async fn folds_fragments_in_arrival_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = vec![
            Ok(start_event(12)),
            Ok(text_start(0, "He")),
            Ok(text_delta(0, "llo ")),
            Ok(text_delta(0, "world")),
            Ok(StreamEvent::ContentBlockStop { index: 0 }),
            Ok(StreamEvent::MessageDelta {
                delta: MessageDeltaFields {
                    stop_reason: Some("end_turn".to_string()),
                    stop_sequence: None,
                },
                usage: Some(UsageDelta { output_tokens: 9 }),
            }),
            Ok(StreamEvent::MessageStop),
        ];

        let result = run(events, Some(tx)).await.unwrap();

        assert_eq!(result.content_blocks.len(), 1);
        assert_eq!(result.content_blocks[0].text, "Hello world");
        assert_eq!(result.content_blocks[0].index, 0);
        assert_eq!(result.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(result.input_tokens, 12);
        assert_eq!(result.output_tokens, 9);

        // Every delta fragment arrived, in order, and the channel is closed.
        assert_eq!(drain(rx), vec!["llo ", "world"]);
    }

    #[tokio::test]
    async fn pings_are_ignored_and_blocks_keep_their_order() {
        let events = vec![
            Ok(start_event(3)),
            Ok(StreamEvent::Ping),
            Ok(text_start(0, "first")),
            Ok(StreamEvent::ContentBlockStop { index: 0 }),
            Ok(StreamEvent::Ping),
            Ok(StreamEvent::ContentBlockStart {
                index: 1,
                content_block: BlockStart {
                    block_type: BlockType::ToolUse,
                    text: String::new(),
                    id: Some("tu_1".to_string()),
                    name: Some("cat".to_string()),
                },
            }),
            Ok(StreamEvent::ContentBlockDelta {
                index: 1,
                delta: Delta {
                    text: None,
                    partial_json: Some("{\"filename\":".to_string()),
                },
            }),
            Ok(StreamEvent::ContentBlockDelta {
                index: 1,
                delta: Delta {
                    text: None,
                    partial_json: Some("\"a.txt\"}".to_string()),
                },
            }),
            Ok(StreamEvent::ContentBlockStop { index: 1 }),
            Ok(StreamEvent::MessageStop),
        ];

        let result = run(events, None).await.unwrap();

        assert_eq!(result.content_blocks.len(), 2);
        assert_eq!(result.content_blocks[0].text, "first");
        assert_eq!(result.content_blocks[1].block_type, BlockType::ToolUse);
        assert_eq!(result.content_blocks[1].index, 1);
        assert_eq!(result.content_blocks[1].text, "{\"filename\":\"a.txt\"}");
        assert_eq!(result.content_blocks[1].tool_name.as_deref(), Some("cat"));
        assert_eq!(result.content_blocks[1].tool_id.as_deref(), Some("tu_1"));
    }

    #[tokio::test]
    async fn literal_text_wins_over_partial_json_on_the_side_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = vec![
            Ok(text_start(0, "")),
            Ok(StreamEvent::ContentBlockDelta {
                index: 0,
                delta: Delta {
                    text: Some("visible".to_string()),
                    partial_json: Some("{\"x\":1}".to_string()),
                },
            }),
            Ok(StreamEvent::ContentBlockStop { index: 0 }),
        ];

        let result = run(events, Some(tx)).await.unwrap();

        // The builder keeps both, the channel gets the literal text.
        assert_eq!(result.content_blocks[0].text, "visible{\"x\":1}");
        assert_eq!(drain(rx), vec!["visible"]);
    }

    #[tokio::test]
    async fn error_event_aborts_without_finalizing_the_open_block() {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = vec![
            Ok(start_event(1)),
            Ok(text_start(0, "partial")),
            Ok(StreamEvent::Error {
                error: ErrorBody {
                    error_type: "overloaded_error".to_string(),
                    message: "try later".to_string(),
                },
            }),
        ];

        let err = run(events, Some(tx)).await.unwrap_err();
        match err {
            ApiError::Api { error_type, .. } => assert_eq!(error_type, "overloaded_error"),
            other => panic!("wrong error: {other:?}"),
        }
        // Closed exactly once on the error path too.
        assert!(drain(rx).is_empty());
    }

    #[tokio::test]
    async fn decode_failures_propagate() {
        let events = vec![
            Ok(start_event(1)),
            Err(ApiError::UnexpectedEvent("content_block_shimmer".to_string())),
        ];
        let err = run(events, None).await.unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedEvent(_)));
    }

    #[tokio::test]
    async fn message_delta_overwrites_preliminary_stop_state() {
        let events = vec![
            Ok(StreamEvent::MessageStart {
                message: StartMessage {
                    stop_reason: Some("max_tokens".to_string()),
                    stop_sequence: None,
                    usage: Usage::default(),
                },
            }),
            Ok(StreamEvent::MessageDelta {
                delta: MessageDeltaFields {
                    stop_reason: Some("stop_sequence".to_string()),
                    stop_sequence: Some("#P,invoke".to_string()),
                },
                usage: None,
            }),
            Ok(StreamEvent::MessageStop),
        ];

        let result = run(events, None).await.unwrap();
        assert_eq!(result.stop_reason.as_deref(), Some("stop_sequence"));
        assert_eq!(result.stop_sequence.as_deref(), Some("#P,invoke"));
    }
}
