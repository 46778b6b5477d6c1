//! Conversation history types.
//!
//! A conversation is an ordered sequence of [`Turn`]s, each holding one or
//! more [`ContentBlock`]s. Turns are immutable once appended; only the
//! sequence itself grows. These are kumo's internal types, converted to the
//! wire format in [`crate::api`] when a request is issued.

use serde::Deserialize;

/// The role of a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// The type of a content block within a model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Text,
    ToolUse,
}

/// One typed unit of a response turn, assembled incrementally by the
/// accumulator and finalized exactly once per block-stop event.
///
/// `index` is stable within one turn and has no cross-turn meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub block_type: BlockType,
    pub text: String,
    pub index: usize,
    pub tool_name: Option<String>,
    pub tool_id: Option<String>,
}

impl ContentBlock {
    pub fn text(index: usize, text: impl Into<String>) -> Self {
        Self {
            block_type: BlockType::Text,
            text: text.into(),
            index,
            tool_name: None,
            tool_id: None,
        }
    }
}

/// A single role-tagged entry in conversation history.
#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
}

impl Turn {
    /// A user turn holding one text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![ContentBlock::text(0, text)],
        }
    }

    /// An assistant turn built from accumulated content blocks.
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            blocks,
        }
    }

    /// The concatenated text of all blocks, for display.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}
