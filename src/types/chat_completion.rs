use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Fragment, Turn};

/// Body of a `chat/completions` request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// Identifier of the model to run.
    pub model: String,

    /// The conversation so far, oldest turn first.
    pub messages: Vec<Turn>,

    /// Upper bound on generated tokens.
    pub max_tokens: u32,

    /// Whether the response should arrive as server-sent events.
    pub stream: bool,
}

impl CompletionRequest {
    /// Create a streaming request for `model` over `messages`.
    pub fn streaming(model: impl Into<String>, messages: Vec<Turn>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
            stream: true,
        }
    }
}

/// One server-sent chunk of a streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChatCompletionChunk {
    /// Chunk identifier, shared by every chunk of one completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Incremental choices; the chat front-end only reads the first.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A choice within a streamed chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChunkChoice {
    /// Index of the choice.
    #[serde(default)]
    pub index: u32,

    /// The incremental update.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Why generation stopped, on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Incremental content carried by a chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChunkDelta {
    /// Role, present on the first chunk only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Text delta. Some providers send structured content parts here instead
    /// of a string, so the raw JSON value is kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl ChatCompletionChunk {
    /// The fragment carried by the first choice, if any.
    ///
    /// Absent, null and empty-string deltas carry nothing.
    pub fn fragment(&self) -> Option<Fragment> {
        let content = self.choices.first()?.delta.content.as_ref()?;
        match content {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(Fragment::Text(text.clone())),
            other => Some(Fragment::Item(other.clone())),
        }
    }
}

/// A non-streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChatCompletion {
    /// Completion identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Generated choices.
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

/// A choice within a non-streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompletionChoice {
    /// Index of the choice.
    #[serde(default)]
    pub index: u32,

    /// The generated message.
    #[serde(default)]
    pub message: CompletionMessage,
}

/// Message produced by a non-streamed completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompletionMessage {
    /// Role of the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Full text of the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatCompletion {
    /// Text of the first choice, or the empty string when there is none.
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }
}
