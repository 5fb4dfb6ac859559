use super::errors::ModelError;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlates the call with its result.
    pub id: String,
    pub name: String,
    pub input: Value,
    /// Opaque provider token that must be echoed back with the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Outcome of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome {
    Success { output: Value },
    Error { message: String },
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// The result the runtime returned for a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub outcome: ToolOutcome,
}

/// A part of a message, which can be text or a tool interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// A message, consisting of a role and one or more parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Tool results travel back to the model on the user side.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            parts: results.into_iter().map(Part::ToolResult).collect(),
        }
    }

    /// Get combined text content from all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Extract all tool calls from this message.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }
}

/// A tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the input.
    pub schema: Value,
}

/// One candidate's share of a streamed chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub parts: Vec<Part>,
}

/// A fragment of streamed model output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub candidates: Vec<Candidate>,
}

impl StreamChunk {
    /// A chunk with a single candidate holding one text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::from_parts(vec![Part::Text(text.into())])
    }

    /// A chunk with a single candidate.
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            candidates: vec![Candidate { parts }],
        }
    }

    /// Every part of every candidate, in arrival order.
    pub fn into_parts(self) -> impl Iterator<Item = Part> {
        self.candidates.into_iter().flat_map(|c| c.parts)
    }
}

/// A finite, single-pass stream of chunks for one model round.
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, ModelError>>;

/// Everything needed for a model request.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
    pub system: Option<&'a str>,
    pub temperature: f32,
}

/// Trait for LLM provider backends.
pub trait Backend: Send + Sync {
    /// Start a streamed response.
    ///
    /// Errors before the first chunk are returned here; later ones arrive
    /// through the stream.
    fn stream(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ChunkStream, ModelError>> + Send;
}
