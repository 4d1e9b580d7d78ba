//! Chat Completions wire format types

use serde::{Deserialize, Serialize};

// -- Request types --

/// Chat completion request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<OpenAiMessage>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling threshold
    pub top_p: f64,
    /// Frequency penalty
    pub frequency_penalty: f64,
    /// Presence penalty
    pub presence_penalty: f64,
    /// Whether to stream the response
    pub stream: bool,
    /// Tool definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
    /// `"auto"` or `"required"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Allow several tool calls per turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// Message within a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiMessage {
    /// Message role
    pub role: String,
    /// Text content; `null` for pure tool-call messages
    #[serde(default)]
    pub content: Option<String>,
    /// Tool calls made by the assistant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    /// Tool call ID this message responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiTool {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function specification
    pub function: OpenAiFunction,
}

/// Function specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiFunction {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

/// Complete tool call within a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    /// Unique tool call identifier
    pub id: String,
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function call details
    pub function: OpenAiFunctionCall,
}

/// Function call details within a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiFunctionCall {
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

// -- Streaming types --
//
// Servers disagree on almost every field of a chunk, so everything here is
// optional and unknown fields are ignored.

/// One `data:` payload of a streamed response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamChunk {
    /// Response identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Choices; only the first is consumed
    #[serde(default)]
    pub choices: Vec<OpenAiStreamChoice>,
}

/// Choice within a streamed chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamChoice {
    /// Incremental shape
    #[serde(default)]
    pub delta: Option<OpenAiStreamDelta>,
    /// Full-message shape, sent by some servers instead of deltas
    #[serde(default)]
    pub message: Option<OpenAiStreamDelta>,
    /// Finish reason (present on final chunk)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Content of a delta or message
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamDelta {
    /// Text content
    #[serde(default)]
    pub content: Option<String>,
    /// Tool call fragments
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAiStreamToolCall>>,
    /// Legacy single function call
    #[serde(default)]
    pub function_call: Option<OpenAiStreamFunctionCall>,
}

/// Tool call fragment
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamToolCall {
    /// Slot index within the response; omitted by some servers
    #[serde(default)]
    pub index: Option<u32>,
    /// Tool call ID (usually first fragment only)
    #[serde(default)]
    pub id: Option<String>,
    /// Partial function call
    #[serde(default)]
    pub function: Option<OpenAiStreamFunctionCall>,
}

/// Partial function call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiStreamFunctionCall {
    /// Function name (usually first fragment only)
    #[serde(default)]
    pub name: Option<String>,
    /// Arguments fragment
    #[serde(default)]
    pub arguments: Option<OpenAiArguments>,
}

/// Arguments as sent by the server
///
/// The documented shape is a JSON-encoded string, but several local servers put
/// the decoded object there when they emit a full message.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OpenAiArguments {
    /// JSON text (possibly a fragment)
    Text(String),
    /// Already-decoded value
    Structured(serde_json::Value),
}

impl OpenAiArguments {
    /// Argument text, re-serializing structured values
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

// -- Models list types --

/// Models list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiModelList {
    /// List of models
    #[serde(default)]
    pub data: Vec<OpenAiModel>,
}

/// Model entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiModel {
    /// Model identifier
    pub id: String,
    /// Owner
    #[serde(default)]
    pub owned_by: Option<String>,
}

// -- Error response --

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiErrorResponse {
    /// Error details
    pub error: OpenAiErrorDetail,
}

/// Error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiErrorDetail {
    /// Error message
    pub message: String,
    /// Error type
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}
