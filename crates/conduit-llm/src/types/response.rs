use serde::{Deserialize, Serialize};

/// A finalized tool call with parsed arguments, as delivered to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Call identifier, server-supplied or synthesized
    pub id: String,
    /// Function name
    pub name: String,
    /// Parsed (and possibly repaired) arguments
    pub arguments: serde_json::Value,
}

/// Why the engine stopped reading the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The server finished the stream
    Completed,
    /// The caller raised cancellation
    Cancelled,
}

/// Outcome of one completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSummary {
    /// Per-response identifier used for synthesized call ids
    pub request_id: String,
    /// Server-assigned response identifier, if any chunk carried one
    pub response_id: Option<String>,
    /// Last finish reason the server reported
    pub finish_reason: Option<String>,
    /// Characters of text delivered to the sink
    pub text_chars: usize,
    /// Tool calls delivered to the sink
    pub tool_calls: usize,
    /// Whether older messages were dropped to fit the context window
    pub truncated: bool,
    /// Estimated input tokens after truncation, tool definitions included
    pub estimated_input_tokens: u32,
    /// `max_tokens` sent with the request
    pub output_ceiling: u32,
    /// Whether the engine synthesized a diagnostic reply for an empty response
    pub empty_response: bool,
    pub stop_reason: StopReason,
}
