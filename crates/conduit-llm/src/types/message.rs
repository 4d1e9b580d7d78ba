use serde::{Deserialize, Serialize};

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// Tool/function result
    Tool,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A tool call the assistant requested in an earlier turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Call identifier echoed back by the matching tool result
    pub id: String,
    /// Function name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

/// What a message carries
///
/// Exactly one of plain text, tool-call requests, or a tool result. The
/// assistant may accompany its tool calls with text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageBody {
    /// Plain text
    Text { text: String },
    /// Assistant tool-call requests
    ToolCalls {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
    /// Result for an earlier tool call
    ToolResult { call_id: String, content: String },
}

/// A message in the outgoing conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub body: MessageBody,
}

impl ConversationMessage {
    /// System instruction message
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }

    /// User text message
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }

    /// Assistant text message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }

    /// Plain text message for any role except `tool`
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            body: MessageBody::Text { text: text.into() },
        }
    }

    /// Assistant message requesting tool calls
    pub fn assistant_tool_calls(text: Option<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            body: MessageBody::ToolCalls { text, calls },
        }
    }

    /// Result of a tool call
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            body: MessageBody::ToolResult {
                call_id: call_id.into(),
                content: content.into(),
            },
        }
    }

    /// Text content, if the message carries any
    pub fn text_content(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text { text } => Some(text),
            MessageBody::ToolCalls { text, .. } => text.as_deref(),
            MessageBody::ToolResult { content, .. } => Some(content),
        }
    }

    /// Tool calls requested by this message
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match &self.body {
            MessageBody::ToolCalls { calls, .. } => calls,
            _ => &[],
        }
    }

    /// Call identifier this message answers, for tool results
    pub fn result_call_id(&self) -> Option<&str> {
        match &self.body {
            MessageBody::ToolResult { call_id, .. } => Some(call_id),
            _ => None,
        }
    }

    /// Check that the role and body agree
    ///
    /// Tool results only travel in `tool` messages, tool-call requests only in
    /// `assistant` messages, and a `tool` message always answers a call.
    pub fn check_shape(&self) -> Result<(), String> {
        match (&self.body, self.role) {
            (MessageBody::ToolResult { .. }, Role::Tool) | (MessageBody::ToolCalls { .. }, Role::Assistant) => Ok(()),
            (MessageBody::Text { .. }, Role::Tool) => Err("tool message carries no tool result".to_owned()),
            (MessageBody::Text { .. }, _) => Ok(()),
            (MessageBody::ToolResult { .. }, role) => Err(format!("tool result in a {} message", role.as_str())),
            (MessageBody::ToolCalls { .. }, role) => Err(format!("tool calls in a {} message", role.as_str())),
        }
    }
}
