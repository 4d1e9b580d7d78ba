use serde::{Deserialize, Serialize};

use super::message::ConversationMessage;

/// A tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the arguments object
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            parameters,
        }
    }
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// How the model should select tools
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// Model decides whether to call tools
    #[default]
    Auto,
    /// Model must call at least one tool
    Required,
}

impl ToolMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Required => "required",
        }
    }
}

/// A chat completion request as handed to the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation, oldest first; the first message is conventionally the
    /// system instruction and survives truncation
    pub messages: Vec<ConversationMessage>,
    /// Tools offered to the model
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    /// Tool selection mode
    #[serde(default)]
    pub tool_mode: ToolMode,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ConversationMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_mode: ToolMode::Auto,
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub const fn with_tool_mode(mut self, mode: ToolMode) -> Self {
        self.tool_mode = mode;
        self
    }
}
