//! Conversion from internal types to the Chat Completions wire format

use crate::protocol::openai::{OpenAiFunction, OpenAiFunctionCall, OpenAiMessage, OpenAiTool, OpenAiToolCall};
use crate::types::{ConversationMessage, MessageBody, ToolCallRequest, ToolDefinition};

impl From<&ConversationMessage> for OpenAiMessage {
    fn from(msg: &ConversationMessage) -> Self {
        let role = msg.role.as_str().to_owned();

        match &msg.body {
            MessageBody::Text { text } => Self {
                role,
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            },
            MessageBody::ToolCalls { text, calls } => Self {
                role,
                content: text.clone().filter(|t| !t.is_empty()),
                tool_calls: Some(calls.iter().map(Into::into).collect()),
                tool_call_id: None,
            },
            MessageBody::ToolResult { call_id, content } => Self {
                role,
                content: Some(content.clone()),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        }
    }
}

impl From<&ToolCallRequest> for OpenAiToolCall {
    fn from(call: &ToolCallRequest) -> Self {
        Self {
            id: call.id.clone(),
            tool_type: "function".to_owned(),
            function: OpenAiFunctionCall {
                name: call.name.clone(),
                // Servers reject an empty string where a JSON object is expected
                arguments: if call.arguments.trim().is_empty() {
                    "{}".to_owned()
                } else {
                    call.arguments.clone()
                },
            },
        }
    }
}

impl From<&ToolDefinition> for OpenAiTool {
    fn from(tool: &ToolDefinition) -> Self {
        Self {
            tool_type: "function".to_owned(),
            function: OpenAiFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        }
    }
}
