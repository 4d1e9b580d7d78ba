//! Conversion from host-side chat messages into [`ConversationMessage`]s
//!
//! Hosts hand over messages as a role plus an ordered list of parts. Part
//! kinds are decided here, once; nothing downstream inspects shapes again.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{ConversationMessage, Role, ToolCallRequest};

/// Role as the host reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostRole {
    System,
    User,
    Assistant,
}

/// One part of a host message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostPart {
    /// Plain text
    Text { text: String },
    /// A tool call the assistant made in an earlier turn
    ToolCall {
        call_id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The result the host produced for a tool call
    ToolResult { call_id: String, content: Vec<String> },
    /// Binary payload (images, attachments); not forwarded
    Data { mime_type: String, bytes: Vec<u8> },
}

/// A message as handed over by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostMessage {
    pub role: HostRole,
    pub parts: Vec<HostPart>,
}

impl HostMessage {
    pub fn new(role: HostRole, parts: Vec<HostPart>) -> Self {
        Self { role, parts }
    }

    /// Single text part message
    pub fn text(role: HostRole, text: impl Into<String>) -> Self {
        Self::new(role, vec![HostPart::Text { text: text.into() }])
    }
}

/// Convert host messages into the internal conversation model
///
/// - assistant tool calls in one host message become one assistant message,
///   carrying any accompanying text
/// - every tool result becomes its own `tool` message, emitted before any
///   text from the same host message
/// - tool results whose call id was never requested are dropped
/// - binary parts are dropped
/// - messages left without content are skipped
pub fn convert_host_messages(messages: &[HostMessage]) -> Vec<ConversationMessage> {
    let mut converted = Vec::with_capacity(messages.len());
    let mut requested_ids = HashSet::new();

    for message in messages {
        let mut text = String::new();
        let mut calls = Vec::new();
        let mut results = Vec::new();

        for part in &message.parts {
            match part {
                HostPart::Text { text: fragment } => text.push_str(fragment),
                HostPart::ToolCall { call_id, name, input } => calls.push(ToolCallRequest {
                    id: call_id.clone(),
                    name: name.clone(),
                    arguments: input.to_string(),
                }),
                HostPart::ToolResult { call_id, content } => {
                    if requested_ids.contains(call_id.as_str()) {
                        results.push(ConversationMessage::tool_result(call_id.clone(), content.concat()));
                    } else {
                        tracing::warn!(call_id = %call_id, "dropping tool result without a matching tool call");
                    }
                }
                HostPart::Data { mime_type, bytes } => {
                    tracing::debug!(mime_type = %mime_type, len = bytes.len(), "skipping binary message part");
                }
            }
        }

        converted.extend(results);

        match message.role {
            HostRole::Assistant if !calls.is_empty() => {
                requested_ids.extend(calls.iter().map(|c| c.id.clone()));
                let text = (!text.is_empty()).then_some(text);
                converted.push(ConversationMessage::assistant_tool_calls(text, calls));
            }
            role => {
                if !calls.is_empty() {
                    tracing::warn!(count = calls.len(), "ignoring tool calls on a non-assistant message");
                }
                if !text.is_empty() {
                    converted.push(ConversationMessage::text(role.into(), text));
                }
            }
        }
    }

    converted
}

impl From<HostRole> for Role {
    fn from(role: HostRole) -> Self {
        match role {
            HostRole::System => Self::System,
            HostRole::User => Self::User,
            HostRole::Assistant => Self::Assistant,
        }
    }
}
