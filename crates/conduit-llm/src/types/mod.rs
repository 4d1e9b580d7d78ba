//! Internal canonical types
//!
//! These are independent of the wire format; `convert::openai` maps them to
//! and from the Chat Completions JSON shapes.

pub mod message;
pub mod response;
pub mod tool;

pub use message::{ConversationMessage, MessageBody, Role, ToolCallRequest};
pub use response::{CompletionSummary, StopReason, ToolInvocation};
pub use tool::{ChatRequest, ToolDefinition, ToolMode};
