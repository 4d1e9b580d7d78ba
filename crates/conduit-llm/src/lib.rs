//! Streaming client engine for OpenAI-compatible chat completion servers
//!
//! Sends a conversation to a locally hosted model server, streams the reply
//! back as text fragments and fully assembled tool calls, and survives the
//! usual failure modes of such servers: transient HTTP errors, chunk
//! boundaries that split lines, fragmented or malformed tool call arguments,
//! and conversations that outgrow the context window.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod accumulator;
pub mod budget;
pub mod catalog;
pub mod convert;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod repair;
pub mod schema;
pub mod sink;
pub mod sse;
pub mod transport;
pub mod types;

pub use accumulator::{FinalizedToolCall, PendingToolCall, ToolCallAccumulator};
pub use budget::{BudgetPlan, ContextBudgeter, TruncationDecision};
pub use catalog::{ModelCatalog, ModelInfo};
pub use convert::host::{HostMessage, HostPart, HostRole, convert_host_messages};
pub use engine::CompletionEngine;
pub use error::{LlmError, TransportError};
pub use sink::{CollectingSink, ResponseSink, SinkEvent};
pub use sse::{EventStreamDecoder, StreamRecord};
pub use transport::{BackoffPolicy, RequestSpec, RetryingTransport};
pub use types::{
    ChatRequest, CompletionSummary, ConversationMessage, MessageBody, Role, StopReason, ToolCallRequest,
    ToolDefinition, ToolInvocation, ToolMode,
};
