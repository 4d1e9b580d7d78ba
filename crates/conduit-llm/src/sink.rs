//! Output delivery

use crate::types::ToolInvocation;

/// Receives a response as it streams
///
/// Text fragments and tool calls arrive in the order the server produced
/// them.
pub trait ResponseSink: Send {
    fn on_text(&mut self, text: &str);

    fn on_tool_call(&mut self, call: ToolInvocation);
}

/// One delivered item
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Text(String),
    ToolCall(ToolInvocation),
}

/// Sink that records everything it receives
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<SinkEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All text fragments joined
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Text(text) => Some(text.as_str()),
                SinkEvent::ToolCall(_) => None,
            })
            .collect()
    }

    pub fn tool_calls(&self) -> Vec<&ToolInvocation> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::ToolCall(call) => Some(call),
                SinkEvent::Text(_) => None,
            })
            .collect()
    }
}

impl ResponseSink for CollectingSink {
    fn on_text(&mut self, text: &str) {
        self.events.push(SinkEvent::Text(text.to_owned()));
    }

    fn on_tool_call(&mut self, call: ToolInvocation) {
        self.events.push(SinkEvent::ToolCall(call));
    }
}
