//! Tool call accumulation across streamed records

use std::collections::{BTreeMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::openai::{OpenAiStreamFunctionCall, OpenAiStreamToolCall};
use crate::sse::{PayloadShape, StreamRecord};

/// Finish reasons that end every pending tool call
const TOOL_FINISH_REASONS: [&str; 2] = ["tool_calls", "function_call"];

/// A tool call still receiving fragments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingToolCall {
    pub index: u32,
    pub id: String,
    pub name: String,
    /// Append-only argument text
    pub arguments: String,
}

/// A tool call that will receive no more fragments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedToolCall {
    pub index: u32,
    pub id: String,
    pub name: String,
    /// Raw argument text, not yet parsed
    pub arguments: String,
}

/// What one record produced
#[derive(Debug, Default)]
pub struct AccumulatorOutput {
    pub text: Option<String>,
    pub finalized: Vec<FinalizedToolCall>,
}

/// Assembles tool calls from streamed fragments, keyed by slot index
///
/// Each slot finalizes at most once. Fragments arriving for a slot that has
/// already been finalized are ignored.
#[derive(Debug)]
pub struct ToolCallAccumulator {
    request_id: String,
    pending: BTreeMap<u32, PendingToolCall>,
    finalized: HashSet<u32>,
    next_index: u32,
}

impl ToolCallAccumulator {
    /// Create with a freshly generated request id
    pub fn new() -> Self {
        Self::with_request_id(generate_request_id())
    }

    /// Create with a fixed request id for synthesized call ids
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            pending: BTreeMap::new(),
            finalized: HashSet::new(),
            next_index: 0,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Slots still receiving fragments
    pub fn pending(&self) -> impl Iterator<Item = &PendingToolCall> {
        self.pending.values()
    }

    /// Apply one record
    pub fn ingest(&mut self, record: StreamRecord) -> AccumulatorOutput {
        let payload = record.payload;
        let mut output = AccumulatorOutput {
            text: payload.content.filter(|text| !text.is_empty()),
            finalized: Vec::new(),
        };

        let mut touched = Vec::new();

        for fragment in payload.tool_calls.unwrap_or_default() {
            touched.push(self.apply_fragment(fragment));
        }

        if let Some(call) = payload.function_call {
            touched.push(self.apply_legacy(call));
        }

        if record.shape == PayloadShape::Message {
            for index in touched {
                output.finalized.extend(self.finalize(index));
            }
        }

        if record
            .finish_reason
            .as_deref()
            .is_some_and(|reason| TOOL_FINISH_REASONS.contains(&reason))
        {
            output.finalized.extend(self.drain());
        }

        output
    }

    /// Finalize every pending slot in index order
    pub fn drain(&mut self) -> Vec<FinalizedToolCall> {
        let indices: Vec<u32> = self.pending.keys().copied().collect();
        indices.into_iter().filter_map(|index| self.finalize(index)).collect()
    }

    fn apply_fragment(&mut self, fragment: OpenAiStreamToolCall) -> u32 {
        let index = fragment.index.unwrap_or(self.next_index);
        let function = fragment.function.unwrap_or_default();
        self.apply(index, fragment.id, function);
        index
    }

    fn apply_legacy(&mut self, call: OpenAiStreamFunctionCall) -> u32 {
        self.apply(0, None, call);
        0
    }

    fn apply(&mut self, index: u32, id: Option<String>, function: OpenAiStreamFunctionCall) {
        self.next_index = self.next_index.max(index.saturating_add(1));

        if self.finalized.contains(&index) {
            tracing::debug!(index, "ignoring fragment for finalized tool call");
            return;
        }

        let slot = self.pending.entry(index).or_insert_with(|| PendingToolCall {
            index,
            ..PendingToolCall::default()
        });

        if slot.id.is_empty()
            && let Some(id) = id.filter(|id| !id.is_empty())
        {
            slot.id = id;
        }

        if slot.name.is_empty()
            && let Some(name) = function.name.filter(|name| !name.is_empty())
        {
            slot.name = name;
        }

        if let Some(arguments) = function.arguments {
            slot.arguments.push_str(&arguments.into_text());
        }
    }

    fn finalize(&mut self, index: u32) -> Option<FinalizedToolCall> {
        let call = self.pending.remove(&index)?;
        self.finalized.insert(index);

        let id = if call.id.is_empty() {
            format!("call_{}_{index}", self.request_id)
        } else {
            call.id
        };

        Some(FinalizedToolCall {
            index,
            id,
            name: call.name,
            arguments: call.arguments,
        })
    }
}

impl Default for ToolCallAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Millisecond timestamp followed by a short random suffix
pub fn generate_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();

    format!("{millis}{}", &suffix[..8])
}
