//! Token estimation and context window budgeting
//!
//! Estimates are a flat four characters per token, independent of the
//! model's tokenizer.

use std::collections::HashSet;

use conduit_config::LimitsConfig;

use crate::protocol::openai::OpenAiTool;
use crate::types::{ConversationMessage, MessageBody, ToolDefinition};

/// Tokens held back for role markers and framing
pub const RESERVED_TOKENS: u32 = 256;

/// Floor for the `max_tokens` sent with a request
pub const MIN_OUTPUT_TOKENS: u32 = 64;

/// Estimated tokens for a character count
pub fn estimate_chars(chars: usize) -> u32 {
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}

/// Estimated tokens for a text
pub fn estimate_text(text: &str) -> u32 {
    estimate_chars(text.chars().count())
}

/// Estimated tokens for one message
///
/// Tool call requests count as their JSON serialization.
pub fn estimate_message(message: &ConversationMessage) -> u32 {
    let chars = match &message.body {
        MessageBody::Text { text } => text.chars().count(),
        MessageBody::ToolCalls { text, calls } => {
            let text_chars = text.as_deref().map_or(0, |t| t.chars().count());
            let payload_chars = serde_json::to_string(calls).map_or(0, |json| json.chars().count());
            text_chars + payload_chars
        }
        MessageBody::ToolResult { content, .. } => content.chars().count(),
    };

    estimate_chars(chars)
}

/// Estimated tokens for a set of tool definitions as sent on the wire
pub fn estimate_tools(tools: &[ToolDefinition]) -> u32 {
    if tools.is_empty() {
        return 0;
    }

    let wire: Vec<OpenAiTool> = tools.iter().map(OpenAiTool::from).collect();
    serde_json::to_string(&wire).map_or(0, |json| estimate_text(&json))
}

/// Which messages survive truncation
#[derive(Debug, Clone)]
pub struct TruncationDecision {
    pub messages: Vec<ConversationMessage>,
    /// Estimated tokens of the retained messages
    pub estimated_tokens: u32,
    pub truncated: bool,
}

/// Everything the engine needs to size a request
#[derive(Debug, Clone)]
pub struct BudgetPlan {
    pub messages: Vec<ConversationMessage>,
    pub truncated: bool,
    pub tool_tokens: u32,
    /// Retained messages plus tool definitions
    pub estimated_input_tokens: u32,
    /// `max_tokens` to request
    pub output_ceiling: u32,
}

/// Fits conversations into the configured context window
#[derive(Debug, Clone, Copy)]
pub struct ContextBudgeter {
    context_window: u32,
    max_output: u32,
}

impl ContextBudgeter {
    pub const fn new(context_window: u32, max_output: u32) -> Self {
        Self {
            context_window,
            max_output,
        }
    }

    pub const fn from_limits(limits: &LimitsConfig) -> Self {
        Self::new(limits.max_context_tokens, limits.max_output_tokens)
    }

    /// Tokens available for messages once output, tools and framing are set aside
    pub const fn input_budget(&self, tool_tokens: u32) -> u32 {
        self.context_window
            .saturating_sub(self.max_output)
            .saturating_sub(tool_tokens)
            .saturating_sub(RESERVED_TOKENS)
    }

    /// Drop older messages until the conversation fits
    ///
    /// The first message (usually the system prompt) is always kept. The
    /// rest is filled newest first and stops at the first message that does
    /// not fit, so the retained tail is contiguous.
    pub fn truncate(&self, messages: &[ConversationMessage], tool_tokens: u32) -> TruncationDecision {
        let estimates: Vec<u32> = messages.iter().map(estimate_message).collect();
        let total = saturating_sum(estimates.iter().copied());
        let budget = self.input_budget(tool_tokens);

        let Some((&head_estimate, tail_estimates)) = estimates.split_first() else {
            return TruncationDecision {
                messages: Vec::new(),
                estimated_tokens: 0,
                truncated: false,
            };
        };

        if total <= budget {
            return TruncationDecision {
                messages: messages.to_vec(),
                estimated_tokens: total,
                truncated: false,
            };
        }

        let mut remaining = budget.saturating_sub(head_estimate);
        let mut first_kept = messages.len();

        for (offset, estimate) in tail_estimates.iter().enumerate().rev() {
            if *estimate > remaining {
                break;
            }
            remaining -= estimate;
            first_kept = offset + 1;
        }

        let head = &messages[0];
        let mut tail = &messages[first_kept..];

        let known_calls: HashSet<&str> = std::iter::once(head)
            .chain(tail)
            .flat_map(|m| m.tool_calls().iter().map(|c| c.id.as_str()))
            .collect();

        while let Some((first, rest)) = tail.split_first()
            && first
                .result_call_id()
                .is_some_and(|id| !known_calls.contains(id))
        {
            tail = rest;
        }

        let mut retained = Vec::with_capacity(tail.len() + 1);
        retained.push(head.clone());
        retained.extend_from_slice(tail);

        let estimated_tokens = saturating_sum(retained.iter().map(estimate_message));

        tracing::debug!(
            original = messages.len(),
            retained = retained.len(),
            estimated_tokens,
            budget,
            "truncated conversation to fit context window"
        );

        TruncationDecision {
            truncated: retained.len() < messages.len(),
            messages: retained,
            estimated_tokens,
        }
    }

    /// `max_tokens` to request for a given input estimate
    ///
    /// Inflates the estimate by 20% to absorb tokenizer disagreement and
    /// never goes below [`MIN_OUTPUT_TOKENS`].
    pub fn output_ceiling(&self, input_estimate: u32) -> u32 {
        let inflated = (u64::from(input_estimate) * 12).div_ceil(10);
        let available = i64::from(self.context_window)
            - i64::try_from(inflated).unwrap_or(i64::MAX)
            - i64::from(RESERVED_TOKENS);

        let ceiling = available
            .min(i64::from(self.max_output))
            .max(i64::from(MIN_OUTPUT_TOKENS));

        u32::try_from(ceiling).unwrap_or(MIN_OUTPUT_TOKENS)
    }

    /// Truncate and size a request in one step
    pub fn plan(&self, messages: &[ConversationMessage], tools: &[ToolDefinition]) -> BudgetPlan {
        let tool_tokens = estimate_tools(tools);
        let decision = self.truncate(messages, tool_tokens);
        let estimated_input_tokens = decision.estimated_tokens.saturating_add(tool_tokens);

        BudgetPlan {
            output_ceiling: self.output_ceiling(estimated_input_tokens),
            messages: decision.messages,
            truncated: decision.truncated,
            tool_tokens,
            estimated_input_tokens,
        }
    }
}

fn saturating_sum(estimates: impl Iterator<Item = u32>) -> u32 {
    estimates.fold(0, u32::saturating_add)
}
