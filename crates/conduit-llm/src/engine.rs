//! Completion orchestration
//!
//! One call to [`CompletionEngine::complete`] budgets the conversation, sends
//! the streaming request through the retrying transport, and feeds decoded
//! records through the accumulator into the caller's sink.

use std::collections::HashSet;
use std::pin::pin;
use std::sync::{Arc, RwLock};

use conduit_config::Config;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::accumulator::{AccumulatorOutput, FinalizedToolCall, ToolCallAccumulator, generate_request_id};
use crate::budget::{BudgetPlan, ContextBudgeter};
use crate::catalog::{ModelCatalog, ModelInfo};
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiMessage, OpenAiModelList, OpenAiRequest, OpenAiTool};
use crate::repair::repair;
use crate::schema::fill_required;
use crate::sink::ResponseSink;
use crate::sse::decode_stream;
use crate::transport::{RequestSpec, RetryingTransport};
use crate::types::{ChatRequest, CompletionSummary, StopReason, ToolDefinition, ToolInvocation, ToolMode};

const CHAT_COMPLETIONS_PATH: &str = "v1/chat/completions";
const MODELS_PATH: &str = "v1/models";

/// Streaming chat completion client for one OpenAI-compatible server
///
/// The configuration is swapped wholesale by [`update_config`]; each request
/// works from the snapshot it read when it started.
///
/// [`update_config`]: CompletionEngine::update_config
#[derive(Debug)]
pub struct CompletionEngine {
    client: Client,
    config: RwLock<Arc<Config>>,
    catalog: ModelCatalog,
}

impl CompletionEngine {
    pub fn new(config: Config) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(client: Client, config: Config) -> Self {
        Self {
            client,
            config: RwLock::new(Arc::new(config)),
            catalog: ModelCatalog::new(),
        }
    }

    /// Current configuration snapshot
    pub fn config(&self) -> Arc<Config> {
        let guard = self.config.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the configuration and drop cached models
    ///
    /// Requests already in flight keep the snapshot they started with.
    pub async fn update_config(&self, config: Config) {
        {
            let mut guard = self.config.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard = Arc::new(config);
        }

        self.catalog.invalidate().await;
        tracing::info!("configuration updated");
    }

    /// List models, served from cache unless stale or `refresh` is set
    pub async fn list_models(&self, refresh: bool, cancel: &CancellationToken) -> Result<Vec<ModelInfo>, LlmError> {
        let config = self.config();

        if refresh {
            self.catalog.invalidate().await;
        } else if let Some(models) = self.catalog.fresh(config.catalog.cache_ttl()).await {
            tracing::debug!(count = models.len(), "serving cached model list");
            return Ok(models);
        }

        let transport = RetryingTransport::from_config(self.client.clone(), &config);
        let url = config.server.endpoint(MODELS_PATH);
        let response = transport
            .send(&url, &RequestSpec::get(), "list models", cancel)
            .await?;

        let list: OpenAiModelList = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(LlmError::Cancelled),
            body = response.json() => body.map_err(|e| LlmError::Parse(format!("invalid model list: {e}")))?,
        };

        let models: Vec<ModelInfo> = list
            .data
            .into_iter()
            .map(|model| ModelInfo::from_wire(model, &config))
            .collect();

        tracing::debug!(count = models.len(), "fetched model list");
        self.catalog.store(models.clone()).await;

        Ok(models)
    }

    /// Run one streaming completion
    ///
    /// Text and tool calls are pushed into `sink` as they complete. When the
    /// server produces nothing at all, a diagnostic text describing the request
    /// is delivered instead so the caller never sees a silent empty reply.
    ///
    /// Cancellation is not an error: the summary comes back with
    /// [`StopReason::Cancelled`] and tool calls still pending are discarded.
    ///
    /// # Errors
    ///
    /// - `LlmError::InvalidRequest` for an empty model id or conversation, or a
    ///   message whose role does not match its body
    /// - `LlmError::Transport` when the request could not be delivered
    /// - `LlmError::Streaming` when the connection broke mid-response
    pub async fn complete(
        &self,
        request: ChatRequest,
        sink: &mut dyn ResponseSink,
        cancel: &CancellationToken,
    ) -> Result<CompletionSummary, LlmError> {
        let config = self.config();
        let request = validate(request)?;

        let tools = if config.tools.enabled {
            request.tools
        } else {
            if !request.tools.is_empty() {
                tracing::debug!(count = request.tools.len(), "tool calling disabled, not sending tools");
            }
            Vec::new()
        };

        let plan = ContextBudgeter::from_limits(&config.limits).plan(&request.messages, &tools);
        let wire = build_wire_request(&request.model, &plan, &tools, request.tool_mode, &config);

        tracing::debug!(
            model = %request.model,
            messages = plan.messages.len(),
            tools = tools.len(),
            truncated = plan.truncated,
            estimated_input_tokens = plan.estimated_input_tokens,
            max_tokens = plan.output_ceiling,
            "sending chat completion"
        );

        let transport = RetryingTransport::from_config(self.client.clone(), &config);
        let url = config.server.endpoint(CHAT_COMPLETIONS_PATH);
        let spec = RequestSpec::stream_json(&wire)?;

        let response = match transport.send(&url, &spec, "chat completion", cancel).await {
            Ok(response) => response,
            Err(LlmError::Cancelled) => {
                tracing::debug!("chat completion cancelled before a response arrived");
                return Ok(Progress::new(generate_request_id()).finish(&plan, StopReason::Cancelled));
            }
            Err(e) => return Err(e),
        };

        let mut accumulator = ToolCallAccumulator::new();
        let mut progress = Progress::new(accumulator.request_id().to_owned());
        let mut records = pin!(decode_stream(response.bytes_stream(), cancel.clone()));

        while let Some(record) = records.next().await {
            let record = record?;

            if progress.response_id.is_none() {
                progress.response_id.clone_from(&record.response_id);
            }
            if record.finish_reason.is_some() {
                progress.finish_reason.clone_from(&record.finish_reason);
            }

            let output = accumulator.ingest(record);
            progress.deliver(output, &tools, sink, cancel);
        }

        if cancel.is_cancelled() {
            let discarded = accumulator.pending().count();
            tracing::debug!(discarded, "chat completion cancelled mid-stream");
            return Ok(progress.finish(&plan, StopReason::Cancelled));
        }

        let remaining = AccumulatorOutput {
            text: None,
            finalized: accumulator.drain(),
        };
        progress.deliver(remaining, &tools, sink, cancel);

        if cancel.is_cancelled() {
            return Ok(progress.finish(&plan, StopReason::Cancelled));
        }

        let empty = progress.text_chars == 0 && progress.tool_calls == 0;
        if empty {
            tracing::warn!(
                model = %request.model,
                finish_reason = ?progress.finish_reason,
                "server returned an empty response"
            );
            sink.on_text(&empty_response_message(&request.model, tools.len(), &plan));
        }

        let mut summary = progress.finish(&plan, StopReason::Completed);
        summary.empty_response = empty;

        tracing::info!(
            model = %request.model,
            request_id = %summary.request_id,
            finish_reason = ?summary.finish_reason,
            text_chars = summary.text_chars,
            tool_calls = summary.tool_calls,
            truncated = summary.truncated,
            "chat completion finished"
        );

        Ok(summary)
    }
}

/// Reject malformed requests and drop tool results nobody asked for
fn validate(mut request: ChatRequest) -> Result<ChatRequest, LlmError> {
    if request.model.trim().is_empty() {
        return Err(LlmError::InvalidRequest("model id is empty".to_owned()));
    }

    for (position, message) in request.messages.iter().enumerate() {
        message
            .check_shape()
            .map_err(|reason| LlmError::InvalidRequest(format!("message {position}: {reason}")))?;
    }

    let mut requested = HashSet::new();
    request.messages.retain(|message| {
        requested.extend(message.tool_calls().iter().map(|call| call.id.clone()));

        match message.result_call_id() {
            Some(call_id) if !requested.contains(call_id) => {
                tracing::warn!(call_id, "dropping tool result for a call that was never requested");
                false
            }
            _ => true,
        }
    });

    if request.messages.is_empty() {
        return Err(LlmError::InvalidRequest("conversation has no messages".to_owned()));
    }

    Ok(request)
}

/// Assemble the Chat Completions body for a budgeted conversation
///
/// `tools`, `tool_choice` and `parallel_tool_calls` are only set when at least
/// one tool is offered.
pub fn build_wire_request(
    model: &str,
    plan: &BudgetPlan,
    tools: &[ToolDefinition],
    tool_mode: ToolMode,
    config: &Config,
) -> OpenAiRequest {
    let with_tools = !tools.is_empty();

    OpenAiRequest {
        model: model.to_owned(),
        messages: plan.messages.iter().map(OpenAiMessage::from).collect(),
        max_tokens: plan.output_ceiling,
        temperature: config.sampling.temperature,
        top_p: config.sampling.top_p,
        frequency_penalty: config.sampling.frequency_penalty,
        presence_penalty: config.sampling.presence_penalty,
        stream: true,
        tools: with_tools.then(|| tools.iter().map(OpenAiTool::from).collect()),
        tool_choice: with_tools.then(|| tool_mode.as_str().to_owned()),
        parallel_tool_calls: with_tools.then_some(config.tools.parallel),
    }
}

/// Reply substituted for a response with neither text nor tool calls
pub fn empty_response_message(model: &str, tool_count: usize, plan: &BudgetPlan) -> String {
    format!(
        "The server returned an empty response (model: {model}, tools offered: {tool_count}, \
         estimated input tokens: {}, max output tokens: {}). The conversation may be too long \
         for the model or the server may have failed to apply its chat template.",
        plan.estimated_input_tokens, plan.output_ceiling
    )
}

/// Running totals for one response
struct Progress {
    request_id: String,
    response_id: Option<String>,
    finish_reason: Option<String>,
    text_chars: usize,
    tool_calls: usize,
}

impl Progress {
    const fn new(request_id: String) -> Self {
        Self {
            request_id,
            response_id: None,
            finish_reason: None,
            text_chars: 0,
            tool_calls: 0,
        }
    }

    /// Hand one record's output to the sink
    ///
    /// The sink may raise cancellation from inside a callback; nothing is
    /// delivered after that point.
    fn deliver(
        &mut self,
        output: AccumulatorOutput,
        tools: &[ToolDefinition],
        sink: &mut dyn ResponseSink,
        cancel: &CancellationToken,
    ) {
        if let Some(text) = output.text {
            if cancel.is_cancelled() {
                return;
            }
            self.text_chars += text.chars().count();
            sink.on_text(&text);
        }

        let total = output.finalized.len();
        for (delivered, call) in output.finalized.into_iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::debug!(discarded = total - delivered, "cancelled while delivering tool calls");
                return;
            }
            if let Some(invocation) = invocation(call, tools) {
                self.tool_calls += 1;
                sink.on_tool_call(invocation);
            }
        }
    }

    fn finish(self, plan: &BudgetPlan, stop_reason: StopReason) -> CompletionSummary {
        CompletionSummary {
            request_id: self.request_id,
            response_id: self.response_id,
            finish_reason: self.finish_reason,
            text_chars: self.text_chars,
            tool_calls: self.tool_calls,
            truncated: plan.truncated,
            estimated_input_tokens: plan.estimated_input_tokens,
            output_ceiling: plan.output_ceiling,
            empty_response: false,
            stop_reason,
        }
    }
}

/// Parse and complete the arguments of a finalized call
fn invocation(call: FinalizedToolCall, tools: &[ToolDefinition]) -> Option<ToolInvocation> {
    if call.name.is_empty() {
        tracing::warn!(id = %call.id, index = call.index, "dropping tool call without a function name");
        return None;
    }

    let mut arguments = repair(&call.arguments).unwrap_or_else(|| Value::Object(Map::new()));

    match tools.iter().find(|tool| tool.name == call.name) {
        Some(tool) => {
            let filled = fill_required(&mut arguments, &tool.parameters);
            if !filled.is_empty() {
                tracing::debug!(tool = %call.name, ?filled, "filled missing required arguments");
            }
        }
        None => tracing::warn!(tool = %call.name, "model called a tool that was not offered"),
    }

    Some(ToolInvocation {
        id: call.id,
        name: call.name,
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::sink::CollectingSink;
    use crate::types::{ConversationMessage, Role, ToolCallRequest};

    fn read_file_tool() -> ToolDefinition {
        ToolDefinition::new(
            "read_file",
            "Read a file from disk",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "encoding": {"type": "string", "default": "utf-8"}
                },
                "required": ["path", "encoding"]
            }),
        )
    }

    fn plan_for(config: &Config, messages: &[ConversationMessage], tools: &[ToolDefinition]) -> BudgetPlan {
        ContextBudgeter::from_limits(&config.limits).plan(messages, tools)
    }

    #[test]
    fn wire_request_without_tools() {
        let config = Config::default();
        let messages = vec![ConversationMessage::system("be brief"), ConversationMessage::user("hi")];
        let plan = plan_for(&config, &messages, &[]);

        let wire = build_wire_request("m", &plan, &[], ToolMode::Required, &config);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["model"], "m");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["top_p"], 1.0);
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert!(json.get("parallel_tool_calls").is_none());
    }

    #[test]
    fn wire_request_with_tools() {
        let config = Config::parse("[tools]\nparallel = true\n").unwrap();
        let tools = vec![read_file_tool()];
        let messages = vec![ConversationMessage::user("read a.txt")];
        let plan = plan_for(&config, &messages, &tools);

        let wire = build_wire_request("m", &plan, &tools, ToolMode::Required, &config);
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "read_file");
        assert_eq!(json["tool_choice"], "required");
        assert_eq!(json["parallel_tool_calls"], true);
    }

    #[test]
    fn invocation_repairs_and_fills() {
        let call = FinalizedToolCall {
            index: 0,
            id: "call_1".to_owned(),
            name: "read_file".to_owned(),
            arguments: r#"{"path": "a.tx"#.to_owned(),
        };

        let invocation = invocation(call, &[read_file_tool()]).unwrap();
        assert_eq!(invocation.arguments, json!({"path": "a.tx", "encoding": "utf-8"}));
    }

    #[test]
    fn invocation_substitutes_empty_object() {
        let call = FinalizedToolCall {
            index: 0,
            id: "call_1".to_owned(),
            name: "undeclared".to_owned(),
            arguments: "{\"path\": ".to_owned(),
        };

        let invocation = invocation(call, &[read_file_tool()]).unwrap();
        assert_eq!(invocation.arguments, json!({}));
    }

    #[test]
    fn invocation_requires_a_name() {
        let call = FinalizedToolCall {
            index: 0,
            id: "call_1".to_owned(),
            name: String::new(),
            arguments: "{}".to_owned(),
        };

        assert!(invocation(call, &[]).is_none());
    }

    #[test]
    fn empty_response_message_describes_request() {
        let config = Config::default();
        let tools = vec![read_file_tool()];
        let plan = plan_for(&config, &[ConversationMessage::user("hi")], &tools);

        let message = empty_response_message("qwen", tools.len(), &plan);
        assert!(message.contains("model: qwen"));
        assert!(message.contains("tools offered: 1"));
        assert!(message.contains(&format!("estimated input tokens: {}", plan.estimated_input_tokens)));
        assert!(message.contains("max output tokens: 4096"));
    }

    /// Sink that raises cancellation when text arrives
    struct CancellingSink {
        inner: CollectingSink,
        cancel: CancellationToken,
    }

    impl ResponseSink for CancellingSink {
        fn on_text(&mut self, text: &str) {
            self.inner.on_text(text);
            self.cancel.cancel();
        }

        fn on_tool_call(&mut self, call: ToolInvocation) {
            self.inner.on_tool_call(call);
        }
    }

    #[test]
    fn deliver_stops_once_sink_cancels() {
        let cancel = CancellationToken::new();
        let mut sink = CancellingSink {
            inner: CollectingSink::new(),
            cancel: cancel.clone(),
        };
        let mut progress = Progress::new("req".to_owned());
        let output = AccumulatorOutput {
            text: Some("hi".to_owned()),
            finalized: vec![FinalizedToolCall {
                index: 0,
                id: "c1".to_owned(),
                name: "read_file".to_owned(),
                arguments: r#"{"path": "a.txt"}"#.to_owned(),
            }],
        };

        progress.deliver(output, &[read_file_tool()], &mut sink, &cancel);

        assert_eq!(sink.inner.text(), "hi");
        assert!(sink.inner.tool_calls().is_empty());
        assert_eq!(progress.tool_calls, 0);
        assert_eq!(progress.text_chars, 2);
    }

    fn validated(messages: Vec<ConversationMessage>) -> Result<Vec<ConversationMessage>, LlmError> {
        validate(ChatRequest::new("m", messages)).map(|request| request.messages)
    }

    #[test]
    fn validate_drops_unrequested_tool_results() {
        let messages = validated(vec![
            ConversationMessage::system("s"),
            ConversationMessage::user("u"),
            ConversationMessage::tool_result("call_ghost", "stale"),
        ])
        .unwrap();

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.result_call_id().is_none()));
    }

    #[test]
    fn validate_keeps_answered_calls() {
        let calls = vec![ToolCallRequest {
            id: "call_1".to_owned(),
            name: "read_file".to_owned(),
            arguments: "{}".to_owned(),
        }];
        let messages = validated(vec![
            ConversationMessage::user("u"),
            ConversationMessage::assistant_tool_calls(None, calls),
            ConversationMessage::tool_result("call_1", "contents"),
        ])
        .unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].result_call_id(), Some("call_1"));
    }

    #[test]
    fn validate_drops_result_before_its_call() {
        let calls = vec![ToolCallRequest {
            id: "call_1".to_owned(),
            name: "read_file".to_owned(),
            arguments: "{}".to_owned(),
        }];
        let messages = validated(vec![
            ConversationMessage::user("u"),
            ConversationMessage::tool_result("call_1", "early"),
            ConversationMessage::assistant_tool_calls(None, calls),
        ])
        .unwrap();

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.result_call_id().is_none()));
    }

    #[test]
    fn validate_rejects_mismatched_roles() {
        let err = validated(vec![
            ConversationMessage::user("u"),
            ConversationMessage::text(Role::Tool, "no call id"),
        ])
        .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(ref msg) if msg == "message 1: tool message carries no tool result"));

        let mut result = ConversationMessage::tool_result("call_1", "ok");
        result.role = Role::Assistant;
        assert!(matches!(validated(vec![result]), Err(LlmError::InvalidRequest(_))));

        let mut calls = ConversationMessage::assistant_tool_calls(None, Vec::new());
        calls.role = Role::User;
        assert!(matches!(validated(vec![calls]), Err(LlmError::InvalidRequest(_))));
    }

    #[test]
    fn validate_rejects_conversation_of_only_orphans() {
        let err = validated(vec![ConversationMessage::tool_result("call_ghost", "stale")]).unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn rejects_invalid_requests() {
        let engine = CompletionEngine::new(Config::default());
        let mut sink = CollectingSink::new();
        let cancel = CancellationToken::new();

        let err = engine
            .complete(ChatRequest::new("", vec![ConversationMessage::user("hi")]), &mut sink, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));

        let err = engine
            .complete(ChatRequest::new("m", Vec::new()), &mut sink, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn cancelled_before_send_reports_summary() {
        let engine = CompletionEngine::new(Config::default());
        let mut sink = CollectingSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = engine
            .complete(ChatRequest::new("m", vec![ConversationMessage::user("hi")]), &mut sink, &cancel)
            .await
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert!(!summary.empty_response);
        assert!(sink.events.is_empty());
    }

    #[tokio::test]
    async fn list_models_serves_cache_and_update_invalidates() {
        let engine = CompletionEngine::new(Config::default());
        let cancel = CancellationToken::new();
        let cached = vec![ModelInfo::from_wire(
            crate::protocol::openai::OpenAiModel {
                id: "cached".to_owned(),
                owned_by: None,
            },
            &engine.config(),
        )];
        engine.catalog.store(cached.clone()).await;

        assert_eq!(engine.list_models(false, &cancel).await.unwrap(), cached);

        engine.update_config(Config::default()).await;
        assert!(engine.catalog.fresh(engine.config().catalog.cache_ttl()).await.is_none());
    }
}
