#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod output;

use std::path::Path;

use anyhow::Context;
use args::{Args, ChatArgs, Command};
use clap::Parser;
use conduit_config::Config;
use conduit_llm::{
    ChatRequest, CompletionEngine, HostMessage, HostRole, StopReason, ToolDefinition, ToolMode, convert_host_messages,
};
use output::StdoutSink;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    };

    conduit_telemetry::init(&config.logging)?;

    tracing::debug!(
        config_path = ?args.config,
        server = %config.server.url,
        "starting conduit"
    );

    let cancel = CancellationToken::new();
    let signal = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            signal.cancel();
        }
    });

    let engine = CompletionEngine::new(config);

    match args.command {
        Command::Chat(chat) => run_chat(&engine, chat, &cancel).await,
        Command::Models { refresh } => run_models(&engine, refresh, &cancel).await,
    }
}

async fn run_chat(engine: &CompletionEngine, args: ChatArgs, cancel: &CancellationToken) -> anyhow::Result<()> {
    let model = match args.model {
        Some(model) => model,
        None => engine
            .list_models(false, cancel)
            .await
            .context("failed to list models")?
            .into_iter()
            .next()
            .map(|model| model.id)
            .context("server lists no models; pass --model")?,
    };

    let tools = match &args.tools {
        Some(path) => load_tools(path)?,
        None => Vec::new(),
    };

    let mut host = Vec::with_capacity(2);
    if let Some(system) = args.system {
        host.push(HostMessage::text(HostRole::System, system));
    }
    host.push(HostMessage::text(HostRole::User, args.prompt));

    let mode = if args.require_tool { ToolMode::Required } else { ToolMode::Auto };
    let request = ChatRequest::new(model, convert_host_messages(&host))
        .with_tools(tools)
        .with_tool_mode(mode);

    let mut sink = StdoutSink::new(std::io::stdout());
    let summary = engine.complete(request, &mut sink, cancel).await;
    sink.finish().context("failed to write response")?;
    let summary = summary?;

    tracing::debug!(
        request_id = %summary.request_id,
        response_id = ?summary.response_id,
        estimated_input_tokens = summary.estimated_input_tokens,
        output_ceiling = summary.output_ceiling,
        truncated = summary.truncated,
        "completion summary"
    );

    if summary.stop_reason == StopReason::Cancelled {
        eprintln!("cancelled");
    }

    Ok(())
}

async fn run_models(engine: &CompletionEngine, refresh: bool, cancel: &CancellationToken) -> anyhow::Result<()> {
    let models = engine
        .list_models(refresh, cancel)
        .await
        .context("failed to list models")?;

    for model in models {
        println!("{}\t{}", model.id, model.display_name);
    }

    Ok(())
}

fn load_tools(path: &Path) -> anyhow::Result<Vec<ToolDefinition>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid tool definitions in {}", path.display()))
}
