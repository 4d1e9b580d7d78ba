//! Mock OpenAI-compatible model server for integration tests
//!
//! Chat completion replies are scripted per request; once the script runs out
//! every request gets a short text stream. Every chat request's headers and
//! body are captured for inspection.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// One scripted chat completion reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Event stream; each element is written as its own body chunk
    Stream(Vec<Bytes>),
    /// Write the chunks with a pause before each one
    Trickle { chunks: Vec<Bytes>, gap: Duration },
    /// Write the chunks, then keep the connection open without sending more
    StreamThenStall(Vec<Bytes>),
    /// Write the chunks, then abort the connection
    StreamThenAbort(Vec<Bytes>),
    /// Error status with a JSON body
    Error { status: StatusCode, body: Value },
    /// Never send response headers
    Stall,
}

/// A chat completion request as the mock received it
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub headers: HeaderMap,
    pub body: Value,
}

/// Mock model server bound to a random local port
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    replies: Mutex<VecDeque<MockReply>>,
    captured: Mutex<Vec<CapturedRequest>>,
    completion_count: AtomicU32,
    models: Vec<String>,
    models_count: AtomicU32,
    /// Model list requests to fail with 503 before succeeding
    models_fail_count: AtomicU32,
}

impl MockLlm {
    /// Start the mock server, returning immediately
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with_models(&["mock-model-1", "mock-model-2"]).await
    }

    /// Start a mock server advertising the given model ids
    pub async fn start_with_models(models: &[&str]) -> anyhow::Result<Self> {
        let state = Arc::new(MockLlmState {
            replies: Mutex::new(VecDeque::new()),
            captured: Mutex::new(Vec::new()),
            completion_count: AtomicU32::new(0),
            models: models.iter().map(|m| (*m).to_owned()).collect(),
            models_count: AtomicU32::new(0),
            models_fail_count: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .route("/v1/models", routing::get(handle_models))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for the engine configuration
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue a reply for the next chat completion request
    pub fn push(&self, reply: MockReply) -> &Self {
        self.state.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Fail the next `n` model list requests with 503
    pub fn fail_models(&self, n: u32) {
        self.state.models_fail_count.store(n, Ordering::Relaxed);
    }

    /// Number of chat completion requests received
    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }

    /// Number of model list requests received
    pub fn models_count(&self) -> u32 {
        self.state.models_count.load(Ordering::Relaxed)
    }

    /// Every chat completion request received so far
    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.state.captured.lock().unwrap().clone()
    }

    /// The most recent chat completion request
    pub fn last_request(&self) -> CapturedRequest {
        self.captured().pop().expect("no request captured")
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Stream builders --

/// Encode chunk payloads as an event stream, one body chunk per record,
/// terminated by the `[DONE]` sentinel
pub fn sse(records: &[Value]) -> Vec<Bytes> {
    records
        .iter()
        .map(|record| Bytes::from(format!("data: {record}\n\n")))
        .chain(std::iter::once(Bytes::from_static(b"data: [DONE]\n\n")))
        .collect()
}

/// Re-split a body at the given byte offsets, ignoring record boundaries
pub fn split_at(chunks: &[Bytes], offsets: &[usize]) -> Vec<Bytes> {
    let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
    let mut parts = Vec::with_capacity(offsets.len() + 1);
    let mut start = 0;

    for &offset in offsets {
        parts.push(Bytes::copy_from_slice(&joined[start..offset]));
        start = offset;
    }
    parts.push(Bytes::copy_from_slice(&joined[start..]));

    parts
}

/// Delta chunk carrying text
pub fn text_chunk(text: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"content": text}}]
    })
}

/// Delta chunk carrying one tool call fragment
pub fn tool_call_chunk(index: u32, id: Option<&str>, name: Option<&str>, arguments: &str) -> Value {
    let mut function = json!({"arguments": arguments});
    if let Some(name) = name {
        function["name"] = json!(name);
    }

    let mut call = json!({"index": index, "type": "function", "function": function});
    if let Some(id) = id {
        call["id"] = json!(id);
    }

    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {"tool_calls": [call]}}]
    })
}

/// Final chunk with a finish reason and an empty delta
pub fn finish_chunk(reason: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion.chunk",
        "choices": [{"index": 0, "delta": {}, "finish_reason": reason}]
    })
}

/// Plain text reply split into word-sized deltas
pub fn text_stream(text: &str) -> Vec<Bytes> {
    let mut records: Vec<Value> = text.split_inclusive(' ').map(text_chunk).collect();
    records.push(finish_chunk("stop"));
    sse(&records)
}

/// Error reply in the OpenAI error envelope
pub fn error_reply(status: StatusCode, message: &str) -> MockReply {
    MockReply::Error {
        status,
        body: json!({"error": {"message": message, "type": "server_error"}}),
    }
}

// -- Handlers --

async fn handle_chat_completions(
    State(state): State<Arc<MockLlmState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.completion_count.fetch_add(1, Ordering::Relaxed);
    state
        .captured
        .lock()
        .unwrap()
        .push(CapturedRequest { headers, body });

    let reply = state
        .replies
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| MockReply::Stream(text_stream("Hello from mock LLM")));

    match reply {
        MockReply::Stream(chunks) => event_stream(Body::from_stream(body_stream(chunks))),
        MockReply::Trickle { chunks, gap } => {
            let body = body_stream(chunks).then(move |chunk| async move {
                tokio::time::sleep(gap).await;
                chunk
            });
            event_stream(Body::from_stream(body))
        }
        MockReply::StreamThenStall(chunks) => {
            event_stream(Body::from_stream(body_stream(chunks).chain(stream::pending())))
        }
        MockReply::StreamThenAbort(chunks) => {
            // Give the server time to flush the chunks before the abort
            let abort = stream::once(async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "mock abort"))
            });
            event_stream(Body::from_stream(body_stream(chunks).chain(abort)))
        }
        MockReply::Error { status, body } => (status, Json(body)).into_response(),
        MockReply::Stall => std::future::pending().await,
    }
}

async fn handle_models(State(state): State<Arc<MockLlmState>>) -> Response {
    state.models_count.fetch_add(1, Ordering::Relaxed);

    let remaining = state.models_fail_count.load(Ordering::Relaxed);
    if remaining > 0 {
        state.models_fail_count.fetch_sub(1, Ordering::Relaxed);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": {"message": "models loading", "type": "server_error"}})),
        )
            .into_response();
    }

    let data: Vec<Value> = state
        .models
        .iter()
        .map(|id| json!({"id": id, "object": "model", "created": 1_700_000_000, "owned_by": "mock"}))
        .collect();

    Json(json!({"object": "list", "data": data})).into_response()
}

fn body_stream(chunks: Vec<Bytes>) -> impl futures_util::Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    stream::iter(chunks.into_iter().map(Ok))
}

fn event_stream(body: Body) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .body(body)
        .expect("valid response")
}
