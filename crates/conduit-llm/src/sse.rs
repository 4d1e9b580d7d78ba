//! Server-sent event decoding
//!
//! Turns the raw byte stream of a chat completion response into normalized
//! [`StreamRecord`]s. Bytes are buffered until a full line has arrived, so
//! multi-byte characters split across network chunks decode correctly.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::protocol::openai::{OpenAiStreamChunk, OpenAiStreamDelta};

/// Terminal sentinel sent after the last chunk
const DONE_SENTINEL: &str = "[DONE]";

/// Longest line held while waiting for its terminator
pub const MAX_LINE_BYTES: usize = 8 * 1024 * 1024;

/// Which choice field a record was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Incremental `choices[0].delta`
    Delta,
    /// Complete `choices[0].message`
    Message,
}

/// One decoded chunk, normalized across the delta and message shapes
#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub response_id: Option<String>,
    pub shape: PayloadShape,
    pub payload: OpenAiStreamDelta,
    pub finish_reason: Option<String>,
}

/// Incremental line decoder for `text/event-stream` bodies
///
/// A line that grows past the limit without a terminator is dropped with a
/// warning, along with the rest of it as it arrives.
#[derive(Debug)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
    line_limit: usize,
    discarding: bool,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStreamDecoder {
    pub const fn new() -> Self {
        Self::with_line_limit(MAX_LINE_BYTES)
    }

    pub const fn with_line_limit(line_limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            line_limit,
            discarding: false,
        }
    }

    /// Feed a chunk, returning records for every line it completes
    pub fn push(&mut self, mut chunk: &[u8]) -> Vec<StreamRecord> {
        let mut records = Vec::new();

        if self.discarding {
            let Some(end) = chunk.iter().position(|b| *b == b'\n') else {
                return records;
            };
            self.discarding = false;
            chunk = &chunk[end + 1..];
        }

        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        let mut search = self.scanned;

        while let Some(offset) = self.buffer[search..].iter().position(|b| *b == b'\n') {
            let end = search + offset;
            records.extend(decode_line(&self.buffer[start..end]));
            start = end + 1;
            search = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.line_limit {
            tracing::warn!(
                bytes = self.buffer.len(),
                limit = self.line_limit,
                "dropping oversized stream line"
            );
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }

        records
    }

    /// Flush a trailing line that was never terminated
    pub fn finish(&mut self) -> Option<StreamRecord> {
        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        self.discarding = false;
        decode_line(&line)
    }

    /// Bytes held for an incomplete line
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<StreamRecord> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);

    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data).trim_end();

    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }

    match serde_json::from_str::<OpenAiStreamChunk>(data) {
        Ok(chunk) => record_from_chunk(chunk),
        Err(e) => {
            tracing::warn!(error = %e, line = %data, "skipping undecodable stream record");
            None
        }
    }
}

fn record_from_chunk(chunk: OpenAiStreamChunk) -> Option<StreamRecord> {
    let choice = chunk.choices.into_iter().next()?;

    // Some servers send an empty delta next to the full message
    let (shape, payload) = match (choice.delta, choice.message) {
        (Some(delta), Some(message)) if !has_output(&delta) && has_output(&message) => {
            (PayloadShape::Message, message)
        }
        (Some(delta), _) => (PayloadShape::Delta, delta),
        (None, Some(message)) => (PayloadShape::Message, message),
        (None, None) => (PayloadShape::Delta, OpenAiStreamDelta::default()),
    };

    Some(StreamRecord {
        response_id: chunk.id,
        shape,
        payload,
        finish_reason: choice.finish_reason,
    })
}

fn has_output(payload: &OpenAiStreamDelta) -> bool {
    payload.content.as_deref().is_some_and(|text| !text.is_empty())
        || payload.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
        || payload.function_call.is_some()
}

struct DecodeState<S> {
    bytes: Pin<Box<S>>,
    decoder: EventStreamDecoder,
    pending: VecDeque<StreamRecord>,
    cancel: CancellationToken,
    done: bool,
}

/// Decode a response byte stream into records
///
/// The stream ends when the body ends or when `cancel` fires; after
/// cancellation no further records are yielded, including ones already
/// buffered. A read error is yielded once as `LlmError::Streaming` and ends
/// the stream.
pub fn decode_stream<S, E>(
    bytes: S,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<StreamRecord, LlmError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: EventStreamDecoder::new(),
        pending: VecDeque::new(),
        cancel,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.cancel.is_cancelled() {
                return None;
            }

            if let Some(record) = state.pending.pop_front() {
                return Some((Ok(record), state));
            }

            if state.done {
                return None;
            }

            let next = tokio::select! {
                biased;
                () = state.cancel.cancelled() => return None,
                next = state.bytes.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let records = state.decoder.push(&chunk);
                    state.pending.extend(records);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(LlmError::Streaming(e.to_string())), state));
                }
                None => {
                    state.done = true;
                    let trailing = state.decoder.finish();
                    state.pending.extend(trailing);
                }
            }
        }
    })
}
