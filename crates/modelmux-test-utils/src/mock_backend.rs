// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted [`CompletionBackend`] double.
//!
//! Replies are popped from a FIFO queue; when it is empty the default reply is
//! used. Every call is recorded, and streams report how many items were read
//! and whether they were dropped, so tests can observe backpressure and
//! cancellation from the backend side.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use modelmux_core::{
    BackendFailure, ChatCompletionRequest, ChunkStream, CompletionBackend, StreamChunk,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A `chat.completion` whose assistant message is this text.
    Text(String),
    /// A raw response body, returned as-is.
    Json(Value),
    Fail(BackendFailure),
    /// Wait, then behave like the inner reply.
    Delay(Duration, Box<MockReply>),
    Stream(MockStream),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn status(code: u16) -> Self {
        MockReply::Fail(BackendFailure::from_status(code, format!("mock status {code}")))
    }

    pub fn delayed(self, by: Duration) -> Self {
        MockReply::Delay(by, Box::new(self))
    }

    /// A classifier answer in the structured-output shape.
    pub fn label(task_type: &str, confidence: f64) -> Self {
        let content = json!({"task_type": task_type, "confidence": confidence}).to_string();
        MockReply::Json(json!({
            "id": "chatcmpl-classify",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}]
        }))
    }
}

/// Script for a streaming reply.
#[derive(Debug, Clone, Default)]
pub struct MockStream {
    items: Vec<Result<StreamChunk, BackendFailure>>,
    interval: Duration,
    endless: bool,
    hang: bool,
}

impl MockStream {
    /// Content deltas followed by `[DONE]`.
    pub fn text<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut items: Vec<_> = pieces
            .into_iter()
            .map(|p| Ok(StreamChunk::Delta(chunk_json("mock-backend", p.as_ref()))))
            .collect();
        items.push(Ok(StreamChunk::Done));
        Self {
            items,
            ..Self::default()
        }
    }

    /// Content deltas with no terminator; the stream just ends.
    pub fn truncated<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut script = Self::text(pieces);
        script.items.pop();
        script
    }

    /// Yields deltas forever.
    pub fn endless() -> Self {
        Self {
            endless: true,
            ..Self::default()
        }
    }

    /// Replace the trailing `[DONE]` (if any) with a failure.
    pub fn then_fail(mut self, failure: BackendFailure) -> Self {
        if matches!(self.items.last(), Some(Ok(StreamChunk::Done))) {
            self.items.pop();
        }
        self.items.push(Err(failure));
        self
    }

    /// Replace the trailing `[DONE]` (if any) with a read that never completes.
    pub fn then_hang(mut self) -> Self {
        if matches!(self.items.last(), Some(Ok(StreamChunk::Done))) {
            self.items.pop();
        }
        self.hang = true;
        self
    }

    /// Sleep this long before every item.
    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[derive(Debug, Default)]
struct Probe {
    calls: AtomicUsize,
    chunks_read: AtomicUsize,
    streams_opened: AtomicUsize,
    streams_dropped: AtomicUsize,
}

/// Marks the stream dropped when the consumer lets go of it.
struct DropGuard(Arc<Probe>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.streams_dropped.fetch_add(1, Ordering::SeqCst);
    }
}

struct StreamState {
    items: VecDeque<Result<StreamChunk, BackendFailure>>,
    interval: Duration,
    endless: bool,
    hang: bool,
    seq: usize,
    model: String,
    probe: Arc<Probe>,
    _guard: DropGuard,
}

/// A scripted backend.
pub struct MockBackend {
    model_id: String,
    replies: Mutex<VecDeque<MockReply>>,
    default_reply: MockReply,
    requests: Mutex<Vec<ChatCompletionRequest>>,
    probe: Arc<Probe>,
}

impl MockBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            replies: Mutex::new(VecDeque::new()),
            default_reply: MockReply::text("mock response"),
            requests: Mutex::new(Vec::new()),
            probe: Arc::new(Probe::default()),
        }
    }

    pub fn with_replies(model_id: impl Into<String>, replies: Vec<MockReply>) -> Self {
        let backend = Self::new(model_id);
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            ..backend
        }
    }

    /// Reply used whenever the queue is empty.
    pub fn with_default(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    pub async fn push(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Number of `complete` and `stream` calls received.
    pub fn calls(&self) -> usize {
        self.probe.calls.load(Ordering::SeqCst)
    }

    /// Stream items handed to the consumer so far, across all streams.
    pub fn chunks_read(&self) -> usize {
        self.probe.chunks_read.load(Ordering::SeqCst)
    }

    pub fn streams_opened(&self) -> usize {
        self.probe.streams_opened.load(Ordering::SeqCst)
    }

    pub fn streams_dropped(&self) -> usize {
        self.probe.streams_dropped.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub async fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_reply(&self, request: ChatCompletionRequest) -> MockReply {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request);
        let mut reply = self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());
        while let MockReply::Delay(by, inner) = reply {
            tokio::time::sleep(by).await;
            reply = *inner;
        }
        reply
    }

    fn open_stream(&self, script: MockStream) -> ChunkStream {
        self.probe.streams_opened.fetch_add(1, Ordering::SeqCst);
        let state = StreamState {
            items: script.items.into(),
            interval: script.interval,
            endless: script.endless,
            hang: script.hang,
            seq: 0,
            model: self.model_id.clone(),
            probe: Arc::clone(&self.probe),
            _guard: DropGuard(Arc::clone(&self.probe)),
        };

        Box::pin(stream::unfold(state, |mut st| async move {
            if !st.interval.is_zero() {
                tokio::time::sleep(st.interval).await;
            }
            let item = match st.items.pop_front() {
                Some(Ok(StreamChunk::Delta(mut value))) => {
                    if let Value::Object(map) = &mut value {
                        map.insert("model".into(), Value::String(st.model.clone()));
                    }
                    Ok(StreamChunk::Delta(value))
                }
                Some(item) => item,
                None if st.endless => {
                    st.seq += 1;
                    Ok(StreamChunk::Delta(chunk_json(&st.model, &format!("tok{} ", st.seq))))
                }
                None if st.hang => {
                    std::future::pending::<()>().await;
                    return None;
                }
                None => return None,
            };
            st.probe.chunks_read.fetch_add(1, Ordering::SeqCst);
            Some((item, st))
        }))
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: ChatCompletionRequest) -> Result<Value, BackendFailure> {
        match self.next_reply(request).await {
            MockReply::Text(text) => Ok(completion_json(&self.model_id, &text)),
            MockReply::Json(value) => Ok(value),
            MockReply::Fail(failure) => Err(failure),
            MockReply::Stream(_) => Err(BackendFailure::protocol(
                "mock scripted a stream for a non-streaming call",
            )),
            MockReply::Delay(..) => Err(BackendFailure::protocol("unresolved mock delay")),
        }
    }

    async fn stream(&self, request: ChatCompletionRequest) -> Result<ChunkStream, BackendFailure> {
        match self.next_reply(request).await {
            MockReply::Stream(script) => Ok(self.open_stream(script)),
            MockReply::Text(text) => Ok(self.open_stream(MockStream::text([text]))),
            MockReply::Fail(failure) => Err(failure),
            MockReply::Json(_) => Err(BackendFailure::protocol(
                "mock scripted a JSON body for a streaming call",
            )),
            MockReply::Delay(..) => Err(BackendFailure::protocol("unresolved mock delay")),
        }
    }
}

/// A minimal `chat.completion` body.
pub fn completion_json(model: &str, text: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 0,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
    })
}

/// A minimal `chat.completion.chunk` carrying one content delta.
pub fn chunk_json(model: &str, text: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion.chunk",
        "created": 0,
        "model": model,
        "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
    })
}
