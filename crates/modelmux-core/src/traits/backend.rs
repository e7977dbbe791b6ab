// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend trait for OpenAI-compatible chat-completion endpoints.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde_json::Value;

use crate::chat::{ChatCompletionRequest, StreamChunk};
use crate::error::BackendFailure;

/// Stream of chunks from one backend call, in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, BackendFailure>> + Send>>;

/// A single backend model endpoint.
///
/// Implementations perform exactly one upstream call per method invocation.
/// They never retry and never enforce the per-call timeout themselves; the
/// dispatcher owns both concerns.
#[async_trait]
pub trait CompletionBackend: Send + Sync + 'static {
    /// Internal identifier of the model this backend serves.
    fn model_id(&self) -> &str;

    /// Sends a non-streaming request and returns the completion object.
    async fn complete(&self, request: ChatCompletionRequest) -> Result<Value, BackendFailure>;

    /// Sends a streaming request and returns the chunk stream once the
    /// backend has accepted it (2xx headers received).
    async fn stream(&self, request: ChatCompletionRequest) -> Result<ChunkStream, BackendFailure>;
}
