// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for an OpenAI-compatible `/chat/completions` endpoint.
//!
//! The client performs exactly one HTTP exchange per call. Retries, fallbacks,
//! and per-call deadlines belong to the dispatcher.

use std::time::Duration;

use modelmux_core::{BackendFailure, ChatCompletionRequest, ChunkStream, MuxError};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::sse::{self, transport_failure};
use crate::types;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One upstream server. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl OpenAiClient {
    /// `base_url` is the API root, e.g. `https://api.example.com/v1`.
    pub fn new(base_url: &str, api_key: Option<SecretString>) -> Result<Self, MuxError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| MuxError::Server {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Non-streaming call. Returns the raw `chat.completion` object.
    pub async fn complete(&self, request: &ChatCompletionRequest) -> Result<Value, BackendFailure> {
        let mut req = request.clone();
        req.stream = false;

        let response = self.send(&req).await?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_failure(&e))?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| BackendFailure::protocol(format!("unparseable response body: {e}")))?;
        if value.get("choices").is_none() {
            return Err(BackendFailure::protocol("response has no `choices` field"));
        }
        Ok(value)
    }

    /// Streaming call. Resolves once response headers arrive.
    pub async fn stream(&self, request: &ChatCompletionRequest) -> Result<ChunkStream, BackendFailure> {
        let mut req = request.clone();
        req.stream = true;

        let response = self.send(&req).await?;
        Ok(sse::parse_sse_stream(response))
    }

    async fn send(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response, BackendFailure> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| transport_failure(&e))?;
        let status = response.status();
        debug!(status = %status, endpoint = %self.endpoint, stream = request.stream, "backend responded");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendFailure::from_status(
            status.as_u16(),
            types::error_message(&body),
        ))
    }
}
