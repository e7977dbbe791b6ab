// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE parser for OpenAI-style `chat.completion.chunk` streams.
//!
//! Each `data:` payload is either a JSON chunk or the literal `[DONE]`. The
//! returned stream always terminates with `Done` or with an error: a body that
//! closes without `[DONE]` is reported as a connection failure.

use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::{self, StreamExt};
use modelmux_core::{BackendFailure, ChunkStream, StreamChunk};
use serde_json::Value;

use crate::types::ApiErrorResponse;

const DONE_SENTINEL: &str = "[DONE]";

/// Parses a streaming response body into [`StreamChunk`]s.
pub fn parse_sse_stream(response: reqwest::Response) -> ChunkStream {
    let events = Box::pin(response.bytes_stream().eventsource());

    let chunks = stream::unfold((events, false), |(mut events, finished)| async move {
        if finished {
            return None;
        }
        loop {
            let item = match events.next().await {
                Some(Ok(event)) => match parse_data(&event.data) {
                    Ok(None) => continue,
                    Ok(Some(chunk)) => Ok(chunk),
                    Err(failure) => Err(failure),
                },
                Some(Err(EventStreamError::Transport(e))) => Err(transport_failure(&e)),
                Some(Err(e)) => Err(BackendFailure::protocol(format!("SSE stream error: {e}"))),
                None => Err(BackendFailure::connection(
                    "stream closed before [DONE]",
                )),
            };
            let finished = !matches!(item, Ok(StreamChunk::Delta(_)));
            return Some((item, (events, finished)));
        }
    });

    Box::pin(chunks)
}

/// Interprets one `data:` payload. `Ok(None)` means skip.
pub fn parse_data(data: &str) -> Result<Option<StreamChunk>, BackendFailure> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == DONE_SENTINEL {
        return Ok(Some(StreamChunk::Done));
    }

    let value: Value = serde_json::from_str(data)
        .map_err(|e| BackendFailure::protocol(format!("unparseable stream chunk: {e}")))?;

    if value.get("choices").is_none() && value.get("error").is_some() {
        let message = serde_json::from_value::<ApiErrorResponse>(value)
            .map(|r| r.error.describe())
            .unwrap_or_else(|_| "unrecognized error event".to_string());
        return Err(BackendFailure::upstream(message));
    }

    Ok(Some(StreamChunk::Delta(value)))
}

pub(crate) fn transport_failure(e: &reqwest::Error) -> BackendFailure {
    if e.is_timeout() {
        BackendFailure::new(modelmux_core::FailureKind::Timeout, e.to_string())
    } else {
        BackendFailure::connection(e.to_string())
    }
}
