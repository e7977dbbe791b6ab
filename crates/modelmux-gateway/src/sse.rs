// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events encoding of a relayed completion stream.
//!
//! Wire format, matching the OpenAI streaming API:
//! ```text
//! data: {"object":"chat.completion.chunk","model":"modelmux",...}
//!
//! data: [DONE]
//! ```
//! A failure after output has started is sent as a single
//! `data: {"error":{...}}` event and is not followed by `[DONE]`.

use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use modelmux_router::{RelayEvent, RelayStream};
use tracing::warn;

use crate::error::ErrorResponse;

pub const DONE_SENTINEL: &str = "[DONE]";

/// Dropping the returned body (caller disconnect) drops the relay, which
/// cancels the backend read.
pub fn relay_to_sse(relay: RelayStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(relay.map(|event| Ok(encode(event))))
}

fn encode(event: RelayEvent) -> Event {
    match event {
        RelayEvent::Chunk(chunk) => Event::default().data(chunk.to_string()),
        RelayEvent::Done => Event::default().data(DONE_SENTINEL),
        RelayEvent::Failed(err) => {
            warn!(class = %err.class(), error = %err, "stream ended with an error event");
            let body = ErrorResponse::from(&err);
            let data = serde_json::to_string(&body)
                .unwrap_or_else(|_| r#"{"error":{"type":"internal_error"}}"#.to_string());
            Event::default().data(data)
        }
    }
}
