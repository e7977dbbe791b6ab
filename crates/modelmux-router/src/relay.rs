// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming relay from a committed backend stream to the caller.
//!
//! A producer task reads the backend and pushes normalized events into a
//! bounded channel; the caller drains it through [`RelayStream`]. A full
//! channel parks the producer, which stops reading the backend. Dropping the
//! `RelayStream` cancels the producer, which drops the backend stream; a
//! watchdog aborts it if it has not stopped within the grace period.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use modelmux_config::RelayConfig;
use modelmux_core::{
    BackendFailure, ChunkStream, ErrorClass, ModelProfile, MuxError, StreamChunk, rewrite_model,
};
use modelmux_metrics::MetricsCollector;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    pub buffer_size: usize,
    pub cancel_grace: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            buffer_size: config.buffer_size.max(1),
            cancel_grace: Duration::from_millis(config.cancel_grace_ms),
        }
    }
}

/// What the caller sees.
#[derive(Debug)]
pub enum RelayEvent {
    /// A `chat.completion.chunk`, already carrying the public model name.
    Chunk(Value),
    /// The backend finished. Sent exactly once.
    Done,
    /// The backend failed after output was forwarded. Nothing follows.
    Failed(MuxError),
}

impl RelayEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayEvent::Chunk(_))
    }
}

pub(crate) struct RelayContext {
    pub profile: Arc<ModelProfile>,
    pub public_model_name: String,
    pub metrics: Arc<MetricsCollector>,
    pub settings: RelaySettings,
}

/// Caller side of a relay. Dropping it before the terminal event cancels the
/// backend read.
pub struct RelayStream {
    rx: mpsc::Receiver<RelayEvent>,
    token: CancellationToken,
    finished: bool,
    metrics: Arc<MetricsCollector>,
}

impl std::fmt::Debug for RelayStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Stream for RelayStream {
    type Item = RelayEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<RelayEvent>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(Some(RelayEvent::Failed(MuxError::Internal(
                    "stream relay stopped unexpectedly".to_string(),
                ))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.finished {
            self.token.cancel();
            self.metrics.record_stream_cancelled();
            debug!("caller left before the stream finished; cancelling backend read");
        }
    }
}

/// Starts relaying a committed stream whose first item was already read.
pub(crate) fn spawn_relay(first: StreamChunk, rest: ChunkStream, ctx: RelayContext) -> RelayStream {
    let (tx, rx) = mpsc::channel(ctx.settings.buffer_size);
    let token = CancellationToken::new();
    let metrics = Arc::clone(&ctx.metrics);
    let grace = ctx.settings.cancel_grace;
    let model = ctx.profile.id.clone();

    let mut producer = tokio::spawn(produce(first, rest, tx, token.clone(), ctx));

    let watchdog = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = &mut producer => {}
            _ = watchdog.cancelled() => {
                if tokio::time::timeout(grace, &mut producer).await.is_err() {
                    producer.abort();
                    warn!(model = %model, "relay producer ignored cancellation; aborted");
                }
            }
        }
    });

    RelayStream {
        rx,
        token,
        finished: false,
        metrics,
    }
}

async fn produce(
    first: StreamChunk,
    mut rest: ChunkStream,
    tx: mpsc::Sender<RelayEvent>,
    token: CancellationToken,
    ctx: RelayContext,
) {
    let idle = ctx.profile.timeout;
    let mut pending = Some(Ok(first));
    let mut forwarded = 0usize;

    loop {
        let item = match pending.take() {
            Some(item) => item,
            None => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tx.closed() => break,
                    read = tokio::time::timeout(idle, rest.next()) => match read {
                        Ok(Some(item)) => item,
                        Ok(None) => Err(BackendFailure::connection("stream closed before [DONE]")),
                        Err(_) => Err(BackendFailure::timeout(idle)),
                    },
                }
            }
        };

        let event = match item {
            Ok(StreamChunk::Delta(mut chunk)) => {
                rewrite_model(&mut chunk, &ctx.public_model_name);
                RelayEvent::Chunk(chunk)
            }
            Ok(StreamChunk::Done) => RelayEvent::Done,
            Err(failure) => {
                warn!(
                    model = %ctx.profile.id,
                    forwarded,
                    error = %failure,
                    "backend failed mid-stream"
                );
                ctx.metrics
                    .record_error(&ctx.profile.name, ErrorClass::MidStreamFailure);
                ctx.metrics.record_failed_request(ErrorClass::MidStreamFailure);
                RelayEvent::Failed(MuxError::MidStream {
                    model: ctx.profile.name.clone(),
                    failure,
                })
            }
        };

        let terminal = event.is_terminal();
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = tx.send(event) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        if terminal {
            debug!(model = %ctx.profile.id, forwarded, "relay finished");
            return;
        }
        forwarded += 1;
    }

    drop(rest);
    debug!(model = %ctx.profile.id, forwarded, "relay cancelled; backend stream dropped");
}
