// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequential candidate dispatch with fallback.
//!
//! Candidates are tried strictly one at a time in routing order. A retryable
//! failure moves on to the next candidate; a non-retryable one ends the
//! request. For streaming requests a candidate is committed once its first
//! item arrives, and nothing after that point falls back.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use modelmux_core::{
    BackendFailure, ChatCompletionRequest, ChunkStream, CompletionBackend, ErrorClass,
    ModelProfile, MuxError, StreamChunk, rewrite_model,
};
use modelmux_metrics::MetricsCollector;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::phase::RequestPhase;
use crate::relay::{RelayContext, RelaySettings, RelayStream, spawn_relay};
use crate::router::RoutingDecision;

/// Result of one backend attempt.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success(T),
    RetryableFailure(BackendFailure),
    NonRetryableFailure(BackendFailure),
}

impl<T> From<BackendFailure> for AttemptOutcome<T> {
    fn from(failure: BackendFailure) -> Self {
        if failure.is_retryable() {
            AttemptOutcome::RetryableFailure(failure)
        } else {
            AttemptOutcome::NonRetryableFailure(failure)
        }
    }
}

type OpenedStream = (StreamChunk, ChunkStream);

pub struct Dispatcher {
    backends: HashMap<String, Arc<dyn CompletionBackend>>,
    metrics: Arc<MetricsCollector>,
    public_model_name: String,
    relay: RelaySettings,
}

impl Dispatcher {
    /// `backends` is keyed by model id.
    pub fn new(
        backends: HashMap<String, Arc<dyn CompletionBackend>>,
        metrics: Arc<MetricsCollector>,
        public_model_name: impl Into<String>,
        relay: RelaySettings,
    ) -> Self {
        Self {
            backends,
            metrics,
            public_model_name: public_model_name.into(),
            relay,
        }
    }

    pub fn public_model_name(&self) -> &str {
        &self.public_model_name
    }

    /// Serves a non-streaming request, returning the backend's body with its
    /// `model` field replaced by the public name.
    pub async fn execute(
        &self,
        request: &ChatCompletionRequest,
        decision: &RoutingDecision,
    ) -> Result<Value, MuxError> {
        let (mut body, _) = self
            .run(decision, |profile| self.attempt_complete(profile, request))
            .await?;
        rewrite_model(&mut body, &self.public_model_name);
        Ok(body)
    }

    /// Opens a stream on the first candidate that produces output and hands
    /// it to a relay.
    pub async fn execute_stream(
        &self,
        request: &ChatCompletionRequest,
        decision: &RoutingDecision,
    ) -> Result<RelayStream, MuxError> {
        let ((first, rest), profile) = self
            .run(decision, |profile| self.attempt_stream(profile, request))
            .await?;
        Ok(spawn_relay(
            first,
            rest,
            RelayContext {
                profile,
                public_model_name: self.public_model_name.clone(),
                metrics: Arc::clone(&self.metrics),
                settings: self.relay,
            },
        ))
    }

    async fn run<T, F, Fut>(
        &self,
        decision: &RoutingDecision,
        mut attempt: F,
    ) -> Result<(T, Arc<ModelProfile>), MuxError>
    where
        F: FnMut(Arc<ModelProfile>) -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        let mut attempted = Vec::with_capacity(decision.candidates.len());
        let mut last: Option<(Arc<ModelProfile>, BackendFailure)> = None;

        for (index, profile) in decision.candidates.iter().enumerate() {
            debug!(phase = %RequestPhase::Attempting(index), model = %profile.id, "trying candidate");
            attempted.push(profile.name.clone());

            match attempt(Arc::clone(profile)).await {
                AttemptOutcome::Success(value) => {
                    info!(
                        phase = %RequestPhase::Succeeded,
                        task_type = %decision.task_type(),
                        model = %profile.id,
                        attempt = index,
                        "request served"
                    );
                    self.metrics.record_routing(
                        decision.task_type(),
                        &profile.name,
                        decision.classification.elapsed,
                        index > 0,
                    );
                    return Ok((value, Arc::clone(profile)));
                }
                AttemptOutcome::RetryableFailure(failure) => {
                    warn!(
                        model = %profile.id,
                        attempt = index,
                        error = %failure,
                        "retryable backend failure"
                    );
                    self.metrics
                        .record_error(&profile.name, ErrorClass::RetryableBackendError);
                    last = Some((Arc::clone(profile), failure));
                }
                AttemptOutcome::NonRetryableFailure(failure) => {
                    warn!(
                        model = %profile.id,
                        attempt = index,
                        error = %failure,
                        "backend rejected request; not falling back"
                    );
                    self.metrics
                        .record_error(&profile.name, ErrorClass::NonRetryableBackendError);
                    return Err(self.fail(
                        decision,
                        MuxError::NonRetryable {
                            model: profile.name.clone(),
                            failure,
                        },
                    ));
                }
            }
        }

        let err = match last {
            Some((profile, failure)) => MuxError::AllCandidatesExhausted {
                attempted,
                last_model: profile.name.clone(),
                failure,
            },
            None => MuxError::Internal("routing produced no candidates".to_string()),
        };
        Err(self.fail(decision, err))
    }

    fn fail(&self, decision: &RoutingDecision, err: MuxError) -> MuxError {
        debug!(phase = %RequestPhase::Failed, class = %err.class(), "request failed");
        self.metrics
            .record_unserved_classification(decision.classification.elapsed);
        self.metrics.record_failed_request(err.class());
        err
    }

    fn backend_for(&self, profile: &ModelProfile) -> Result<Arc<dyn CompletionBackend>, BackendFailure> {
        self.backends.get(&profile.id).cloned().ok_or_else(|| {
            BackendFailure::connection(format!("no backend client for `{}`", profile.id))
        })
    }

    async fn attempt_complete(
        &self,
        profile: Arc<ModelProfile>,
        request: &ChatCompletionRequest,
    ) -> AttemptOutcome<Value> {
        let backend = match self.backend_for(&profile) {
            Ok(backend) => backend,
            Err(failure) => return failure.into(),
        };
        let outbound = outbound_request(request, &profile);
        match tokio::time::timeout(profile.timeout, backend.complete(outbound)).await {
            Ok(Ok(body)) => AttemptOutcome::Success(body),
            Ok(Err(failure)) => failure.into(),
            Err(_) => BackendFailure::timeout(profile.timeout).into(),
        }
    }

    /// The timeout covers opening the stream and receiving its first item.
    async fn attempt_stream(
        &self,
        profile: Arc<ModelProfile>,
        request: &ChatCompletionRequest,
    ) -> AttemptOutcome<OpenedStream> {
        let backend = match self.backend_for(&profile) {
            Ok(backend) => backend,
            Err(failure) => return failure.into(),
        };
        let outbound = outbound_request(request, &profile);
        match tokio::time::timeout(profile.timeout, open_and_peek(backend, outbound)).await {
            Ok(Ok(opened)) => AttemptOutcome::Success(opened),
            Ok(Err(failure)) => failure.into(),
            Err(_) => BackendFailure::timeout(profile.timeout).into(),
        }
    }
}

async fn open_and_peek(
    backend: Arc<dyn CompletionBackend>,
    request: ChatCompletionRequest,
) -> Result<OpenedStream, BackendFailure> {
    let mut stream = backend.stream(request).await?;
    match stream.next().await {
        Some(Ok(first)) => Ok((first, stream)),
        Some(Err(failure)) => Err(failure),
        None => Err(BackendFailure::connection(
            "stream closed before the first chunk",
        )),
    }
}

/// The request as sent to `profile`: its id as `model` and output capped at
/// its token limit.
pub fn outbound_request(request: &ChatCompletionRequest, profile: &ModelProfile) -> ChatCompletionRequest {
    let limit = profile.max_output_tokens;
    let mut out = request.clone();
    out.model = Some(profile.id.clone());

    let completion_tokens = out
        .extra
        .get("max_completion_tokens")
        .and_then(Value::as_u64);
    if let Some(requested) = completion_tokens {
        out.extra.insert(
            "max_completion_tokens".to_string(),
            Value::from(requested.min(u64::from(limit))),
        );
        out.max_tokens = out.max_tokens.map(|m| m.min(limit));
    } else {
        out.max_tokens = Some(out.max_tokens.map_or(limit, |m| m.min(limit)));
    }
    out
}
