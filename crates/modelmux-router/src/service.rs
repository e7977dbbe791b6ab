// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use modelmux_core::{ChatCompletionRequest, MuxError};
use modelmux_metrics::MetricsCollector;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::classifier::TaskClassifier;
use crate::dispatcher::Dispatcher;
use crate::phase::RequestPhase;
use crate::relay::RelayStream;
use crate::router::{ModelRouter, RoutingDecision};

/// Classify, route, and dispatch one request. Shared by every HTTP handler.
pub struct RoutingService {
    classifier: TaskClassifier,
    router: ModelRouter,
    dispatcher: Dispatcher,
    metrics: Arc<MetricsCollector>,
}

impl RoutingService {
    pub fn new(
        classifier: TaskClassifier,
        router: ModelRouter,
        dispatcher: Dispatcher,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            classifier,
            router,
            dispatcher,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn public_model_name(&self) -> &str {
        self.dispatcher.public_model_name()
    }

    /// Classification and candidate selection without dispatch.
    pub async fn plan(&self, request: &ChatCompletionRequest) -> RoutingDecision {
        debug!(phase = %RequestPhase::Classifying);
        let classification = self.classifier.classify(request).await;

        debug!(
            phase = %RequestPhase::Selecting,
            task_type = %classification.task_type,
            source = %classification.source,
            confidence = classification.confidence,
        );
        let decision = self.router.route(request, &classification);
        debug!(candidates = ?decision.names(), "candidates selected");
        decision
    }

    #[instrument(skip_all, fields(stream = false))]
    pub async fn complete(&self, request: ChatCompletionRequest) -> Result<Value, MuxError> {
        self.check(&request)?;
        let decision = self.plan(&request).await;
        self.dispatcher.execute(&request, &decision).await
    }

    /// Returns once a backend has committed; events then flow through the
    /// returned stream.
    #[instrument(skip_all, fields(stream = true))]
    pub async fn stream(&self, request: ChatCompletionRequest) -> Result<RelayStream, MuxError> {
        self.check(&request)?;
        let decision = self.plan(&request).await;
        self.dispatcher.execute_stream(&request, &decision).await
    }

    fn check(&self, request: &ChatCompletionRequest) -> Result<(), MuxError> {
        if request.messages.is_empty() {
            let err = MuxError::InvalidRequest("`messages` must not be empty".to_string());
            self.metrics.record_failed_request(err.class());
            return Err(err);
        }
        Ok(())
    }
}
