// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Handles POST /v1/chat/completions, GET /v1/models, GET /health,
//! GET /metrics, and GET /metrics/prometheus.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use modelmux_core::{ChatCompletionRequest, ErrorClass};
use modelmux_metrics::MetricsSnapshot;
use serde::Serialize;
use tracing::{Instrument, info_span};

use crate::error::ApiError;
use crate::server::GatewayState;
use crate::sse;

/// Header carrying the id of the request's tracing span.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Response body for GET /v1/models.
#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelCard>,
}

#[derive(Debug, Serialize)]
pub struct ModelCard {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: &'static str,
}

/// POST /v1/chat/completions
///
/// Routes the request and answers with either one JSON completion or, when
/// `stream` is true, an SSE stream of chunks.
pub async fn post_chat_completions(
    State(state): State<GatewayState>,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("chat_request", request_id = %request_id);

    let mut response = async move {
        let request = match body {
            Ok(Json(request)) => request,
            Err(rejection) => {
                state
                    .service
                    .metrics()
                    .record_failed_request(ErrorClass::InvalidRequest);
                return ApiError::invalid_request(rejection_status(&rejection), rejection.body_text())
                    .into_response();
            }
        };

        if request.stream {
            match state.service.stream(request).await {
                Ok(relay) => sse::relay_to_sse(relay).into_response(),
                Err(err) => ApiError::from(err).into_response(),
            }
        } else {
            match state.service.complete(request).await {
                Ok(completion) => Json(completion).into_response(),
                Err(err) => ApiError::from(err).into_response(),
            }
        }
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn rejection_status(rejection: &JsonRejection) -> StatusCode {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        StatusCode::BAD_REQUEST
    }
}

/// GET /v1/models
///
/// Advertises the single public model name, never a backend identifier.
pub async fn get_models(State(state): State<GatewayState>) -> Json<ModelList> {
    Json(ModelList {
        object: "list",
        data: vec![ModelCard {
            id: state.service.public_model_name().to_string(),
            object: "model",
            created: state.health.started_at.timestamp(),
            owned_by: "modelmux",
        }],
    })
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
pub async fn get_metrics(State(state): State<GatewayState>) -> Json<MetricsSnapshot> {
    Json(state.service.metrics().snapshot())
}

/// GET /metrics/prometheus
///
/// Returns 404 when the Prometheus exporter is disabled.
pub async fn get_prometheus(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
