// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-visible error bodies.
//!
//! The body keeps the error class, the human-readable model name, and the
//! upstream status and message. Transport details such as backend URLs are
//! only logged.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use modelmux_core::{BackendFailure, ErrorClass, MuxError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub class: ErrorClass,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Upstream HTTP status, when the failure came from one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempted: Vec<String>,
}

impl From<&MuxError> for ErrorResponse {
    fn from(err: &MuxError) -> Self {
        let (model, status, attempted) = match err {
            MuxError::NonRetryable { model, failure } | MuxError::MidStream { model, failure } => {
                (Some(model.clone()), failure.status(), Vec::new())
            }
            MuxError::AllCandidatesExhausted {
                attempted,
                last_model,
                failure,
            } => (Some(last_model.clone()), failure.status(), attempted.clone()),
            _ => (None, None, Vec::new()),
        };
        Self {
            error: ErrorDetail {
                class: err.class(),
                message: caller_message(err),
                model,
                status,
                attempted,
            },
        }
    }
}

fn caller_message(err: &MuxError) -> String {
    match err {
        MuxError::InvalidRequest(_) => err.to_string(),
        MuxError::NonRetryable { model, failure } => {
            format!("backend `{model}` rejected the request: {}", failure.message)
        }
        MuxError::AllCandidatesExhausted {
            last_model, failure, ..
        } => format!(
            "all candidates exhausted; last backend `{last_model}` failed with {}",
            describe(failure)
        ),
        MuxError::MidStream { model, failure } => {
            format!("backend `{model}` failed mid-stream: {}", describe(failure))
        }
        MuxError::Config(_) | MuxError::Server { .. } | MuxError::Internal(_) => {
            "internal error".to_string()
        }
    }
}

/// Upstream messages are passed through; transport errors are reduced to
/// their kind.
fn describe(failure: &BackendFailure) -> String {
    if failure.is_transport() {
        failure.kind.to_string()
    } else {
        failure.to_string()
    }
}

/// An error response ready to send.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    /// A request the gateway itself refused before routing.
    pub fn invalid_request(status: StatusCode, message: impl Into<String>) -> Self {
        Self::from(MuxError::InvalidRequest(message.into())).with_status(status)
    }

    fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<MuxError> for ApiError {
    fn from(err: MuxError) -> Self {
        let status = match &err {
            MuxError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MuxError::NonRetryable { failure, .. } => failure
                .status()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            MuxError::AllCandidatesExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            MuxError::MidStream { .. } => StatusCode::BAD_GATEWAY,
            MuxError::Config(_) | MuxError::Server { .. } | MuxError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            body: ErrorResponse::from(&err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use modelmux_core::BackendFailure;
    use serde_json::json;

    use super::*;

    #[test]
    fn non_retryable_keeps_upstream_status_and_message() {
        let err = ApiError::from(MuxError::NonRetryable {
            model: "Coder".into(),
            failure: BackendFailure::from_status(422, "tool schema invalid"),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = serde_json::to_value(&err.body).unwrap();
        assert_eq!(body["error"]["type"], "non_retryable_backend_error");
        assert_eq!(body["error"]["model"], "Coder");
        assert_eq!(body["error"]["status"], 422);
        assert!(
            body["error"]["message"]
                .as_str()
                .unwrap()
                .contains("tool schema invalid")
        );
    }

    #[test]
    fn exhausted_hides_transport_detail() {
        let err = ApiError::from(MuxError::AllCandidatesExhausted {
            attempted: vec!["Fast".into(), "Big".into()],
            last_model: "Big".into(),
            failure: BackendFailure::connection(
                "error sending request for url (http://10.0.0.7:8000/v1/chat/completions)",
            ),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = serde_json::to_value(&err.body).unwrap();
        assert_eq!(body["error"]["attempted"], json!(["Fast", "Big"]));
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("`Big`"));
        assert!(!message.contains("10.0.0.7"));
        assert!(body["error"].get("status").is_none());
    }

    #[test]
    fn in_band_stream_error_keeps_upstream_message() {
        let err = ApiError::from(MuxError::MidStream {
            model: "Fast".into(),
            failure: BackendFailure::upstream("server_error: model overloaded"),
        });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let body = serde_json::to_value(&err.body).unwrap();
        assert_eq!(body["error"]["type"], "mid_stream_failure");
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("model overloaded"), "{message}");
        assert!(message.contains("`Fast`"));
    }

    #[test]
    fn exhausted_keeps_last_in_band_message() {
        let err = ApiError::from(MuxError::AllCandidatesExhausted {
            attempted: vec!["Fast".into()],
            last_model: "Fast".into(),
            failure: BackendFailure::upstream("server_error: model overloaded"),
        });
        let body = serde_json::to_value(&err.body).unwrap();
        assert!(
            body["error"]["message"]
                .as_str()
                .unwrap()
                .contains("model overloaded")
        );
    }

    #[test]
    fn mid_stream_timeout_is_reduced_to_its_kind() {
        let err = ApiError::from(MuxError::MidStream {
            model: "Fast".into(),
            failure: BackendFailure::timeout(std::time::Duration::from_secs(30)),
        });
        let body = serde_json::to_value(&err.body).unwrap();
        assert_eq!(
            body["error"]["message"],
            "backend `Fast` failed mid-stream: timeout"
        );
    }

    #[test]
    fn internal_errors_are_opaque() {
        let err = ApiError::from(MuxError::Config("api key env MY_SECRET missing".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_value(&err.body).unwrap();
        assert_eq!(body["error"]["message"], "internal error");
        assert_eq!(body["error"]["type"], "internal_error");
    }

    #[test]
    fn invalid_request_can_carry_its_own_status() {
        let err = ApiError::invalid_request(StatusCode::PAYLOAD_TOO_LARGE, "body too large");
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
