// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the Modelmux router.
//!
//! Two levels exist. [`BackendFailure`] describes what went wrong with a single
//! backend attempt and decides whether another candidate may be tried.
//! [`MuxError`] is what a request finally ends with once the dispatcher has
//! made up its mind.

use std::time::Duration;

use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;

/// Machine-readable error class carried in every caller-visible error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The auxiliary classifier call failed. Always absorbed.
    ClassificationFailure,
    /// Rate limit, server fault, timeout, or connection failure before output.
    RetryableBackendError,
    /// Any other non-success backend response.
    NonRetryableBackendError,
    /// Every candidate failed retryably.
    AllCandidatesExhausted,
    /// Backend failure after output already reached the caller.
    MidStreamFailure,
    /// The inbound request was malformed.
    InvalidRequest,
    /// Unexpected router-side fault.
    InternalError,
}

/// What kind of failure a backend attempt produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    ServerError(u16),
    /// Any other non-2xx status.
    Rejected(u16),
    /// The per-call timeout elapsed.
    Timeout,
    /// Transport-level failure (refused, reset, DNS, truncated stream).
    Connection,
    /// A 2xx response whose body or event stream could not be understood.
    Protocol,
    /// The backend sent an error event inside an otherwise successful stream.
    Upstream,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::RateLimited => write!(f, "rate limited (429)"),
            FailureKind::ServerError(code) => write!(f, "server error ({code})"),
            FailureKind::Rejected(code) => write!(f, "rejected ({code})"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Connection => write!(f, "connection failure"),
            FailureKind::Protocol => write!(f, "malformed response"),
            FailureKind::Upstream => write!(f, "upstream error"),
        }
    }
}

/// The failure of one backend attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct BackendFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl BackendFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Maps a non-success HTTP status to its failure kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            429 => FailureKind::RateLimited,
            500..=599 => FailureKind::ServerError(status),
            _ => FailureKind::Rejected(status),
        };
        Self::new(kind, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Connection, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Protocol, message)
    }

    /// An error the backend reported in-band, carrying its own message.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Upstream, message)
    }

    /// Whether the message may leak transport detail (addresses, URLs).
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, FailureKind::Connection | FailureKind::Timeout)
    }

    /// Whether trying a different backend can be expected to help.
    ///
    /// Only `Rejected` is final: the same request would be rejected again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind, FailureKind::Rejected(_))
    }

    /// The upstream HTTP status, when the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::RateLimited => Some(429),
            FailureKind::ServerError(code) | FailureKind::Rejected(code) => Some(code),
            _ => None,
        }
    }
}

/// Terminal error of a routed request.
///
/// Model fields hold the human-readable profile name, never the internal
/// backend identifier, so they are safe to show to callers.
#[derive(Debug, Error)]
pub enum MuxError {
    /// Startup configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The inbound request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A backend rejected the request; no other candidate was tried.
    #[error("backend `{model}` rejected the request: {failure}")]
    NonRetryable {
        model: String,
        failure: BackendFailure,
    },

    /// Every candidate failed retryably.
    #[error("all candidates exhausted; last backend `{last_model}` failed with {failure}")]
    AllCandidatesExhausted {
        attempted: Vec<String>,
        last_model: String,
        failure: BackendFailure,
    },

    /// The committed backend failed after output reached the caller.
    #[error("backend `{model}` failed mid-stream: {failure}")]
    MidStream {
        model: String,
        failure: BackendFailure,
    },

    /// HTTP server lifecycle errors (bind, serve).
    #[error("server error: {message}")]
    Server {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MuxError {
    /// The machine-readable class reported to callers.
    pub fn class(&self) -> ErrorClass {
        match self {
            MuxError::InvalidRequest(_) => ErrorClass::InvalidRequest,
            MuxError::NonRetryable { .. } => ErrorClass::NonRetryableBackendError,
            MuxError::AllCandidatesExhausted { .. } => ErrorClass::AllCandidatesExhausted,
            MuxError::MidStream { .. } => ErrorClass::MidStreamFailure,
            MuxError::Config(_) | MuxError::Server { .. } | MuxError::Internal(_) => {
                ErrorClass::InternalError
            }
        }
    }
}
