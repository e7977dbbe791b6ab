// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording through the metrics-rs facade.
//!
//! Every call is a no-op until a recorder is installed, so the collector can
//! feed these unconditionally.

use std::time::Duration;

use metrics::{describe_counter, describe_histogram};
use modelmux_core::{ErrorClass, TaskType};

pub const REQUESTS_TOTAL: &str = "modelmux_requests_total";
pub const FALLBACKS_TOTAL: &str = "modelmux_fallbacks_total";
pub const BACKEND_ERRORS_TOTAL: &str = "modelmux_backend_errors_total";
pub const FAILED_REQUESTS_TOTAL: &str = "modelmux_failed_requests_total";
pub const STREAM_CANCELLATIONS_TOTAL: &str = "modelmux_stream_cancellations_total";
pub const CLASSIFICATION_LATENCY_SECONDS: &str = "modelmux_classification_latency_seconds";

/// Register metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Requests served, by task type and model");
    describe_counter!(FALLBACKS_TOTAL, "Requests served by a fallback model");
    describe_counter!(BACKEND_ERRORS_TOTAL, "Backend attempt failures, by model and class");
    describe_counter!(FAILED_REQUESTS_TOTAL, "Requests that ended in an error, by class");
    describe_counter!(STREAM_CANCELLATIONS_TOTAL, "Streams abandoned by the caller");
    describe_histogram!(
        CLASSIFICATION_LATENCY_SECONDS,
        "Time spent classifying a request in seconds"
    );
}

pub fn record_routed(task_type: TaskType, model: &str, used_fallback: bool) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "task_type" => task_type.to_string(),
        "model" => model.to_string()
    )
    .increment(1);
    if used_fallback {
        metrics::counter!(FALLBACKS_TOTAL).increment(1);
    }
}

pub fn record_classification_latency(latency: Duration) {
    metrics::histogram!(CLASSIFICATION_LATENCY_SECONDS).record(latency.as_secs_f64());
}

pub fn record_backend_error(model: &str, class: ErrorClass) {
    metrics::counter!(
        BACKEND_ERRORS_TOTAL,
        "model" => model.to_string(),
        "class" => class.to_string()
    )
    .increment(1);
}

pub fn record_failed_request(class: ErrorClass) {
    metrics::counter!(FAILED_REQUESTS_TOTAL, "class" => class.to_string()).increment(1);
}

pub fn record_stream_cancelled() {
    metrics::counter!(STREAM_CANCELLATIONS_TOTAL).increment(1);
}
