// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide routing aggregate.
//!
//! One `MetricsCollector` is built at startup and shared by `Arc` with every
//! component that records. Counters are atomics or per-key dashmap entries,
//! so no lock is ever held across a network call. A snapshot is a
//! point-in-time approximation, not a consistent cut.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use modelmux_core::{ErrorClass, TaskType};
use serde::Serialize;

use crate::recording;

#[derive(Debug, Default)]
pub struct MetricsCollector {
    total_requests: AtomicU64,
    fallback_count: AtomicU64,
    classifications: AtomicU64,
    classification_micros: AtomicU64,
    cancelled_streams: AtomicU64,
    by_task_type: DashMap<TaskType, u64>,
    by_model: DashMap<String, u64>,
    errors: DashMap<(String, ErrorClass), u64>,
    failed: DashMap<ErrorClass, u64>,
}

/// Serialized by `GET /metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub requests_by_task_type: BTreeMap<String, u64>,
    pub requests_by_model: BTreeMap<String, u64>,
    pub fallback_count: u64,
    pub fallback_rate: f64,
    pub average_classification_latency_ms: f64,
    pub errors_by_model: BTreeMap<String, u64>,
    pub errors_by_class: BTreeMap<String, u64>,
    pub failed_requests: BTreeMap<String, u64>,
    pub cancelled_streams: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per successfully served request.
    pub fn record_routing(
        &self,
        task_type: TaskType,
        model: &str,
        classification_latency: Duration,
        used_fallback: bool,
    ) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if used_fallback {
            self.fallback_count.fetch_add(1, Ordering::Relaxed);
        }
        self.add_classification(classification_latency);
        *self.by_task_type.entry(task_type).or_insert(0) += 1;
        *self.by_model.entry(model.to_string()).or_insert(0) += 1;

        recording::record_routed(task_type, model, used_fallback);
    }

    /// Classification time of a request that no backend ended up serving.
    ///
    /// Served requests report theirs through [`record_routing`](Self::record_routing),
    /// so together every classified request enters the average once.
    pub fn record_unserved_classification(&self, latency: Duration) {
        self.add_classification(latency);
    }

    fn add_classification(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.classifications.fetch_add(1, Ordering::Relaxed);
        self.classification_micros.fetch_add(micros, Ordering::Relaxed);
        recording::record_classification_latency(latency);
    }

    /// One failed backend attempt, absorbed or not.
    pub fn record_error(&self, model: &str, class: ErrorClass) {
        *self.errors.entry((model.to_string(), class)).or_insert(0) += 1;
        recording::record_backend_error(model, class);
    }

    /// A request that ended in a caller-visible error.
    pub fn record_failed_request(&self, class: ErrorClass) {
        *self.failed.entry(class).or_insert(0) += 1;
        recording::record_failed_request(class);
    }

    pub fn record_stream_cancelled(&self) {
        self.cancelled_streams.fetch_add(1, Ordering::Relaxed);
        recording::record_stream_cancelled();
    }

    /// Error count for one model across all classes.
    pub fn errors_for(&self, model: &str) -> u64 {
        self.errors
            .iter()
            .filter(|entry| entry.key().0 == model)
            .map(|entry| *entry.value())
            .sum()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let fallback_count = self.fallback_count.load(Ordering::Relaxed);
        let classifications = self.classifications.load(Ordering::Relaxed);
        let micros = self.classification_micros.load(Ordering::Relaxed);

        let fallback_rate = if total_requests == 0 {
            0.0
        } else {
            fallback_count as f64 / total_requests as f64
        };
        let average_classification_latency_ms = if classifications == 0 {
            0.0
        } else {
            micros as f64 / 1000.0 / classifications as f64
        };

        let mut errors_by_model = BTreeMap::new();
        let mut errors_by_class = BTreeMap::new();
        for entry in self.errors.iter() {
            let ((model, class), count) = (entry.key(), *entry.value());
            *errors_by_model.entry(model.clone()).or_insert(0) += count;
            *errors_by_class.entry(class.to_string()).or_insert(0) += count;
        }

        MetricsSnapshot {
            total_requests,
            requests_by_task_type: self
                .by_task_type
                .iter()
                .map(|e| (e.key().to_string(), *e.value()))
                .collect(),
            requests_by_model: self
                .by_model
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            fallback_count,
            fallback_rate,
            average_classification_latency_ms,
            errors_by_model,
            errors_by_class,
            failed_requests: self
                .failed
                .iter()
                .map(|e| (e.key().to_string(), *e.value()))
                .collect(),
            cancelled_streams: self.cancelled_streams.load(Ordering::Relaxed),
        }
    }
}
