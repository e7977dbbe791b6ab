// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing metrics for Modelmux.
//!
//! [`MetricsCollector`] is the injected aggregate behind `GET /metrics`. It
//! also feeds the metrics-rs facade, which [`PrometheusExporter`] renders as
//! Prometheus text when enabled.

pub mod collector;
pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use modelmux_core::MuxError;

pub use collector::{MetricsCollector, MetricsSnapshot};

/// Prometheus text exposition.
#[derive(Clone)]
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    /// Installs the Prometheus recorder globally.
    ///
    /// Only one recorder can exist per process; a second call fails.
    pub fn install() -> Result<Self, MuxError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            MuxError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    /// Wraps an existing handle, e.g. one built with `build_recorder` in tests.
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}
