// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `modelmux serve`: build the pipeline, bind, and run until a shutdown signal.

use std::sync::Arc;

use modelmux_config::ModelmuxConfig;
use modelmux_core::MuxError;
use modelmux_gateway::{GatewayState, HealthState, ServerConfig};
use modelmux_metrics::PrometheusExporter;
use tracing::info;

use crate::{app, shutdown};

pub async fn run_serve(config: ModelmuxConfig) -> Result<(), MuxError> {
    info!("starting modelmux serve");

    let components = app::build(&config)?;

    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        if config.metrics.prometheus {
            let exporter = PrometheusExporter::install()?;
            Some(Arc::new(move || exporter.render()))
        } else {
            info!("prometheus exporter disabled");
            None
        };

    let state = GatewayState {
        service: components.service,
        health: HealthState::new(prometheus_render),
    };

    let cancel = shutdown::install_signal_handler();
    modelmux_gateway::start_server(&ServerConfig::from(&config.server), state, cancel).await?;

    info!("modelmux serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("modelmux={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
