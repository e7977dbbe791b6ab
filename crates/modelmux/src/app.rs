// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builds the routing pipeline from validated configuration.

use std::collections::HashMap;
use std::sync::Arc;

use modelmux_config::{ModelConfig, ModelmuxConfig};
use modelmux_core::{CompletionBackend, MuxError};
use modelmux_metrics::MetricsCollector;
use modelmux_openai::OpenAiBackend;
use modelmux_router::{
    Dispatcher, ModelRegistry, ModelRouter, RelaySettings, RoutingService, TaskClassifier,
};
use tracing::info;

pub struct Components {
    pub registry: Arc<ModelRegistry>,
    pub service: Arc<RoutingService>,
    pub metrics: Arc<MetricsCollector>,
}

/// Enforces the routing invariants over the configured models.
pub fn build_registry(config: &ModelmuxConfig) -> Result<Arc<ModelRegistry>, MuxError> {
    let profiles = config.models.iter().map(ModelConfig::profile).collect();
    let registry = ModelRegistry::new(profiles, config.routing.max_candidates)?;
    Ok(Arc::new(registry))
}

fn build_backends(
    config: &ModelmuxConfig,
) -> Result<HashMap<String, Arc<dyn CompletionBackend>>, MuxError> {
    let mut backends: HashMap<String, Arc<dyn CompletionBackend>> = HashMap::new();
    for model in &config.models {
        let backend = OpenAiBackend::from_model_config(model)?;
        backends.insert(model.id.clone(), Arc::new(backend));
    }
    Ok(backends)
}

fn build_classifier(config: &ModelmuxConfig) -> Result<TaskClassifier, MuxError> {
    let auxiliary = OpenAiBackend::from_classifier_config(&config.classifier)?.map(|backend| {
        let backend: Arc<dyn CompletionBackend> = Arc::new(backend);
        backend
    });
    if auxiliary.is_none() {
        info!("no classifier endpoint configured; non-trivial requests route as general text");
    }
    Ok(TaskClassifier::new(&config.classifier, auxiliary))
}

pub fn build(config: &ModelmuxConfig) -> Result<Components, MuxError> {
    let registry = build_registry(config)?;
    let metrics = Arc::new(MetricsCollector::new());
    let dispatcher = Dispatcher::new(
        build_backends(config)?,
        Arc::clone(&metrics),
        config.server.public_model_name.clone(),
        RelaySettings::from(&config.relay),
    );
    let service = RoutingService::new(
        build_classifier(config)?,
        ModelRouter::new(Arc::clone(&registry)),
        dispatcher,
        Arc::clone(&metrics),
    );
    info!(
        models = registry.profiles().len(),
        max_candidates = registry.max_candidates(),
        "routing pipeline ready"
    );
    Ok(Components {
        registry,
        service: Arc::new(service),
        metrics,
    })
}
