// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate list selection.
//!
//! [`ModelRouter::route`] is a pure function of the registry, the request's
//! needs, and its classification.

use std::collections::HashSet;
use std::sync::Arc;

use modelmux_core::{ChatCompletionRequest, ClassificationResult, ModelProfile, TaskType};

use crate::registry::ModelRegistry;

/// Ordered candidates for one request: primary first, then fallbacks.
///
/// The list is already narrowed to what the request needs, so the first
/// candidate may differ from the registry's primary for the task. A request
/// counts as a fallback only when the dispatcher moved past a failed
/// candidate of this list.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub classification: ClassificationResult,
    pub candidates: Vec<Arc<ModelProfile>>,
}

impl RoutingDecision {
    pub fn task_type(&self) -> TaskType {
        self.classification.task_type
    }

    pub fn primary(&self) -> Option<&Arc<ModelProfile>> {
        self.candidates.first()
    }

    /// Human-readable names, in attempt order.
    pub fn names(&self) -> Vec<String> {
        self.candidates.iter().map(|p| p.name.clone()).collect()
    }
}

pub struct ModelRouter {
    registry: Arc<ModelRegistry>,
}

impl ModelRouter {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn route(
        &self,
        request: &ChatCompletionRequest,
        classification: &ClassificationResult,
    ) -> RoutingDecision {
        let primary = self.registry.primary_for(classification.task_type);

        let mut seen = HashSet::new();
        let mut candidates: Vec<Arc<ModelProfile>> = std::iter::once(Arc::clone(&primary))
            .chain(self.registry.pool_peers(&primary))
            .filter(|p| seen.insert(p.id.clone()))
            .collect();

        if request.stream {
            narrow(&mut candidates, |p| p.capabilities.streaming);
        }
        if request.wants_tools() {
            narrow(&mut candidates, |p| p.capabilities.tool_calls);
        }
        candidates.truncate(self.registry.max_candidates());

        RoutingDecision {
            classification: classification.clone(),
            candidates,
        }
    }
}

/// Keeps only matching profiles, unless none match.
fn narrow(candidates: &mut Vec<Arc<ModelProfile>>, keep: impl Fn(&ModelProfile) -> bool) {
    if candidates.iter().any(|p| keep(p.as_ref())) {
        candidates.retain(|p| keep(p.as_ref()));
    }
}
