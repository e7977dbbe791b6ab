// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing domain types shared by the registry, classifier, and dispatcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Category of work a request asks for. Used as the registry lookup key.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SimpleText,
    GeneralText,
    MathReasoning,
    Programming,
    Creative,
    Vision,
    Unknown,
}

/// Capability flags of a backend model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelCapabilities {
    pub streaming: bool,
    pub tool_calls: bool,
    pub image_input: bool,
}

/// Static descriptor of one backend model.
///
/// Built once at startup from configuration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    /// Internal backend identifier, sent as the `model` field upstream.
    pub id: String,
    /// Human-readable name, safe to show to callers.
    pub name: String,
    /// Task types this model is preferred for.
    pub affinities: Vec<TaskType>,
    /// Lower is tried first.
    pub priority: u32,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
    /// Per-call timeout.
    pub timeout: Duration,
    pub capabilities: ModelCapabilities,
}

impl ModelProfile {
    pub fn has_affinity(&self, task: TaskType) -> bool {
        self.affinities.contains(&task)
    }

    /// Vision-capable and text-only profiles form separate fallback pools.
    pub fn is_vision_capable(&self) -> bool {
        self.capabilities.image_input
    }
}

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    /// Decided locally without any network call.
    Heuristic,
    /// Decided by the auxiliary classifier model.
    AuxiliaryModel,
    /// The auxiliary call failed; degraded to the general default.
    Fallback,
}

/// Outcome of classifying one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub task_type: TaskType,
    /// Confidence in `[0, 1]`. Recorded for observability; never gates routing.
    pub confidence: f32,
    /// Wall-clock time spent classifying.
    pub elapsed: Duration,
    pub source: ClassificationSource,
    /// Diagnostic cause when `source` is [`ClassificationSource::Fallback`].
    pub failure: Option<String>,
}

impl ClassificationResult {
    pub fn heuristic(task_type: TaskType, confidence: f32, elapsed: Duration) -> Self {
        Self {
            task_type,
            confidence,
            elapsed,
            source: ClassificationSource::Heuristic,
            failure: None,
        }
    }

    pub fn from_model(task_type: TaskType, confidence: f32, elapsed: Duration) -> Self {
        Self {
            task_type,
            confidence: confidence.clamp(0.0, 1.0),
            elapsed,
            source: ClassificationSource::AuxiliaryModel,
            failure: None,
        }
    }

    /// The degraded result used whenever the auxiliary call fails.
    pub fn fallback(cause: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            task_type: TaskType::GeneralText,
            confidence: 0.5,
            elapsed,
            source: ClassificationSource::Fallback,
            failure: Some(cause.into()),
        }
    }

    pub fn from_heuristic(&self) -> bool {
        self.source == ClassificationSource::Heuristic
    }
}
