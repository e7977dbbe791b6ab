// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immutable catalog of backend models and the primary/fallback lookups over it.
//!
//! Profiles are split into two pools by image support. A vision request is only
//! ever served from the vision pool and every other request only from the text
//! pool, so fallbacks never cross between them.

use std::collections::HashSet;
use std::sync::Arc;

use modelmux_core::{ModelProfile, MuxError, TaskType};
use thiserror::Error;

/// Why a set of profiles cannot be routed over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no models configured")]
    NoProfiles,

    #[error("duplicate model id `{0}`")]
    DuplicateId(String),

    #[error("no text model lists `general_text`; one is required as the default route")]
    NoGeneralDefault,

    #[error("no model supports image input; vision requests would have no route")]
    NoVisionPool,

    #[error("model `{0}` lists `vision` but does not support image input")]
    VisionWithoutImages(String),

    #[error("max_candidates must be at least 1")]
    ZeroCandidates,
}

impl From<RegistryError> for MuxError {
    fn from(err: RegistryError) -> Self {
        MuxError::Config(err.to_string())
    }
}

/// Read-only after construction; shared by `Arc` without locking.
#[derive(Debug)]
pub struct ModelRegistry {
    /// Sorted by (priority, declaration order).
    profiles: Vec<Arc<ModelProfile>>,
    general_default: Arc<ModelProfile>,
    vision_default: Arc<ModelProfile>,
    max_candidates: usize,
}

impl ModelRegistry {
    /// Validates the routing invariants and builds the registry.
    pub fn new(profiles: Vec<ModelProfile>, max_candidates: usize) -> Result<Self, RegistryError> {
        if max_candidates == 0 {
            return Err(RegistryError::ZeroCandidates);
        }
        if profiles.is_empty() {
            return Err(RegistryError::NoProfiles);
        }

        let mut seen = HashSet::new();
        for profile in &profiles {
            if !seen.insert(profile.id.as_str()) {
                return Err(RegistryError::DuplicateId(profile.id.clone()));
            }
            if profile.has_affinity(TaskType::Vision) && !profile.is_vision_capable() {
                return Err(RegistryError::VisionWithoutImages(profile.id.clone()));
            }
        }

        let mut profiles: Vec<Arc<ModelProfile>> = profiles.into_iter().map(Arc::new).collect();
        // Stable: equal priorities keep declaration order.
        profiles.sort_by_key(|p| p.priority);

        let general_default = profiles
            .iter()
            .find(|p| !p.is_vision_capable() && p.has_affinity(TaskType::GeneralText))
            .cloned()
            .ok_or(RegistryError::NoGeneralDefault)?;

        let vision_default = profiles
            .iter()
            .find(|p| p.is_vision_capable())
            .cloned()
            .ok_or(RegistryError::NoVisionPool)?;

        Ok(Self {
            profiles,
            general_default,
            vision_default,
            max_candidates,
        })
    }

    /// The first model to try for `task`. Never fails on a constructed registry.
    pub fn primary_for(&self, task: TaskType) -> Arc<ModelProfile> {
        let vision = task == TaskType::Vision;
        self.profiles
            .iter()
            .find(|p| p.is_vision_capable() == vision && p.has_affinity(task))
            .cloned()
            .unwrap_or_else(|| {
                if vision {
                    Arc::clone(&self.vision_default)
                } else {
                    Arc::clone(&self.general_default)
                }
            })
    }

    /// Other models of `primary`'s pool, priority ascending, at most
    /// `max_candidates - 1`.
    pub fn fallbacks_for(&self, primary: &ModelProfile) -> Vec<Arc<ModelProfile>> {
        let mut peers = self.pool_peers(primary);
        peers.truncate(self.max_candidates - 1);
        peers
    }

    /// Every other model of `primary`'s pool, priority ascending, uncapped.
    pub fn pool_peers(&self, primary: &ModelProfile) -> Vec<Arc<ModelProfile>> {
        self.pool_of(primary)
            .filter(|p| p.id != primary.id)
            .cloned()
            .collect()
    }

    fn pool_of<'a>(
        &'a self,
        anchor: &'a ModelProfile,
    ) -> impl Iterator<Item = &'a Arc<ModelProfile>> + 'a {
        self.profiles
            .iter()
            .filter(move |p| p.is_vision_capable() == anchor.is_vision_capable())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ModelProfile>> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// All profiles in routing order.
    pub fn profiles(&self) -> &[Arc<ModelProfile>] {
        &self.profiles
    }

    pub fn general_default(&self) -> &Arc<ModelProfile> {
        &self.general_default
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }
}
