// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request routing for Modelmux.
//!
//! A request flows classifier → router → dispatcher → (relay, for streams).
//! [`RoutingService`] ties the stages together for the HTTP layer.

pub mod classifier;
pub mod dispatcher;
pub mod phase;
pub mod registry;
pub mod relay;
pub mod router;
pub mod service;

pub use classifier::{AuxiliaryClassifier, TaskClassifier};
pub use dispatcher::{AttemptOutcome, Dispatcher};
pub use phase::RequestPhase;
pub use registry::{ModelRegistry, RegistryError};
pub use relay::{RelayEvent, RelaySettings, RelayStream};
pub use router::{ModelRouter, RoutingDecision};
pub use service::RoutingService;
