// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible HTTP gateway for Modelmux.
//!
//! Callers see one logical model. Each chat-completion request is handed to
//! the [`RoutingService`](modelmux_router::RoutingService), and its result is
//! written back as JSON or as an SSE stream.

pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use error::{ApiError, ErrorResponse};
pub use server::{GatewayState, HealthState, ServerConfig, build_router, start_server};
