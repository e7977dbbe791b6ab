// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Modelmux.
//!
//! [`MockBackend`] stands in for an upstream model server so routing,
//! fallback, and relay behavior can be tested without the network.

pub mod mock_backend;

pub use mock_backend::{MockBackend, MockReply, MockStream, chunk_json, completion_json};
