// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the pluggable seams of the router.

pub mod backend;

pub use backend::{ChunkStream, CompletionBackend};
