// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Modelmux router.
//!
//! Holds the types every other crate agrees on: the task taxonomy and model
//! profiles, the OpenAI-compatible wire shapes, the error taxonomy, and the
//! [`CompletionBackend`] trait that backend clients implement.

pub mod chat;
pub mod error;
pub mod traits;
pub mod types;

pub use chat::{
    ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, MessageContent, StreamChunk,
    TypedPart, rewrite_model,
};
pub use error::{BackendFailure, ErrorClass, FailureKind, MuxError};
pub use traits::{ChunkStream, CompletionBackend};
pub use types::{
    ClassificationResult, ClassificationSource, ModelCapabilities, ModelProfile, TaskType,
};
