// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error body shapes returned by OpenAI-compatible servers.

use serde::Deserialize;

/// Longest upstream error message carried into logs and caller errors.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 512;

/// `{"error": {...}}` envelope used for non-2xx responses and in-band stream errors.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl ApiError {
    /// `type: message`, or just the message when the server sent no type.
    pub fn describe(&self) -> String {
        match &self.type_ {
            Some(t) if !t.is_empty() => format!("{t}: {}", self.message),
            _ => self.message.clone(),
        }
    }
}

/// Best-effort human message from a response body.
pub fn error_message(body: &str) -> String {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => parsed.error.describe(),
        Err(_) => body.trim().to_string(),
    };
    truncate(&message, MAX_ERROR_MESSAGE_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
