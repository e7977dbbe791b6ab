// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task classification: cheap heuristics first, then one bounded auxiliary call.
//!
//! [`TaskClassifier::classify`] never fails. Image parts short-circuit to
//! vision, short keyword-free text short-circuits to simple text, and anything
//! else asks a small model for a label. If that call times out, errors, or
//! answers nonsense, the request is routed as general text.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use modelmux_config::ClassifierConfig;
use modelmux_core::{
    ChatCompletionRequest, ChatMessage, ClassificationResult, CompletionBackend, ErrorClass,
    TaskType,
};
use serde_json::{Value, json};
use strum::IntoEnumIterator;
use tracing::{debug, warn};

const SIMPLE_TEXT_CONFIDENCE: f32 = 0.8;
const CLASSIFIER_MAX_TOKENS: u32 = 64;
const NOT_CONFIGURED: &str = "auxiliary classifier not configured";

const SYSTEM_PROMPT: &str = "You label chat requests for a model router. \
Read the user's message and pick the single task type that best describes the work it asks for: \
simple_text (greetings, short factual questions), general_text (open conversation, explanation, summaries), \
math_reasoning (calculation, proofs, quantitative reasoning), programming (writing, reading, or debugging code), \
creative (stories, poems, fiction, brainstorming), unknown (none of these). \
Reply with JSON only: {\"task_type\": <label>, \"confidence\": <number between 0 and 1>}.";

/// The auxiliary model call: an ordinary completion backend plus its deadline.
pub struct AuxiliaryClassifier {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
    max_prompt_chars: usize,
}

impl AuxiliaryClassifier {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration, max_prompt_chars: usize) -> Self {
        Self {
            backend,
            timeout,
            max_prompt_chars,
        }
    }

    /// One call, capped by `timeout`. Any failure comes back as its cause.
    async fn label(&self, text: &str) -> Result<(TaskType, f32), String> {
        let request = self.build_request(text);
        let response = tokio::time::timeout(self.timeout, self.backend.complete(request))
            .await
            .map_err(|_| format!("timed out after {}ms", self.timeout.as_millis()))?
            .map_err(|failure| failure.to_string())?;
        parse_label(&response)
    }

    fn build_request(&self, text: &str) -> ChatCompletionRequest {
        let prompt = truncate_chars(text, self.max_prompt_chars);
        let mut request = ChatCompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ]);
        request.model = Some(self.backend.model_id().to_string());
        request.temperature = Some(0.0);
        request.max_tokens = Some(CLASSIFIER_MAX_TOKENS);
        request.stream = false;
        request.response_format = Some(response_format());
        request
    }
}

/// Structured-output contract for the auxiliary model. Vision is decided by
/// image parts alone, so it is not offered as a label.
pub fn response_format() -> Value {
    let labels: Vec<String> = TaskType::iter()
        .filter(|t| *t != TaskType::Vision)
        .map(|t| t.to_string())
        .collect();
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "task_classification",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "task_type": {"type": "string", "enum": labels},
                    "confidence": {"type": "number", "minimum": 0, "maximum": 1}
                },
                "required": ["task_type", "confidence"],
                "additionalProperties": false
            }
        }
    })
}

/// Extracts `(task_type, confidence)` from a `chat.completion` body.
pub fn parse_label(response: &Value) -> Result<(TaskType, f32), String> {
    let content = response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or("response has no message content")?;

    let body = strip_code_fence(content);
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| format!("label is not JSON: {e}"))?;

    let label = parsed
        .get("task_type")
        .and_then(Value::as_str)
        .ok_or("label has no task_type")?;
    let task_type = TaskType::from_str(label.trim())
        .map_err(|_| format!("unknown task type `{label}`"))?;
    if task_type == TaskType::Vision {
        return Err("vision is not a valid text label".to_string());
    }

    let confidence = parsed
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or("label has no numeric confidence")?;
    if !confidence.is_finite() {
        return Err("confidence is not finite".to_string());
    }

    Ok((task_type, confidence.clamp(0.0, 1.0) as f32))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Two-stage request classifier.
pub struct TaskClassifier {
    short_text_threshold: usize,
    /// Lowercased.
    keywords: Vec<String>,
    auxiliary: Option<AuxiliaryClassifier>,
}

impl TaskClassifier {
    pub fn new(config: &ClassifierConfig, backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        Self {
            short_text_threshold: config.short_text_threshold,
            keywords: config.keywords.iter().map(|k| k.to_lowercase()).collect(),
            auxiliary: backend
                .map(|b| AuxiliaryClassifier::new(b, config.timeout(), config.max_prompt_chars)),
        }
    }

    pub fn has_auxiliary(&self) -> bool {
        self.auxiliary.is_some()
    }

    /// The network-free stages alone. `None` means the auxiliary model decides.
    pub fn heuristic(&self, request: &ChatCompletionRequest) -> Option<(TaskType, f32)> {
        if request.has_image_input() {
            return Some((TaskType::Vision, 1.0));
        }

        let text = request.last_user_text().unwrap_or_default();
        if text.chars().count() < self.short_text_threshold && !self.mentions_keyword(&text) {
            return Some((TaskType::SimpleText, SIMPLE_TEXT_CONFIDENCE));
        }
        None
    }

    fn mentions_keyword(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Always returns, within the auxiliary timeout at worst.
    pub async fn classify(&self, request: &ChatCompletionRequest) -> ClassificationResult {
        let start = Instant::now();

        if let Some((task_type, confidence)) = self.heuristic(request) {
            debug!(task_type = %task_type, "classified by heuristics");
            return ClassificationResult::heuristic(task_type, confidence, start.elapsed());
        }

        let Some(auxiliary) = &self.auxiliary else {
            return ClassificationResult::fallback(NOT_CONFIGURED, start.elapsed());
        };

        let text = request.last_user_text().unwrap_or_default();
        match auxiliary.label(&text).await {
            Ok((task_type, confidence)) => {
                debug!(task_type = %task_type, confidence, "classified by auxiliary model");
                ClassificationResult::from_model(task_type, confidence, start.elapsed())
            }
            Err(cause) => {
                warn!(
                    class = %ErrorClass::ClassificationFailure,
                    cause = %cause,
                    "auxiliary classification failed, routing as general text"
                );
                ClassificationResult::fallback(cause, start.elapsed())
            }
        }
    }
}
