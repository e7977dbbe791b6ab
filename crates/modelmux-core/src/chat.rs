// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat-completion wire types.
//!
//! Only the fields the router inspects are typed. Everything else travels
//! through `extra` untouched so backends see what the caller sent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound (and outbound) chat-completion request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatCompletionRequest {
    /// A bare request with the given messages and no options set.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: None,
            messages,
            tools: None,
            tool_choice: None,
            temperature: None,
            max_tokens: None,
            stream: false,
            response_format: None,
            extra: Map::new(),
        }
    }

    /// True when any message of any role carries an image part.
    pub fn has_image_input(&self) -> bool {
        self.messages.iter().any(ChatMessage::has_image)
    }

    /// Text of the most recent `user` message.
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .and_then(ChatMessage::text)
    }

    pub fn wants_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_text("user", text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_text("system", text)
    }

    fn with_text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(MessageContent::Text(text.into())),
            extra: Map::new(),
        }
    }

    /// Plain text content, joining text parts with newlines.
    pub fn text(&self) -> Option<String> {
        match self.content.as_ref()? {
            MessageContent::Text(text) => Some(text.clone()),
            MessageContent::Parts(parts) => {
                let texts: Vec<&str> = parts.iter().filter_map(ContentPart::text).collect();
                if texts.is_empty() {
                    None
                } else {
                    Some(texts.join("\n"))
                }
            }
        }
    }

    pub fn has_image(&self) -> bool {
        match &self.content {
            Some(MessageContent::Parts(parts)) => parts.iter().any(ContentPart::is_image),
            _ => false,
        }
    }
}

/// Message content: either a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of a multi-part message.
///
/// Part types the router does not know are kept verbatim and forwarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Typed(TypedPart),
    Other(Value),
}

impl ContentPart {
    pub fn text(&self) -> Option<&str> {
        match self {
            ContentPart::Typed(TypedPart::Text { text }) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        match self {
            ContentPart::Typed(TypedPart::ImageUrl { .. }) => true,
            ContentPart::Typed(_) => false,
            ContentPart::Other(value) => matches!(
                value.get("type").and_then(Value::as_str),
                Some("image_url" | "input_image")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TypedPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    InputAudio { input_audio: Value },
    File { file: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One item of a backend's streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// An incremental `chat.completion.chunk` object.
    Delta(Value),
    /// The backend's end-of-stream sentinel.
    Done,
}

/// Overwrites the top-level `model` field so the serving backend stays hidden.
pub fn rewrite_model(body: &mut Value, public_name: &str) {
    if let Value::Object(map) = body {
        map.insert("model".to_string(), Value::String(public_name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_text_request_deserializes() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "What is 2+2?"}],
            "stream": false
        }))
        .unwrap();
        assert_eq!(req.messages.len(), 1);
        assert!(!req.stream);
        assert!(!req.has_image_input());
        assert_eq!(req.last_user_text().as_deref(), Some("What is 2+2?"));
    }

    #[test]
    fn image_parts_are_detected() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": [
                {"type": "text", "text": "what is in this picture?"},
                {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}}
            ]}]
        }))
        .unwrap();
        assert!(req.has_image_input());
        assert_eq!(
            req.last_user_text().as_deref(),
            Some("what is in this picture?")
        );
    }

    #[test]
    fn unknown_part_types_are_forwarded() {
        let body = json!({
            "messages": [
                {"role": "assistant", "content": [{"type": "refusal", "refusal": "no"}]},
                {"role": "user", "content": [
                    {"type": "text", "text": "and this one?"},
                    {"type": "input_image", "image_url": "https://example.com/dog.png"}
                ]}
            ]
        });
        let req: ChatCompletionRequest = serde_json::from_value(body.clone()).unwrap();
        assert!(req.has_image_input());
        assert_eq!(req.last_user_text().as_deref(), Some("and this one?"));
        assert_eq!(req.messages[0].text(), None);

        let out = serde_json::to_value(&req).unwrap();
        assert_eq!(out["messages"], body["messages"]);
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let body = json!({
            "model": "anything",
            "messages": [{"role": "tool", "content": "42", "tool_call_id": "call_1"}],
            "top_p": 0.9,
            "user": "abc"
        });
        let req: ChatCompletionRequest = serde_json::from_value(body).unwrap();
        let out = serde_json::to_value(&req).unwrap();
        assert_eq!(out["top_p"], json!(0.9));
        assert_eq!(out["user"], json!("abc"));
        assert_eq!(out["messages"][0]["tool_call_id"], json!("call_1"));
    }

    #[test]
    fn last_user_text_skips_assistant_turns() {
        let mut assistant = ChatMessage::user("ignored");
        assistant.role = "assistant".into();
        let req = ChatCompletionRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("first question"),
            assistant,
        ]);
        assert_eq!(req.last_user_text().as_deref(), Some("first question"));
    }

    #[test]
    fn rewrite_model_replaces_backend_identity() {
        let mut chunk = json!({"id": "c1", "model": "llama-3.1-8b-internal", "choices": []});
        rewrite_model(&mut chunk, "modelmux");
        assert_eq!(chunk["model"], json!("modelmux"));
    }

    #[test]
    fn wants_tools_ignores_empty_list() {
        let mut req = ChatCompletionRequest::new(vec![ChatMessage::user("hi")]);
        assert!(!req.wants_tools());
        req.tools = Some(vec![]);
        assert!(!req.wants_tools());
        req.tools = Some(vec![json!({"type": "function", "function": {"name": "f"}})]);
        assert!(req.wants_tools());
    }
}
