// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible backend for the Modelmux router.
//!
//! Implements [`CompletionBackend`] over HTTP for any server that speaks the
//! `/chat/completions` protocol, streaming or not.

pub mod client;
pub mod sse;
pub mod types;

use async_trait::async_trait;
use modelmux_config::{ClassifierConfig, ModelConfig};
use modelmux_core::{
    BackendFailure, ChatCompletionRequest, ChunkStream, CompletionBackend, MuxError,
};
use secrecy::SecretString;
use serde_json::Value;
use tracing::info;

use crate::client::OpenAiClient;

/// A backend model reached over the OpenAI chat-completion protocol.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    model_id: String,
    client: OpenAiClient,
}

impl OpenAiBackend {
    pub fn new(
        model_id: impl Into<String>,
        base_url: &str,
        api_key: Option<SecretString>,
    ) -> Result<Self, MuxError> {
        Ok(Self {
            model_id: model_id.into(),
            client: OpenAiClient::new(base_url, api_key)?,
        })
    }

    /// Builds the backend for one `[[models]]` entry.
    pub fn from_model_config(model: &ModelConfig) -> Result<Self, MuxError> {
        let api_key = resolve_api_key(model.api_key.as_deref(), model.api_key_env.as_deref())?;
        let backend = Self::new(model.id.clone(), &model.base_url, api_key)?;
        info!(
            model = %model.id,
            endpoint = %backend.client.endpoint(),
            "backend initialized"
        );
        Ok(backend)
    }

    /// Builds the auxiliary classifier backend, if an endpoint is configured.
    pub fn from_classifier_config(config: &ClassifierConfig) -> Result<Option<Self>, MuxError> {
        let Some(base_url) = &config.base_url else {
            return Ok(None);
        };
        let api_key = resolve_api_key(config.api_key.as_deref(), config.api_key_env.as_deref())?;
        let backend = Self::new(config.model.clone(), base_url, api_key)?;
        info!(model = %config.model, "auxiliary classifier initialized");
        Ok(Some(backend))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: ChatCompletionRequest) -> Result<Value, BackendFailure> {
        self.client.complete(&request).await
    }

    async fn stream(&self, request: ChatCompletionRequest) -> Result<ChunkStream, BackendFailure> {
        self.client.stream(&request).await
    }
}

/// Resolves an API key from an inline value or a named environment variable.
///
/// No key at all is valid: local inference servers usually need none.
pub fn resolve_api_key(
    api_key: Option<&str>,
    api_key_env: Option<&str>,
) -> Result<Option<SecretString>, MuxError> {
    if let Some(key) = api_key {
        return Ok(Some(SecretString::from(key.to_string())));
    }
    match api_key_env {
        Some(var) => std::env::var(var)
            .map(|key| Some(SecretString::from(key)))
            .map_err(|_| {
                MuxError::Config(format!("environment variable `{var}` is not set"))
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn inline_key_wins() {
        let key = resolve_api_key(Some("sk-inline"), None).unwrap().unwrap();
        assert_eq!(key.expose_secret(), "sk-inline");
    }

    #[test]
    fn no_key_is_allowed() {
        assert!(resolve_api_key(None, None).unwrap().is_none());
    }

    #[test]
    fn missing_env_var_is_config_error() {
        let err = resolve_api_key(None, Some("MODELMUX_TEST_SURELY_UNSET_KEY_VAR")).unwrap_err();
        assert!(matches!(err, MuxError::Config(_)));
        assert!(err.to_string().contains("MODELMUX_TEST_SURELY_UNSET_KEY_VAR"));
    }

    #[test]
    fn env_var_key_is_read() {
        // PATH is always present in a test environment.
        let key = resolve_api_key(None, Some("PATH")).unwrap();
        assert!(key.is_some());
    }

    #[test]
    fn classifier_without_endpoint_is_disabled() {
        let backend = OpenAiBackend::from_classifier_config(&ClassifierConfig::default()).unwrap();
        assert!(backend.is_none());
    }

    #[test]
    fn backend_reports_model_id() {
        let backend = OpenAiBackend::new("qwen", "http://localhost:8000/v1", None).unwrap();
        assert_eq!(backend.model_id(), "qwen");
    }
}
