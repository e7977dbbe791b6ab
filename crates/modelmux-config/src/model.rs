// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Modelmux router.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key fails
//! startup instead of silently falling back to a default.

use std::time::Duration;

use modelmux_core::{ModelCapabilities, ModelProfile, TaskType};
use serde::{Deserialize, Serialize};

/// Top-level Modelmux configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelmuxConfig {
    /// HTTP listener and public identity.
    #[serde(default)]
    pub server: ServerConfig,

    /// Candidate list shaping.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Task classifier thresholds and auxiliary model endpoint.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Streaming relay buffering and cancellation.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Metrics exposition.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Backend models, one `[[models]]` table each.
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// The single logical model name advertised to callers.
    #[serde(default = "default_public_model_name")]
    pub public_model_name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Largest accepted request body. Images arrive inline as data URLs.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_model_name: default_public_model_name(),
            log_level: default_log_level(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_model_name() -> String {
    "modelmux".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_bytes() -> usize {
    20 * 1024 * 1024
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Primary plus fallbacks, at most this many per request.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
        }
    }
}

fn default_max_candidates() -> usize {
    3
}

/// Task classifier configuration.
///
/// Without a `base_url` the auxiliary model step is disabled and every request
/// that passes the heuristics is routed as general text.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Model identifier sent to the auxiliary endpoint.
    #[serde(default = "default_classifier_model")]
    pub model: String,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Name of an environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,

    /// Messages shorter than this many characters may be classified simple.
    #[serde(default = "default_short_text_threshold")]
    pub short_text_threshold: usize,

    /// Any of these (case-insensitive) disqualifies the simple-text shortcut.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Prompt text sent to the auxiliary model is truncated to this length.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: default_classifier_model(),
            base_url: None,
            api_key: None,
            api_key_env: None,
            timeout_ms: default_classifier_timeout_ms(),
            short_text_threshold: default_short_text_threshold(),
            keywords: default_keywords(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_classifier_timeout_ms() -> u64 {
    3_000
}

fn default_short_text_threshold() -> usize {
    200
}

fn default_max_prompt_chars() -> usize {
    2_000
}

fn default_keywords() -> Vec<String> {
    [
        // code
        "code", "function", "debug", "compile", "stack trace", "error:", "python",
        "javascript", "typescript", "rust", "java", "sql", "regex", "bash", "script",
        "algorithm", "refactor", "```",
        // math
        "equation", "integral", "derivative", "prove", "theorem", "calculate", "solve",
        "probability", "matrix",
        // creative
        "poem", "story", "lyrics", "essay", "haiku", "fiction", "write a", "imagine",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

/// Streaming relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Chunks buffered between backend read and caller write.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// How long a cancelled producer may take before it is aborted.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            cancel_grace_ms: default_cancel_grace_ms(),
        }
    }
}

fn default_buffer_size() -> usize {
    16
}

fn default_cancel_grace_ms() -> u64 {
    500
}

/// Metrics exposition configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics/prometheus`.
    #[serde(default = "default_prometheus")]
    pub prometheus: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            prometheus: default_prometheus(),
        }
    }
}

fn default_prometheus() -> bool {
    true
}

/// One backend model.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Internal identifier, sent upstream as `model`.
    pub id: String,

    /// Human-readable name. Defaults to `id`.
    #[serde(default)]
    pub name: Option<String>,

    /// Base URL of the OpenAI-compatible API, e.g. `https://api.example.com/v1`.
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Name of an environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Task types this model is preferred for.
    #[serde(default)]
    pub task_types: Vec<TaskType>,

    /// Lower is tried first.
    #[serde(default = "default_priority")]
    pub priority: u32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_supports_streaming")]
    pub supports_streaming: bool,

    #[serde(default)]
    pub supports_tools: bool,

    #[serde(default)]
    pub supports_images: bool,
}

impl ModelConfig {
    pub fn profile(&self) -> ModelProfile {
        ModelProfile {
            id: self.id.clone(),
            name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            affinities: self.task_types.clone(),
            priority: self.priority,
            max_output_tokens: self.max_output_tokens,
            timeout: Duration::from_millis(self.timeout_ms),
            capabilities: ModelCapabilities {
                streaming: self.supports_streaming,
                tool_calls: self.supports_tools,
                image_input: self.supports_images,
            },
        }
    }
}

fn default_priority() -> u32 {
    100
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_model_timeout_ms() -> u64 {
    60_000
}

fn default_supports_streaming() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_profile_defaults_name_to_id() {
        let toml_str = r#"
id = "llama-3.1-8b"
base_url = "http://localhost:8000/v1"
task_types = ["simple_text", "general_text"]
"#;
        let model: ModelConfig = toml::from_str(toml_str).unwrap();
        let profile = model.profile();
        assert_eq!(profile.name, "llama-3.1-8b");
        assert_eq!(profile.priority, 100);
        assert_eq!(profile.timeout, Duration::from_secs(60));
        assert!(profile.capabilities.streaming);
        assert!(!profile.capabilities.image_input);
        assert_eq!(
            profile.affinities,
            vec![TaskType::SimpleText, TaskType::GeneralText]
        );
    }

    #[test]
    fn unknown_task_type_is_rejected() {
        let toml_str = r#"
id = "x"
base_url = "http://localhost"
task_types = ["poetry"]
"#;
        assert!(toml::from_str::<ModelConfig>(toml_str).is_err());
    }

    #[test]
    fn model_config_denies_unknown_fields() {
        let toml_str = r#"
id = "x"
base_url = "http://localhost"
prioriti = 3
"#;
        assert!(toml::from_str::<ModelConfig>(toml_str).is_err());
    }

    #[test]
    fn classifier_keywords_cover_code_math_and_creative() {
        let config = ClassifierConfig::default();
        for kw in ["code", "equation", "poem"] {
            assert!(config.keywords.iter().any(|k| k == kw), "missing {kw}");
        }
        assert_eq!(config.timeout(), Duration::from_secs(3));
    }
}
