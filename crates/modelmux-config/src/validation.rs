// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every problem instead of stopping at the first one, so a broken
//! config file can be fixed in one pass.

use std::collections::HashSet;

use modelmux_core::TaskType;

use crate::diagnostic::ConfigError;
use crate::model::{ClassifierConfig, ModelConfig, ModelmuxConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ModelmuxConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    validate_server(config, &mut errors);
    validate_classifier(&config.classifier, &mut errors);

    if config.routing.max_candidates == 0 {
        errors.push(ConfigError::validation(
            "routing.max_candidates must be at least 1",
        ));
    }
    if config.relay.buffer_size == 0 {
        errors.push(ConfigError::validation("relay.buffer_size must be at least 1"));
    }
    if config.relay.cancel_grace_ms == 0 {
        errors.push(ConfigError::validation(
            "relay.cancel_grace_ms must be greater than 0",
        ));
    }

    validate_models(&config.models, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_server(config: &ModelmuxConfig, errors: &mut Vec<ConfigError>) {
    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else {
        let is_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_ip && !is_hostname {
            errors.push(ConfigError::validation(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.server.public_model_name.trim().is_empty() {
        errors.push(ConfigError::validation(
            "server.public_model_name must not be empty",
        ));
    }

    if !LOG_LEVELS.contains(&config.server.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "server.log_level `{}` must be one of: {}",
            config.server.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.server.max_body_bytes == 0 {
        errors.push(ConfigError::validation(
            "server.max_body_bytes must be greater than 0",
        ));
    }
}

fn validate_classifier(classifier: &ClassifierConfig, errors: &mut Vec<ConfigError>) {
    if let Some(url) = &classifier.base_url {
        check_url("classifier.base_url", url, errors);
    }
    check_key_source(
        "classifier",
        classifier.api_key.as_deref(),
        classifier.api_key_env.as_deref(),
        errors,
    );
    if classifier.model.trim().is_empty() {
        errors.push(ConfigError::validation("classifier.model must not be empty"));
    }
    if classifier.timeout_ms == 0 {
        errors.push(ConfigError::validation(
            "classifier.timeout_ms must be greater than 0",
        ));
    }
    if classifier.short_text_threshold == 0 {
        errors.push(ConfigError::validation(
            "classifier.short_text_threshold must be greater than 0",
        ));
    }
    if classifier.max_prompt_chars == 0 {
        errors.push(ConfigError::validation(
            "classifier.max_prompt_chars must be greater than 0",
        ));
    }
}

fn validate_models(models: &[ModelConfig], errors: &mut Vec<ConfigError>) {
    if models.is_empty() {
        errors.push(ConfigError::validation(
            "at least one [[models]] entry is required",
        ));
        return;
    }

    let mut seen = HashSet::new();
    for (i, model) in models.iter().enumerate() {
        let label = format!("models[{i}]");
        if model.id.trim().is_empty() {
            errors.push(ConfigError::validation(format!("{label}.id must not be empty")));
        } else if !seen.insert(model.id.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate model id `{}` in [[models]] array",
                model.id
            )));
        }
        if model.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            errors.push(ConfigError::validation(format!(
                "{label}.name must not be empty when set"
            )));
        }
        check_url(&format!("{label}.base_url"), &model.base_url, errors);
        check_key_source(
            &label,
            model.api_key.as_deref(),
            model.api_key_env.as_deref(),
            errors,
        );
        if model.timeout_ms == 0 {
            errors.push(ConfigError::validation(format!(
                "{label}.timeout_ms must be greater than 0"
            )));
        }
        if model.max_output_tokens == 0 {
            errors.push(ConfigError::validation(format!(
                "{label}.max_output_tokens must be greater than 0"
            )));
        }
        if model.task_types.contains(&TaskType::Vision) && !model.supports_images {
            errors.push(ConfigError::validation(format!(
                "{label} (`{}`) lists task type `vision` but supports_images is false",
                model.id
            )));
        }
    }
}

fn check_url(key: &str, url: &str, errors: &mut Vec<ConfigError>) {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "{key} `{url}` must start with http:// or https://"
        )));
    }
}

fn check_key_source(
    label: &str,
    api_key: Option<&str>,
    api_key_env: Option<&str>,
    errors: &mut Vec<ConfigError>,
) {
    if api_key.is_some() && api_key_env.is_some() {
        errors.push(ConfigError::validation(format!(
            "{label}: set either api_key or api_key_env, not both"
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;

    fn model(id: &str) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            name: None,
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: None,
            api_key_env: None,
            task_types: vec![TaskType::GeneralText],
            priority: 100,
            max_output_tokens: 1024,
            timeout_ms: 1000,
            supports_streaming: true,
            supports_tools: false,
            supports_images: false,
        }
    }

    #[test]
    fn valid_config_passes() {
        let config = ModelmuxConfig {
            models: vec![model("a")],
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut bad = model("a");
        bad.base_url = "localhost".to_string();
        bad.task_types.push(TaskType::Vision);
        let mut config = ModelmuxConfig {
            models: vec![bad, model("a")],
            ..Default::default()
        };
        config.routing.max_candidates = 0;
        config.server.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        let text: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(errors.len(), 5, "{text:?}");
        assert!(text.iter().any(|t| t.contains("duplicate model id `a`")));
        assert!(text.iter().any(|t| t.contains("supports_images is false")));
        assert!(text.iter().any(|t| t.contains("max_candidates")));
    }

    #[test]
    fn empty_model_list_is_rejected() {
        let errors = validate_config(&ModelmuxConfig::default()).unwrap_err();
        assert!(errors[0].to_string().contains("[[models]]"));
    }

    #[test]
    fn both_key_sources_is_rejected() {
        let mut m = model("a");
        m.api_key = Some("sk-test".into());
        m.api_key_env = Some("OPENAI_API_KEY".into());
        let config = ModelmuxConfig {
            models: vec![m],
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("not both"));
    }
}
