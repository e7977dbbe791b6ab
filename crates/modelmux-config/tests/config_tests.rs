// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Modelmux configuration system.

use std::io::Write;
use std::time::Duration;

use modelmux_config::diagnostic::ConfigError;
use modelmux_config::model::ModelmuxConfig;
use modelmux_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};
use modelmux_core::TaskType;

const FULL: &str = r#"
[server]
host = "0.0.0.0"
port = 9090
public_model_name = "auto"
log_level = "debug"

[routing]
max_candidates = 2

[classifier]
model = "tiny-classifier"
base_url = "http://localhost:9000/v1"
timeout_ms = 1500
short_text_threshold = 120

[relay]
buffer_size = 8
cancel_grace_ms = 250

[metrics]
prometheus = false

[[models]]
id = "llama-3.1-8b"
name = "Fast"
base_url = "http://localhost:8000/v1"
task_types = ["simple_text", "general_text"]
priority = 1
max_output_tokens = 2048
timeout_ms = 20000

[[models]]
id = "qwen2.5-coder-32b"
name = "Coder"
base_url = "http://localhost:8001/v1"
api_key_env = "CODER_KEY"
task_types = ["programming", "math_reasoning"]
supports_tools = true

[[models]]
id = "llava-1.6"
name = "Eyes"
base_url = "http://localhost:8002/v1"
task_types = ["vision"]
supports_images = true
"#;

#[test]
fn full_config_deserializes() {
    let config = load_and_validate_str(FULL).expect("valid config");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.server.public_model_name, "auto");
    assert_eq!(config.routing.max_candidates, 2);
    assert_eq!(config.classifier.base_url.as_deref(), Some("http://localhost:9000/v1"));
    assert_eq!(config.classifier.short_text_threshold, 120);
    assert_eq!(config.relay.buffer_size, 8);
    assert!(!config.metrics.prometheus);
    assert_eq!(config.models.len(), 3);

    let coder = config.models[1].profile();
    assert_eq!(coder.name, "Coder");
    assert!(coder.capabilities.tool_calls);
    assert!(coder.has_affinity(TaskType::Programming));

    let eyes = config.models[2].profile();
    assert!(eyes.is_vision_capable());
    assert_eq!(config.models[0].profile().timeout, Duration::from_secs(20));
}

#[test]
fn missing_sections_use_defaults() {
    let toml = r#"
[[models]]
id = "only"
base_url = "http://localhost:8000/v1"
"#;
    let config = load_and_validate_str(toml).expect("defaults fill the rest");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.public_model_name, "modelmux");
    assert_eq!(config.server.max_body_bytes, 20 * 1024 * 1024);
    assert_eq!(config.routing.max_candidates, 3);
    assert!(config.classifier.base_url.is_none());
    assert_eq!(config.classifier.short_text_threshold, 200);
    assert_eq!(config.relay.buffer_size, 16);
    assert!(config.metrics.prometheus);
}

#[test]
fn unknown_field_in_section_is_rejected() {
    let toml = r#"
[routing]
max_candidate = 2
"#;
    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("max_candidate"),
        "got: {err_str}"
    );
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let toml = r#"
[telemetry]
enabled = true
"#;
    assert!(load_config_from_str(toml).is_err());
}

#[test]
fn diagnostic_suggests_correction() {
    let toml = r#"
[routing]
max_candidate = 2
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    let found = errors.iter().any(|e| match e {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => key == "max_candidate" && suggestion.as_deref() == Some("max_candidates"),
        _ => false,
    });
    assert!(found, "expected suggestion, got: {errors:?}");
}

#[test]
fn unknown_task_type_is_reported() {
    let toml = r#"
[[models]]
id = "x"
base_url = "http://localhost:8000/v1"
task_types = ["poetry"]
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert!(!errors.is_empty());
}

#[test]
fn invalid_type_is_reported() {
    let toml = r#"
[server]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("port"))),
        "got: {errors:?}"
    );
}

#[test]
fn dot_path_override_reaches_nested_key() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    // Same shape the MODELMUX_SERVER_PUBLIC_MODEL_NAME mapping produces.
    let config: ModelmuxConfig = Figment::new()
        .merge(Serialized::defaults(ModelmuxConfig::default()))
        .merge(Toml::string(FULL))
        .merge(("server.public_model_name", "from-env"))
        .extract()
        .expect("should merge override");
    assert_eq!(config.server.public_model_name, "from-env");
    assert_eq!(config.models.len(), 3);
}

#[test]
fn load_from_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL.as_bytes()).unwrap();
    let config = load_and_validate_path(file.path()).expect("valid file");
    assert_eq!(config.models[2].id, "llava-1.6");
}

#[test]
fn missing_explicit_path_is_an_error() {
    let errors = load_and_validate_path(std::path::Path::new("/nonexistent/modelmux.toml"))
        .expect_err("missing file");
    assert!(errors[0].to_string().contains("cannot read config file"));
}

#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::UnknownKey {
        key: "prot".to_string(),
        suggestion: Some("port".to_string()),
        valid_keys: "host, port".to_string(),
        span: None,
        src: None,
    };
    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("prot"));

    use miette::Diagnostic;
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("did you mean `port`"), "got: {help}");
}
