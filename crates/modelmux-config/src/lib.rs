// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Modelmux router.
//!
//! TOML parsing with strict `deny_unknown_fields`, XDG file lookup,
//! `MODELMUX_*` environment overrides, and miette diagnostics with typo
//! suggestions.
//!
//! ```no_run
//! use modelmux_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("serving as {}", config.server.public_model_name);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    ClassifierConfig, MetricsConfig, ModelConfig, ModelmuxConfig, RelayConfig, RoutingConfig,
    ServerConfig,
};

/// Load from the standard hierarchy and validate.
pub fn load_and_validate() -> Result<ModelmuxConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(
            err,
            &collect_toml_sources(),
        )),
    }
}

/// Load from an explicit file (plus env overrides) and validate.
pub fn load_and_validate_path(path: &Path) -> Result<ModelmuxConfig, Vec<ConfigError>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        vec![ConfigError::Other(format!(
            "cannot read config file {}: {e}",
            path.display()
        ))]
    })?;
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![(path.display().to_string(), content)];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

/// Load from a TOML string and validate. No files, no environment.
pub fn load_and_validate_str(toml_content: &str) -> Result<ModelmuxConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => {
            let sources = vec![("<inline>".to_string(), toml_content.to_string())];
            Err(diagnostic::figment_to_config_errors(err, &sources))
        }
    }
}

fn collect_toml_sources() -> Vec<(String, String)> {
    loader::config_paths()
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            let name = if path.is_relative() {
                std::env::current_dir()
                    .map(|d| d.join(&path))
                    .unwrap_or_else(|_| path.clone())
            } else {
                path
            };
            Some((name.display().to_string(), content))
        })
        .collect()
}
