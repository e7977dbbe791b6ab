// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `/etc/modelmux/modelmux.toml`
//! 3. `~/.config/modelmux/modelmux.toml`
//! 4. `./modelmux.toml`
//! 5. `MODELMUX_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ModelmuxConfig;

const SYSTEM_CONFIG: &str = "/etc/modelmux/modelmux.toml";
const LOCAL_CONFIG: &str = "modelmux.toml";

/// Candidate config file locations, lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("modelmux/modelmux.toml"));
    }
    paths.push(PathBuf::from(LOCAL_CONFIG));
    paths
}

/// Load from the standard hierarchy with env overrides.
pub fn load_config() -> Result<ModelmuxConfig, figment::Error> {
    build_figment().extract()
}

/// Load from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<ModelmuxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ModelmuxConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load from an explicit file with env overrides. Skips the hierarchy.
pub fn load_config_from_path(path: &Path) -> Result<ModelmuxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ModelmuxConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The hierarchy Figment before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(ModelmuxConfig::default()));
    for path in config_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Maps `MODELMUX_<SECTION>_<KEY>` onto `<section>.<key>`.
///
/// Uses `Env::map` rather than `Env::split("_")` because keys contain
/// underscores: `MODELMUX_SERVER_PUBLIC_MODEL_NAME` must become
/// `server.public_model_name`. `[[models]]` cannot be set from the environment.
pub fn env_provider() -> Env {
    Env::prefixed("MODELMUX_").map(|key| {
        let mapped = map_env_key(key.as_str());
        mapped.into()
    })
}

fn map_env_key(key: &str) -> String {
    for section in ["server", "routing", "classifier", "relay", "metrics"] {
        if let Some(rest) = key.strip_prefix(section) {
            if let Some(field) = rest.strip_prefix('_') {
                return format!("{section}.{field}");
            }
        }
    }
    key.to_string()
}
