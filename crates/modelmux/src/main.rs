// SPDX-FileCopyrightText: 2026 Modelmux Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modelmux - one OpenAI-compatible endpoint in front of many models.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod app;
mod check;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use modelmux_config::{ConfigError, ModelmuxConfig};

/// Modelmux - one OpenAI-compatible endpoint in front of many models.
#[derive(Parser, Debug)]
#[command(name = "modelmux", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file only, instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server (the default).
    Serve,
    /// Validate configuration and print the routing table.
    Check,
    /// Classify a prompt and print where it would be routed.
    Route {
        /// The user message to classify.
        prompt: String,
    },
}

fn load_config(path: Option<&std::path::Path>) -> Result<ModelmuxConfig, Vec<ConfigError>> {
    match path {
        Some(path) => modelmux_config::load_and_validate_path(path),
        None => modelmux_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            modelmux_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    serve::init_tracing(&config.server.log_level);

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Check => check::run_check(&config),
        Commands::Route { prompt } => check::run_route(&config, &prompt).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_parses_route_with_global_config() {
        let cli = Cli::try_parse_from(["modelmux", "route", "What is 2+2?", "--config", "mux.toml"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("mux.toml")));
        match cli.command {
            Some(Commands::Route { prompt }) => assert_eq!(prompt, "What is 2+2?"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["modelmux"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let errors = load_config(Some(std::path::Path::new("/nonexistent/modelmux.toml")))
            .unwrap_err();
        assert!(!errors.is_empty());
    }
}
