//! Command-line interface for kumo.
//!
//! Uses [`clap`] derive for flag parsing. The binary has a single mode —
//! the interactive session — plus `--list-models`. `--debug-log` installs
//! a JSON tracing layer that records every raw stream event.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::api::{models, Client};
use crate::chat::Runner;
use crate::config::Config;
use crate::directive;

/// Top-level CLI structure.
#[derive(Parser)]
#[command(
    name = "kumo",
    about = "A terminal agent where the model drives local file tools"
)]
pub struct Cli {
    /// Model name (overrides config)
    #[arg(long)]
    pub model: Option<String>,

    /// Path to write a JSON debug log of raw stream events
    #[arg(long)]
    pub debug_log: Option<PathBuf>,

    /// Replace the built-in system instructions with your own
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Include file(s) in the system prompt context
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    /// List known models and exit
    #[arg(long)]
    pub list_models: bool,
}

/// Parses command-line arguments.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI to the interactive session.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let model = cli.model.unwrap_or_else(|| config.model.clone());

    if cli.list_models {
        models::print_models(&model);
        return Ok(());
    }

    if let Some(ref path) = cli.debug_log {
        init_debug_log(path)?;
    }

    let api_key = config.resolve_api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key found in config file {} or environment variable ANTHROPIC_API_KEY",
            Config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;

    let custom_instructions = cli.system_prompt.or_else(|| config.system_prompt.clone());

    let runner = Runner {
        client: Client::new(api_key, config.base_url.as_deref()),
        model,
        prefix: directive::default_prefix(),
        custom_instructions,
        context_files: cli.files,
    };
    runner.run().await
}

/// Installs a JSON tracing subscriber appending to the given file at debug
/// level (overridable via `RUST_LOG`).
fn init_debug_log(path: &Path) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open debug log {}", path.display()))?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    tracing::debug!("debug log started");
    Ok(())
}
