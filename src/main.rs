//! Entry point for kumo, a terminal agent where the model drives local file
//! tools through an embedded directive protocol.
//!
//! This binary loads environment variables, parses CLI arguments via
//! [`cli`], and hands control to the interactive session.

mod accumulator;
mod api;
mod chat;
mod cli;
mod config;
mod constants;
mod diff;
mod directive;
mod message;
mod output;
mod prompt;
mod tools;

use anyhow::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = cli::parse();
    cli::run(cli).await
}
