//! `toolforge` command-line entry point.
//!
//! ```bash
//! # OpenAPI files, everything approved
//! toolforge --files api.yaml --auto-approve --output tools.json
//!
//! # Crawl a documentation site with a model endpoint for extraction and schemas
//! TOOLFORGE_LLM_BASE_URL=https://models.example.com/v1 TOOLFORGE_LLM_API_KEY=... \
//!   toolforge --url https://docs.example.com --server-url https://api.example.com
//! ```

use clap::Parser;
use std::process::ExitCode;

mod app;
mod cli;
mod interact;
mod llm;
mod logging;
mod settings;

/// Exit status for unusable input (same as clap usage errors).
const EXIT_INPUT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    logging::init(&cli.log_level, cli.log_format);
    tracing::debug!("toolforge v{}", env!("CARGO_PKG_VERSION"));

    match app::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {e:#}");
            if app::is_input_error(&e) {
                ExitCode::from(EXIT_INPUT_ERROR)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
