//! WordTrace
//!
//! Resolves extracted keyword mentions into a registry of canonical keywords.
//!
//! # Usage
//!
//! ```bash
//! wordtrace resolve --input article.json [--keep-going]
//! wordtrace keywords list [--type entity --category person]
//! wordtrace keywords find "Donald Trump"
//! wordtrace admin stats
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/wordtrace/config.toml)
//! 3. Environment variables (WORDTRACE_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use wordtrace_cli::{
    handle_admin, handle_keywords, handle_resolve, init_logging, load_settings, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.db_path.as_deref(),
        cli.log_level.as_deref(),
    )?;
    init_logging(&settings)?;

    match cli.command {
        Commands::Resolve { input, keep_going } => {
            handle_resolve(&settings, &input, keep_going).await?;
        }
        Commands::Keywords { command } => {
            handle_keywords(&settings, command)?;
        }
        Commands::Admin { command } => {
            handle_admin(&settings, command)?;
        }
    }

    Ok(())
}
