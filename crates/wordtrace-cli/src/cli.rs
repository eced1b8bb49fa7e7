//! CLI argument parsing for the wordtrace binary.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// WordTrace keyword registry
///
/// Resolves extracted keyword mentions into canonical keywords.
#[derive(Parser, Debug)]
#[command(name = "wordtrace")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/wordtrace/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override registry database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve one article's mentions against the registry
    Resolve {
        /// JSON input file, or "-" for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Skip mentions that fail instead of aborting the article
        #[arg(long)]
        keep_going: bool,
    },

    /// Inspect canonical keywords
    Keywords {
        #[command(subcommand)]
        command: KeywordCommands,
    },

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

/// Keyword subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum KeywordCommands {
    /// List keywords in creation order
    List {
        /// Only this keyword type (entity, concept)
        #[arg(long = "type")]
        keyword_type: Option<String>,

        /// Only this category (requires --type)
        #[arg(long, requires = "keyword_type")]
        category: Option<String>,
    },

    /// Get a keyword by id
    Get {
        /// Keyword ID
        id: String,
    },

    /// Find a keyword by exact canonical name
    Find {
        /// Canonical name
        name: String,
    },
}

/// Admin subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Show registry statistics
    Stats,

    /// Trigger RocksDB compaction
    Compact,
}
