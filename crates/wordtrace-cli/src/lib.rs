//! WordTrace CLI library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (resolve, keywords, admin)

pub mod cli;
pub mod commands;

pub use cli::{AdminCommands, Cli, Commands, KeywordCommands};
pub use commands::{
    handle_admin, handle_keywords, handle_resolve, init_logging, load_settings, parse_mentions,
    resolve_article, run_keywords, KeywordView, MentionReport, ResolveReport,
};
