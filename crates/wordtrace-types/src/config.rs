//! Configuration loading for WordTrace.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/wordtrace/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::WordTraceError;

/// Identity resolver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Minimum cosine similarity to treat a mention as an existing keyword.
    /// Range: 0.0-1.0, higher = stricter (fewer merges).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_similarity_threshold() -> f32 {
    0.85
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl ResolverSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(format!(
                "similarity_threshold must be 0.0-1.0, got {}",
                self.similarity_threshold
            ));
        }
        Ok(())
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Provider name ("gemini" or "openai")
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model name (e.g., "gemini-embedding-001", "text-embedding-3-small")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// API key (loaded from env var, not stored in config file)
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Output dimension requested from the provider
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Attempts per request (1 = no retry)
    #[serde(default = "default_embedding_attempts")]
    pub max_attempts: u32,
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}

fn default_embedding_model() -> String {
    "gemini-embedding-001".to_string()
}

fn default_embedding_dimension() -> usize {
    3072
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_embedding_attempts() -> u32 {
    1
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            api_key: None,
            api_base_url: None,
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_attempts: default_embedding_attempts(),
        }
    }
}

impl EmbeddingSettings {
    /// API key from settings, falling back to the provider's conventional env var.
    pub fn resolved_api_key(&self) -> Option<SecretString> {
        self.api_key.clone().or_else(|| {
            let var = match self.provider.as_str() {
                "openai" => "OPENAI_API_KEY",
                _ => "GEMINI_API_KEY",
            };
            std::env::var(var).ok().map(SecretString::from)
        })
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB registry directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "wordtrace")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            resolver: ResolverSettings::default(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/wordtrace/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (WORDTRACE_*, nested keys joined with `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, WordTraceError> {
        let config_dir = ProjectDirs::from("", "", "wordtrace")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| WordTraceError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| WordTraceError::Config(e.to_string()))?
            .set_default(
                "resolver.similarity_threshold",
                default_similarity_threshold() as f64,
            )
            .map_err(|e| WordTraceError::Config(e.to_string()))?
            .set_default("embedding.provider", default_embedding_provider())
            .map_err(|e| WordTraceError::Config(e.to_string()))?
            .set_default("embedding.model", default_embedding_model())
            .map_err(|e| WordTraceError::Config(e.to_string()))?
            .set_default("embedding.dimension", default_embedding_dimension() as i64)
            .map_err(|e| WordTraceError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // WORDTRACE_DB_PATH, WORDTRACE_RESOLVER__SIMILARITY_THRESHOLD, WORDTRACE_EMBEDDING__API_KEY
        builder = builder.add_source(
            Environment::with_prefix("WORDTRACE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| WordTraceError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| WordTraceError::Config(e.to_string()))?;

        settings.resolver.validate().map_err(WordTraceError::Config)?;
        Ok(settings)
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(dirs) = directories::BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}
