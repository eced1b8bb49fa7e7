//! Command implementations for the wordtrace binary.
//!
//! Handles:
//! - resolve: Read an article's mentions, resolve them, print outcomes
//! - keywords: List and look up canonical keywords
//! - admin: Registry statistics and compaction
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::fs;
use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use wordtrace_embeddings::{ApiEmbedder, ApiEmbedderConfig, EmbeddingProvider};
use wordtrace_resolver::IdentityResolver;
use wordtrace_storage::Storage;
use wordtrace_types::{
    ArticleMentions, CandidateMention, CanonicalKeyword, KeywordCategory, KeywordType,
    ResolutionOutcome, Settings,
};

use crate::cli::{AdminCommands, KeywordCommands};

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }

    Ok(settings)
}

/// Install the stderr tracing subscriber. RUST_LOG wins over `log_level`.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Open the registry, creating parent directories if needed.
pub fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_db_path();

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let storage = Storage::open(&db_path).context("Failed to open registry")?;
    Ok(Arc::new(storage))
}

fn build_embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let config = ApiEmbedderConfig::from_settings(&settings.embedding)
        .context("Invalid embedding configuration")?;
    let embedder = ApiEmbedder::new(config).context("Failed to create embedding provider")?;
    Ok(Arc::new(embedder))
}

/// Accepted input shapes for `resolve`.
#[derive(Deserialize)]
#[serde(untagged)]
enum MentionInput {
    Article(ArticleMentions),
    Mentions(Vec<CandidateMention>),
}

/// Parse an article envelope or a bare mention array.
///
/// Rejects mentions whose category does not belong to their keyword type.
pub fn parse_mentions(json: &str) -> Result<ArticleMentions> {
    let input: MentionInput =
        serde_json::from_str(json).context("Input is neither an article nor a mention list")?;
    let article = match input {
        MentionInput::Article(article) => article,
        MentionInput::Mentions(keywords) => ArticleMentions {
            article_id: None,
            keywords,
        },
    };

    for mention in &article.keywords {
        if mention.category.keyword_type() != mention.keyword_type {
            bail!(
                "Mention {:?}: category {} is not valid for keyword type {}",
                mention.name,
                mention.category,
                mention.keyword_type
            );
        }
    }

    Ok(article)
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))
    }
}

/// Keyword as printed by the CLI (embedding omitted).
#[derive(Debug, Serialize)]
pub struct KeywordView {
    pub id: String,
    pub canonical_name: String,
    pub keyword_type: KeywordType,
    pub category: KeywordCategory,
    pub aliases: Vec<String>,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CanonicalKeyword> for KeywordView {
    fn from(kw: &CanonicalKeyword) -> Self {
        Self {
            id: kw.id.clone(),
            canonical_name: kw.canonical_name.clone(),
            keyword_type: kw.keyword_type,
            category: kw.category,
            aliases: kw.aliases.clone(),
            dimension: kw.embedding.dimension(),
            created_at: kw.created_at,
            updated_at: kw.updated_at,
        }
    }
}

/// Per-mention line of a resolve report.
#[derive(Debug, Serialize)]
pub struct MentionReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<KeywordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_similarity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MentionReport {
    fn resolved(name: &str, outcome: &ResolutionOutcome) -> Self {
        Self {
            name: name.to_string(),
            keyword: Some(KeywordView::from(&outcome.keyword)),
            is_new: Some(outcome.is_new),
            matched_similarity: outcome.matched_similarity,
            edge_weight: Some(outcome.edge_weight()),
            error: None,
        }
    }

    fn failed(name: &str, error: String) -> Self {
        Self {
            name: name.to_string(),
            keyword: None,
            is_new: None,
            matched_similarity: None,
            edge_weight: None,
            error: Some(error),
        }
    }
}

/// Outcome of resolving one article.
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_id: Option<String>,
    pub created: usize,
    pub matched: usize,
    pub failed: usize,
    pub mentions: Vec<MentionReport>,
}

/// Resolve an article with an existing resolver.
///
/// Without `keep_going` the first failure aborts the article.
pub async fn resolve_article(
    resolver: &mut IdentityResolver,
    article: &ArticleMentions,
    keep_going: bool,
) -> Result<ResolveReport> {
    let mut report = ResolveReport {
        article_id: article.article_id.clone(),
        created: 0,
        matched: 0,
        failed: 0,
        mentions: Vec::with_capacity(article.keywords.len()),
    };

    if keep_going {
        let results = resolver.resolve_each(&article.keywords).await;
        for (mention, result) in article.keywords.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    report.record(&outcome);
                    report
                        .mentions
                        .push(MentionReport::resolved(&mention.name, &outcome));
                }
                Err(e) if e.is_fatal() => {
                    return Err(e).context("Registry consistency failure");
                }
                Err(e) => {
                    report.failed += 1;
                    report
                        .mentions
                        .push(MentionReport::failed(&mention.name, e.to_string()));
                }
            }
        }
    } else {
        let outcomes = resolver
            .resolve_batch(&article.keywords)
            .await
            .context("Failed to resolve article")?;
        for (mention, outcome) in article.keywords.iter().zip(&outcomes) {
            report.record(outcome);
            report
                .mentions
                .push(MentionReport::resolved(&mention.name, outcome));
        }
    }

    Ok(report)
}

impl ResolveReport {
    fn record(&mut self, outcome: &ResolutionOutcome) {
        if outcome.is_new {
            self.created += 1;
        } else {
            self.matched += 1;
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Handle `wordtrace resolve`.
pub async fn handle_resolve(settings: &Settings, input: &str, keep_going: bool) -> Result<()> {
    let article = parse_mentions(&read_input(input)?)?;
    info!(
        article_id = ?article.article_id,
        mentions = article.keywords.len(),
        "Resolving article"
    );

    let storage = open_storage(settings)?;
    let embedder = build_embedder(settings)?;
    let mut resolver = IdentityResolver::from_settings(embedder, storage.clone(), &settings.resolver)
        .context("Failed to create resolver")?;

    let report = resolve_article(&mut resolver, &article, keep_going).await?;
    if report.failed > 0 {
        warn!(failed = report.failed, "Some mentions could not be resolved");
    }

    storage.flush().context("Failed to flush registry")?;
    print_json(&report)
}

/// Handle `wordtrace keywords ...`.
pub fn handle_keywords(settings: &Settings, command: KeywordCommands) -> Result<()> {
    let storage = open_storage(settings)?;
    run_keywords(&storage, command)
}

/// Run a keyword command against an open registry.
pub fn run_keywords(storage: &Storage, command: KeywordCommands) -> Result<()> {
    match command {
        KeywordCommands::List {
            keyword_type,
            category,
        } => {
            let keywords = match keyword_type {
                Some(t) => {
                    let keyword_type: KeywordType = t.parse()?;
                    let category = category
                        .map(|c| KeywordCategory::parse_for(keyword_type, &c))
                        .transpose()?;
                    storage.list_keywords_by_category(keyword_type, category)?
                }
                None => storage.list_keywords()?,
            };
            let views: Vec<KeywordView> = keywords.iter().map(KeywordView::from).collect();
            print_json(&views)
        }
        KeywordCommands::Get { id } => match storage.get_keyword(&id)? {
            Some(kw) => print_json(&KeywordView::from(&kw)),
            None => bail!("Keyword not found: {}", id),
        },
        KeywordCommands::Find { name } => match storage.get_keyword_by_name(&name)? {
            Some(kw) => print_json(&KeywordView::from(&kw)),
            None => bail!("No keyword with canonical name {:?}", name),
        },
    }
}

/// Handle `wordtrace admin ...`.
pub fn handle_admin(settings: &Settings, command: AdminCommands) -> Result<()> {
    let storage = open_storage(settings)?;

    match command {
        AdminCommands::Stats => {
            let stats = storage.get_stats()?;
            println!("Registry Statistics");
            println!("===================");
            println!("Path: {}", settings.db_path);
            println!();
            println!("Keywords:   {:>10}", stats.keyword_count);
            println!("  entity:   {:>10}", stats.entity_count);
            println!("  concept:  {:>10}", stats.concept_count);
            println!("Aliases:    {:>10}", stats.alias_count);
            match stats.embedding_dimension {
                Some(dim) => println!("Dimension:  {:>10}", dim),
                None => println!("Dimension:  {:>10}", "-"),
            }
            println!();
            println!("Disk Usage: {}", format_bytes(stats.disk_usage_bytes));
        }
        AdminCommands::Compact => {
            println!("Compacting all column families...");
            storage.compact()?;
            println!("Compaction complete.");
        }
    }

    Ok(())
}

/// Format bytes in human-readable form
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wordtrace_embeddings::MockEmbedder;

    #[test]
    fn test_parse_article_envelope() {
        let article = parse_mentions(
            r#"{"article_id":"a-1","keywords":[
                {"name":"Trump","canonical_name":"Donald Trump","keyword_type":"entity","category":"person"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(article.article_id, Some("a-1".to_string()));
        assert_eq!(article.keywords.len(), 1);
    }

    #[test]
    fn test_parse_bare_mention_list() {
        let article = parse_mentions(
            r#"[{"name":"AI","canonical_name":"Artificial Intelligence","keyword_type":"concept","category":"innovation"}]"#,
        )
        .unwrap();
        assert!(article.article_id.is_none());
        assert_eq!(article.keywords[0].category, KeywordCategory::Innovation);
    }

    #[test]
    fn test_parse_rejects_cross_type_category() {
        let result = parse_mentions(
            r#"[{"name":"Paris","canonical_name":"Paris","keyword_type":"concept","category":"place"}]"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_mentions(r#"{"foo": 1}"#).is_err());
    }

    #[tokio::test]
    async fn test_resolve_article_report() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let embedder = Arc::new(MockEmbedder::new(8).failing_on("Broken"));
        let mut resolver = IdentityResolver::new(embedder, storage.clone(), 0.85).unwrap();

        let article = parse_mentions(
            r#"[
                {"name":"President Trump","canonical_name":"Donald Trump","keyword_type":"entity","category":"person"},
                {"name":"Broken","canonical_name":"Broken","keyword_type":"entity","category":"person"},
                {"name":"Trump","canonical_name":"Donald Trump","keyword_type":"entity","category":"person"}
            ]"#,
        )
        .unwrap();

        let report = resolve_article(&mut resolver, &article, true).await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.matched, 1);
        assert_eq!(report.failed, 1);
        assert!(report.mentions[1].error.is_some());
        assert_eq!(report.mentions[2].is_new, Some(false));

        let strict = resolve_article(&mut resolver, &article, false).await;
        assert!(strict.is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
    }
}
