//! API-based embedding provider for Gemini and OpenAI-compatible endpoints.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use wordtrace_types::{Embedding, EmbeddingSettings};

use crate::error::EmbeddingError;
use crate::provider::{EmbeddingProvider, ProviderInfo};

/// Wire format spoken by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// Google Generative Language API (`:embedContent`, `:batchEmbedContents`)
    Gemini,
    /// OpenAI `/embeddings` and compatible services
    OpenAi,
}

/// Configuration for the API embedder.
#[derive(Debug, Clone)]
pub struct ApiEmbedderConfig {
    pub flavor: ApiFlavor,

    /// API base URL (e.g., "https://generativelanguage.googleapis.com/v1beta")
    pub base_url: String,

    /// Model to use (e.g., "gemini-embedding-001")
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Output dimension requested and enforced
    pub dimension: usize,

    /// Request timeout
    pub timeout: Duration,

    /// Attempts per request; 1 disables retry
    pub max_attempts: u32,

    /// Texts per HTTP request when embedding a batch
    pub max_batch_size: usize,
}

impl ApiEmbedderConfig {
    fn with_flavor(flavor: ApiFlavor, api_key: SecretString, model: String, dimension: usize) -> Self {
        let base_url = match flavor {
            ApiFlavor::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            ApiFlavor::OpenAi => "https://api.openai.com/v1",
        };
        Self {
            flavor,
            base_url: base_url.to_string(),
            model,
            api_key,
            dimension,
            timeout: Duration::from_secs(30),
            max_attempts: 1,
            max_batch_size: 100,
        }
    }

    /// Create config for the Gemini API.
    pub fn gemini(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self::with_flavor(
            ApiFlavor::Gemini,
            SecretString::from(api_key.into()),
            model.into(),
            dimension,
        )
    }

    /// Create config for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self::with_flavor(
            ApiFlavor::OpenAi,
            SecretString::from(api_key.into()),
            model.into(),
            dimension,
        )
    }

    /// Build from layered settings.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self, EmbeddingError> {
        let api_key = settings.resolved_api_key().ok_or_else(|| {
            EmbeddingError::Config(format!(
                "no API key configured for embedding provider {}",
                settings.provider
            ))
        })?;

        let flavor = match settings.provider.as_str() {
            "gemini" => ApiFlavor::Gemini,
            "openai" => ApiFlavor::OpenAi,
            other => {
                return Err(EmbeddingError::Config(format!(
                    "unknown embedding provider: {}",
                    other
                )))
            }
        };
        let mut config =
            Self::with_flavor(flavor, api_key, settings.model.clone(), settings.dimension);

        if let Some(base_url) = &settings.api_base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        config.timeout = Duration::from_secs(settings.timeout_secs);
        config.max_attempts = settings.max_attempts.max(1);
        Ok(config)
    }
}

/// API-based embedding provider.
pub struct ApiEmbedder {
    client: Client,
    config: ApiEmbedderConfig,
    info: ProviderInfo,
}

impl ApiEmbedder {
    /// Create a new API embedder.
    pub fn new(config: ApiEmbedderConfig) -> Result<Self, EmbeddingError> {
        if config.dimension == 0 {
            return Err(EmbeddingError::Config("dimension must be > 0".to_string()));
        }
        if config.max_batch_size == 0 {
            return Err(EmbeddingError::Config(
                "max_batch_size must be > 0".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        let info = ProviderInfo {
            name: match config.flavor {
                ApiFlavor::Gemini => "gemini".to_string(),
                ApiFlavor::OpenAi => "openai".to_string(),
            },
            model: config.model.clone(),
            dimension: config.dimension,
        };

        Ok(Self {
            client,
            config,
            info,
        })
    }

    /// Call the API, retrying transient failures up to `max_attempts`.
    async fn call_api(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, batch = texts.len(), "Calling embedding API");

            let result = match self.config.flavor {
                ApiFlavor::Gemini => self.make_gemini_request(texts).await,
                ApiFlavor::OpenAi => self.make_openai_request(texts).await,
            };

            match result {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    let transient = matches!(
                        e,
                        EmbeddingError::Api(_) | EmbeddingError::RateLimitExceeded
                    );
                    if !transient || attempts >= self.config.max_attempts {
                        error!(error = %e, attempts, "Embedding request failed");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Embedding request failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Make a Gemini request. Single texts use `:embedContent`, batches `:batchEmbedContents`.
    async fn make_gemini_request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }

        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct EmbedContentRequest<'a> {
            #[serde(skip_serializing_if = "Option::is_none")]
            model: Option<String>,
            content: Content<'a>,
            output_dimensionality: usize,
        }

        #[derive(Serialize)]
        struct BatchRequest<'a> {
            requests: Vec<EmbedContentRequest<'a>>,
        }

        #[derive(Deserialize)]
        struct ContentEmbedding {
            values: Vec<f32>,
        }

        #[derive(Deserialize)]
        struct EmbedContentResponse {
            embedding: ContentEmbedding,
        }

        #[derive(Deserialize)]
        struct BatchResponse {
            #[serde(default)]
            embeddings: Vec<ContentEmbedding>,
        }

        fn request_for(text: &str, model: Option<String>, dimension: usize) -> EmbedContentRequest<'_> {
            EmbedContentRequest {
                model,
                content: Content {
                    parts: vec![Part { text }],
                },
                output_dimensionality: dimension,
            }
        }

        let dimension = self.config.dimension;

        if let [text] = texts {
            let url = format!(
                "{}/models/{}:embedContent",
                self.config.base_url, self.config.model
            );
            let body: EmbedContentResponse = self
                .post_json(&url, &request_for(text, None, dimension), ApiFlavor::Gemini)
                .await?;
            return Ok(vec![body.embedding.values]);
        }

        let url = format!(
            "{}/models/{}:batchEmbedContents",
            self.config.base_url, self.config.model
        );
        let request = BatchRequest {
            requests: texts
                .iter()
                .map(|t| request_for(t, Some(format!("models/{}", self.config.model)), dimension))
                .collect(),
        };
        let body: BatchResponse = self.post_json(&url, &request, ApiFlavor::Gemini).await?;

        if body.embeddings.len() != texts.len() {
            return Err(EmbeddingError::MissingIndex(body.embeddings.len()));
        }
        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }

    /// Make an OpenAI-compatible `/embeddings` request.
    async fn make_openai_request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
            dimensions: usize,
            encoding_format: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            data: Vec<OpenAIEmbedding>,
        }

        #[derive(Deserialize)]
        struct OpenAIEmbedding {
            index: usize,
            embedding: Vec<f32>,
        }

        let request = OpenAIRequest {
            model: &self.config.model,
            input: texts,
            dimensions: self.config.dimension,
            encoding_format: "float",
        };

        let url = format!("{}/embeddings", self.config.base_url);
        let body: OpenAIResponse = self.post_json(&url, &request, ApiFlavor::OpenAi).await?;

        // Slot results by index, the API may return them out of order.
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in body.data {
            if item.index >= texts.len() {
                return Err(EmbeddingError::UnexpectedIndex {
                    index: item.index,
                    batch_size: texts.len(),
                });
            }
            slots[item.index] = Some(item.embedding);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, v)| v.ok_or(EmbeddingError::MissingIndex(i)))
            .collect()
    }

    async fn post_json<T, R>(&self, url: &str, body: &T, flavor: ApiFlavor) -> Result<R, EmbeddingError>
    where
        T: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);

        let request = match flavor {
            ApiFlavor::Gemini => request.header("x-goog-api-key", self.config.api_key.expose_secret()),
            ApiFlavor::OpenAi => request.header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            ),
        };

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Api(e.to_string()))?;

        if response.status() == 429 {
            return Err(EmbeddingError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(e.to_string()))
    }

    fn check(&self, values: Vec<f32>) -> Result<Embedding, EmbeddingError> {
        let embedding = Embedding::new(values);
        embedding.ensure_dimension(self.config.dimension)?;
        if !embedding.is_finite() {
            return Err(EmbeddingError::Parse(
                "embedding contains non-finite values".to_string(),
            ));
        }
        Ok(embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for ApiEmbedder {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let mut vectors = self.call_api(&[text]).await?;
        let values = vectors.pop().ok_or(EmbeddingError::MissingIndex(0))?;
        self.check(values)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.iter().any(|t| t.is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.max_batch_size) {
            for values in self.call_api(chunk).await? {
                out.push(self.check(values)?);
            }
        }
        Ok(out)
    }
}
