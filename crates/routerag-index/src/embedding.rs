//! OpenAI-compatible embeddings client.
//!
//! [`Embedder`] is the seam the rest of the crate talks to: one call per
//! batch, vectors returned in request order. [`EmbeddingClient`] implements it
//! over `POST {base_url}/embeddings` and enforces the ordering contract using
//! the `index` field of each response item.

use async_trait::async_trait;
use routerag_core::{EmbeddingConfig, RouteragError, API_KEY_ENV};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Source of raw (unnormalized) embedding vectors.
///
/// Implementations must return exactly one vector per input text, in the
/// same order as `texts`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts with a single provider call.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Embedding`] if the provider call fails.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RouteragError>;
}

/// Client for an OpenAI-compatible embeddings endpoint.
///
/// # Examples
///
/// ```
/// use routerag_index::embedding::EmbeddingClient;
///
/// let client = EmbeddingClient::new("test-key");
/// assert_eq!(client.model(), "text-embedding-3-small");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    /// Create a client with the given API key and default model.
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from an [`EmbeddingConfig`].
    ///
    /// Falls back to the `OPENAI_API_KEY` env var if no key is configured.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Config`] if no API key is available.
    ///
    /// # Examples
    ///
    /// ```
    /// use routerag_core::EmbeddingConfig;
    /// use routerag_index::embedding::EmbeddingClient;
    ///
    /// let config = EmbeddingConfig {
    ///     api_key: Some("sk-test".into()),
    ///     base_url: Some("http://localhost:8080/v1/".into()),
    ///     ..EmbeddingConfig::default()
    /// };
    /// let client = EmbeddingClient::with_config(&config).unwrap();
    /// assert_eq!(client.base_url(), "http://localhost:8080/v1");
    /// ```
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self, RouteragError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                RouteragError::Config(format!(
                    "embedding API key not found: set embedding.api_key in .routerag.toml or {API_KEY_ENV}"
                ))
            })?;

        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model: config.model.clone(),
        })
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the endpoint root requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_request<'a>(&'a self, texts: &'a [String]) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RouteragError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(batch_size = texts.len(), model = %self.model, "requesting embeddings");

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.build_request(texts))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "embedding request failed");
                RouteragError::Embedding(format!("HTTP request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            error!(%status, "embedding API error");
            return Err(RouteragError::Embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RouteragError::Embedding(format!("failed to parse response: {e}")))?;

        order_response(embed_response.data, texts.len())
    }
}

/// Put response items back into request order and check the count.
///
/// When the provider tags items with `index`, those indices must be exactly
/// `0..expected`. Untagged responses are trusted to already be in order, but
/// a mix of tagged and untagged items is rejected.
fn order_response(
    mut items: Vec<EmbedDataItem>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, RouteragError> {
    if items.len() != expected {
        return Err(RouteragError::Embedding(format!(
            "provider returned {} embeddings for {expected} inputs",
            items.len()
        )));
    }

    let tagged = items.iter().filter(|item| item.index.is_some()).count();
    if tagged == items.len() {
        items.sort_by_key(|item| item.index);
        for (position, item) in items.iter().enumerate() {
            if item.index != Some(position) {
                return Err(RouteragError::Embedding(format!(
                    "provider response indices are not a permutation of 0..{expected}"
                )));
            }
        }
    } else if tagged != 0 {
        return Err(RouteragError::Embedding(
            "provider response mixes indexed and unindexed items".into(),
        ));
    }

    Ok(items.into_iter().map(|item| item.embedding).collect())
}
