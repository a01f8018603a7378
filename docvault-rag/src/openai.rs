//! Embedding provider for OpenAI-compatible `/embeddings` endpoints.
//!
//! Works against the OpenAI API and against local inference servers that
//! expose the same route for sentence-transformer models such as
//! `all-MiniLM-L6-v2`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// The OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// The default model: the sentence-transformer the upload service was built around.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// The dimensionality of `all-MiniLM-L6-v2`.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// An [`EmbeddingProvider`] that calls `POST {base_url}/embeddings`.
///
/// # Configuration
///
/// - `base_url` – e.g. `https://api.openai.com/v1` or `http://localhost:8080/v1`.
/// - `model` – defaults to `all-MiniLM-L6-v2`.
/// - `dimensions` – expected vector size; responses of another size are rejected.
/// - `api_key` – optional bearer token.
///
/// # Example
///
/// ```rust,ignore
/// use docvault_rag::openai::OpenAiCompatibleEmbedder;
///
/// let provider = OpenAiCompatibleEmbedder::new("http://localhost:8080/v1")?
///     .with_model("all-MiniLM-L6-v2")
///     .with_dimensions(384);
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl OpenAiCompatibleEmbedder {
    /// Create a provider for the given base URL with the default model and dimensions.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(RagError::Config("embedding endpoint must not be empty".into()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: format!("{base_url}/embeddings"),
            api_key: None,
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Set a bearer token sent with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the expected output dimensions.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// Set a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            RagError::Config(format!("failed to build embedding HTTP client: {e}"))
        })?;
        Ok(self)
    }

    fn error(&self, message: impl Into<String>) -> RagError {
        RagError::embedding(&self.model, message)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatibleEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(model = %self.model, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| self.error("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = %self.model, batch_size = texts.len(), "embedding batch");

        let mut request =
            self.client.post(&self.endpoint).json(&EmbeddingRequest { model: &self.model, input: texts });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            error!(model = %self.model, error = %e, "embedding request failed");
            self.error(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(model = %self.model, %status, "embedding API error");
            return Err(self.error(format!("API returned {status}: {detail}")));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse embedding response");
            self.error(format!("failed to parse response: {e}"))
        })?;

        // The API may return items out of order; `index` restores input order.
        parsed.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_endpoint_from_base_url() {
        let provider = OpenAiCompatibleEmbedder::new("http://localhost:8080/v1/").unwrap();
        assert_eq!(provider.endpoint, "http://localhost:8080/v1/embeddings");
        assert_eq!(provider.name(), DEFAULT_MODEL);
        assert_eq!(provider.dimensions(), DEFAULT_DIMENSIONS);
    }

    #[test]
    fn rejects_empty_base_url() {
        assert!(matches!(OpenAiCompatibleEmbedder::new(""), Err(RagError::Config(_))));
    }

    #[test]
    fn empty_api_key_is_ignored() {
        let provider = OpenAiCompatibleEmbedder::new(OPENAI_BASE_URL).unwrap().with_api_key("");
        assert!(provider.api_key.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_embedding_error() {
        let provider = OpenAiCompatibleEmbedder::new("http://127.0.0.1:9").unwrap();
        match provider.embed("hello").await {
            Err(RagError::Embedding { provider, .. }) => assert_eq!(provider, DEFAULT_MODEL),
            other => panic!("expected embedding error, got {other:?}"),
        }
    }
}
