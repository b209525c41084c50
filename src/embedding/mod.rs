//! Embedding client abstraction and the OpenAI-compatible adapter.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingProviderError {
    /// Provider could not be reached (DNS, TLS, timeout, connection reset).
    #[error("Failed to reach embedding provider: {0}")]
    Request(String),
    /// Provider answered with a non-success status (bad credentials, rate limit, outage).
    #[error("Embedding provider returned {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned by the provider.
        message: String,
    },
    /// Provider response did not contain one usable vector per input.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingProviderError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingProviderError> {
        self.generate_embeddings(vec![text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                EmbeddingProviderError::InvalidResponse("no vector returned for query".into())
            })
    }
}

/// Embedding client for `POST {base_url}/embeddings` (OpenAI and compatible servers).
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbeddingClient {
    /// Construct a client for the given endpoint and model.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        batch_size: usize,
    ) -> Result<Self, EmbeddingProviderError> {
        let http = Client::builder()
            .user_agent("pdfchat/embeddings")
            .build()
            .map_err(|error| EmbeddingProviderError::Request(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            batch_size: batch_size.max(1),
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, EmbeddingProviderError> {
        Self::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.embedding_model.clone(),
            config.embedding_batch_size,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        let payload = json!({
            "model": self.model,
            "input": batch,
        });

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| EmbeddingProviderError::Request(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingProviderError::Rejected { status, message });
        }

        let body: EmbeddingResponse = response.json().await.map_err(|error| {
            EmbeddingProviderError::InvalidResponse(format!("failed to decode response: {error}"))
        })?;

        if body.data.len() != batch.len() {
            return Err(EmbeddingProviderError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                batch.len(),
                body.data.len()
            )));
        }

        let mut data = body.data;
        data.sort_by_key(|item| item.index);
        if let Some((position, item)) = data
            .iter()
            .enumerate()
            .find(|(position, item)| item.index != *position)
        {
            return Err(EmbeddingProviderError::InvalidResponse(format!(
                "expected vector index {position}, got {}",
                item.index
            )));
        }
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            model = %self.model,
            texts = texts.len(),
            batch_size = self.batch_size,
            "Generating embeddings"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }

        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 || vectors.iter().any(|vector| vector.len() != dimension) {
            return Err(EmbeddingProviderError::InvalidResponse(
                "vectors are empty or of inconsistent dimension".into(),
            ));
        }

        Ok(vectors)
    }
}
