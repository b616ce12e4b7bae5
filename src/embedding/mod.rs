use crate::config::Config;
use crate::credential::Credential;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// HTTP layer failed before receiving a response.
    #[error("Embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with a non-success status.
    #[error("Unexpected embedding response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Response body for diagnostics.
        body: String,
    },
    /// Vector length differs from the index dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured for the index.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce the embedding vector for one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError>;
}

/// Azure OpenAI embeddings client.
pub struct AzureOpenAiEmbeddingClient {
    http: Client,
    endpoint: String,
    credential: Credential,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl AzureOpenAiEmbeddingClient {
    /// Build a client for the deployment named in configuration.
    pub fn new(config: &Config) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder().user_agent("ragdex/embedding").build()?;
        Ok(Self::with_client(
            http,
            &config.openai_endpoint,
            &config.embedding_model,
            &config.openai_api_version,
            config.openai_credential(),
            config.embedding_dimension,
        ))
    }

    /// Build a client from explicit parts.
    pub fn with_client(
        http: Client,
        base_url: &str,
        deployment: &str,
        api_version: &str,
        credential: Credential,
        dimension: usize,
    ) -> Self {
        let endpoint = format!(
            "{}/openai/deployments/{deployment}/embeddings?api-version={api_version}",
            base_url.trim_end_matches('/')
        );
        tracing::debug!(
            deployment,
            dimension,
            credential = credential.kind(),
            "Initialized embedding client"
        );
        Self {
            http,
            endpoint,
            credential,
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingClient for AzureOpenAiEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let request = self
            .credential
            .apply(self.http.post(&self.endpoint))
            .json(&EmbeddingRequest { input: text });
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::UnexpectedStatus { status, body });
        }

        let payload: EmbeddingResponse = response.json().await?;
        let vector = payload
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| {
                EmbeddingClientError::GenerationFailed("provider returned no vectors".into())
            })?;

        if vector.len() != self.dimension {
            return Err(EmbeddingClientError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        Ok(vector)
    }
}
