//! Wiring of concrete capabilities into the ingestion pipeline and chat service.

use crate::{
    chat::{AnswerStream, ChatError, ChatService, ChatSettings},
    completion::{AzureOpenAiCompletionClient, CompletionError},
    config::Config,
    embedding::{AzureOpenAiEmbeddingClient, EmbeddingClientError},
    layout::{ExtractionError, build_extractor},
    metrics::MetricsSnapshot,
    processing::{
        ChunkingError, IngestError, IngestReport, IngestionPipeline, PipelineSettings,
        SourceDocument,
    },
    search::{AzureSearchService, SearchIndexError},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while constructing service components at start-up.
#[derive(Debug, Error)]
pub enum InitError {
    /// Layout extractor could not be built.
    #[error("Failed to initialize layout analysis: {0}")]
    Layout(#[from] ExtractionError),
    /// Embedding client could not be built.
    #[error("Failed to initialize embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Completion client could not be built.
    #[error("Failed to initialize completion client: {0}")]
    Completion(#[from] CompletionError),
    /// Search client could not be built.
    #[error("Failed to initialize search client: {0}")]
    Search(#[from] SearchIndexError),
    /// Splitter settings were rejected.
    #[error("Invalid splitter configuration: {0}")]
    Chunking(#[from] ChunkingError),
}

/// Operations exposed to the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Ingest one delivered document.
    async fn ingest(&self, document: SourceDocument) -> Result<IngestReport, IngestError>;

    /// Start a streamed answer for a user question.
    async fn answer(&self, query: &str) -> Result<AnswerStream, ChatError>;

    /// Current ingestion counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Ingestion pipeline and chat service sharing one set of backend clients.
pub struct RagService {
    pipeline: IngestionPipeline,
    chat: ChatService,
}

impl RagService {
    /// Combine an existing pipeline and chat service.
    pub fn new(pipeline: IngestionPipeline, chat: ChatService) -> Self {
        Self { pipeline, chat }
    }

    /// Build every backend client from configuration.
    pub fn from_config(config: &Config) -> Result<Self, InitError> {
        let extractor = build_extractor(config)?;
        let embedder = Arc::new(AzureOpenAiEmbeddingClient::new(config)?);
        let search = Arc::new(AzureSearchService::new(config)?);
        let completion = Arc::new(AzureOpenAiCompletionClient::new(config)?);

        let pipeline = IngestionPipeline::new(
            extractor,
            embedder.clone(),
            search.clone(),
            PipelineSettings::from_config(config)?,
        );
        let chat = ChatService::new(
            embedder,
            search,
            completion,
            ChatSettings::from_config(config),
        );
        tracing::info!(index = %config.search_index_name, "Service components initialized");

        Ok(Self::new(pipeline, chat))
    }

    /// Ingestion pipeline used by this service.
    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest(&self, document: SourceDocument) -> Result<IngestReport, IngestError> {
        self.pipeline.run(&document).await
    }

    async fn answer(&self, query: &str) -> Result<AnswerStream, ChatError> {
        self.chat.answer(query).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.pipeline.metrics_snapshot()
    }
}
