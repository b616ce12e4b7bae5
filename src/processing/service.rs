//! Ingestion pipeline coordinating layout analysis, splitting, embedding and index writes.

use crate::{
    config::Config,
    embedding::EmbeddingClient,
    layout::LayoutExtractor,
    metrics::{IngestMetrics, MetricsSnapshot},
    processing::{
        chunking::{ChunkingConfig, split_sections},
        driver,
        headers::{HeadingRule, split_by_headers},
        types::{Chunk, ChunkingError, IngestError, IngestReport, SourceDocument},
    },
    search::IndexWriter,
};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Splitter and driver settings for one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Headings that open a new section.
    pub heading_rules: Vec<HeadingRule>,
    /// Chunk size and overlap.
    pub chunking: ChunkingConfig,
    /// Chunks embedded and upserted at the same time.
    pub concurrency: usize,
}

impl PipelineSettings {
    /// Derive settings from configuration values.
    pub fn from_config(config: &Config) -> Result<Self, ChunkingError> {
        Ok(Self {
            heading_rules: HeadingRule::markdown_levels(config.text_splitter_header_depth),
            chunking: ChunkingConfig::new(
                config.text_splitter_chunk_size,
                config.text_splitter_chunk_overlap,
            )?,
            concurrency: config.ingest_concurrency,
        })
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            heading_rules: HeadingRule::markdown_levels(3),
            chunking: ChunkingConfig::default(),
            concurrency: 1,
        }
    }
}

/// Turns one delivered document into index records.
///
/// Holds long-lived handles to every capability so that the HTTP trigger and the CLI share the
/// same pipeline. Construct once and share through an `Arc`.
pub struct IngestionPipeline {
    extractor: Arc<dyn LayoutExtractor>,
    embedder: Arc<dyn EmbeddingClient>,
    indexer: Arc<dyn IndexWriter>,
    settings: PipelineSettings,
    metrics: Arc<IngestMetrics>,
}

impl IngestionPipeline {
    /// Assemble a pipeline from its capabilities.
    pub fn new(
        extractor: Arc<dyn LayoutExtractor>,
        embedder: Arc<dyn EmbeddingClient>,
        indexer: Arc<dyn IndexWriter>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            extractor,
            embedder,
            indexer,
            settings,
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Run the whole pipeline for one document.
    ///
    /// Returns `Err` only for failures that abort the run before any chunk is attempted. Chunk
    /// level failures are reported inside the returned [`IngestReport`].
    pub async fn run(&self, document: &SourceDocument) -> Result<IngestReport, IngestError> {
        let Some(name) = document.resolved_name() else {
            tracing::info!(url = %document.url, "Document has no name; skipping ingestion");
            self.metrics.record_skip();
            return Ok(IngestReport::skipped());
        };

        let span = tracing::info_span!("ingest", run_id = %Uuid::new_v4(), blob = %name);
        async {
            match self.run_named(document).await {
                Ok(report) => {
                    self.metrics.record_document(
                        report.indexed_count() as u64,
                        report.failed_count() as u64,
                    );
                    tracing::info!(
                        parent_id = report.parent_id.as_deref().unwrap_or_default(),
                        indexed = report.indexed_count(),
                        failed = report.failed_count(),
                        "Ingestion run finished"
                    );
                    Ok(report)
                }
                Err(error) => {
                    self.metrics.record_failure();
                    tracing::error!(error = %error, "Ingestion run aborted");
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_named(&self, document: &SourceDocument) -> Result<IngestReport, IngestError> {
        tracing::debug!(bytes = document.content.len(), "Extracting document layout");
        let text = self.extractor.analyze(&document.content).await?;
        let chunks = self.split(&text);
        tracing::debug!(chunks = chunks.len(), "Document split");

        Ok(driver::ingest(
            document,
            chunks,
            self.embedder.as_ref(),
            self.indexer.as_ref(),
            self.settings.concurrency,
        )
        .await)
    }

    /// Split extracted text into numbered chunks using the configured headings and sizes.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let sections = split_by_headers(text, &self.settings.heading_rules);
        split_sections(&sections, &self.settings.chunking)
    }

    /// Current ingestion counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClientError;
    use crate::layout::{ExtractionError, PlainTextExtractor};
    use crate::processing::types::ChunkStatus;
    use crate::search::{IndexRecord, SearchIndexError};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingClient for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            Ok(vec![text.chars().count() as f32])
        }
    }

    #[derive(Default)]
    struct RecordingIndex {
        records: Mutex<Vec<IndexRecord>>,
    }

    #[async_trait]
    impl IndexWriter for RecordingIndex {
        async fn upsert(&self, record: &IndexRecord) -> Result<(), SearchIndexError> {
            self.records.lock().await.push(record.clone());
            Ok(())
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl LayoutExtractor for FailingExtractor {
        async fn analyze(&self, _content: &[u8]) -> Result<String, ExtractionError> {
            Err(ExtractionError::AnalysisFailed("unsupported format".into()))
        }
    }

    fn pipeline(
        extractor: Arc<dyn LayoutExtractor>,
        index: Arc<RecordingIndex>,
        settings: PipelineSettings,
    ) -> IngestionPipeline {
        IngestionPipeline::new(extractor, Arc::new(LengthEmbedder), index, settings)
    }

    #[tokio::test]
    async fn markdown_document_is_split_and_indexed() {
        let index = Arc::new(RecordingIndex::default());
        let pipeline = pipeline(
            Arc::new(PlainTextExtractor),
            index.clone(),
            PipelineSettings::default(),
        );
        let document = SourceDocument::new(
            "guides/setup.md",
            "https://blob/guides/setup.md",
            b"# Install\nRun the installer.\n## Linux\nUse the package.\n".to_vec(),
        );

        let report = pipeline.run(&document).await.expect("run succeeds");

        assert_eq!(report.document.as_deref(), Some("guides/setup.md"));
        assert_eq!(report.indexed_count(), 2);
        let records = index.records.lock().await;
        let chunks: Vec<&str> = records.iter().map(|record| record.chunk.as_str()).collect();
        assert_eq!(chunks, vec!["Run the installer.", "Use the package.\n"]);
        assert!(records.iter().all(|record| record.title == "setup.md"));
        assert!(records[1].chunk_id.ends_with('1'));

        let snapshot = pipeline.metrics_snapshot();
        assert_eq!(snapshot.documents_ingested, 1);
        assert_eq!(snapshot.chunks_indexed, 2);
    }

    #[tokio::test]
    async fn extraction_failure_aborts_the_run() {
        let index = Arc::new(RecordingIndex::default());
        let pipeline = pipeline(
            Arc::new(FailingExtractor),
            index.clone(),
            PipelineSettings::default(),
        );
        let document = SourceDocument::new("a.pdf", "https://blob/a.pdf", vec![1, 2, 3]);

        let error = pipeline.run(&document).await.unwrap_err();
        assert!(matches!(error, IngestError::Extraction(_)));
        assert!(index.records.lock().await.is_empty());
        assert_eq!(pipeline.metrics_snapshot().documents_failed, 1);
    }

    #[tokio::test]
    async fn unnamed_document_is_a_counted_noop() {
        let index = Arc::new(RecordingIndex::default());
        let pipeline = pipeline(
            Arc::new(FailingExtractor),
            index.clone(),
            PipelineSettings::default(),
        );
        let document = SourceDocument {
            name: Some(String::new()),
            url: "https://blob/".into(),
            content: b"text".to_vec(),
        };

        let report = pipeline.run(&document).await.expect("skip is not an error");
        assert!(report.skipped);
        assert_eq!(pipeline.metrics_snapshot().documents_skipped, 1);
        assert!(index.records.lock().await.is_empty());
    }

    #[tokio::test]
    async fn long_sections_yield_contiguous_ordinals() {
        let index = Arc::new(RecordingIndex::default());
        let settings = PipelineSettings {
            chunking: ChunkingConfig::new(40, 5).expect("valid"),
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(Arc::new(PlainTextExtractor), index.clone(), settings);
        let body = "word ".repeat(30);
        let text = format!("# One\n{body}\n# Two\n{body}");
        let document = SourceDocument::new("long.md", "https://blob/long.md", text.into_bytes());

        let report = pipeline.run(&document).await.expect("run succeeds");
        let ordinals: Vec<usize> = report.chunks.iter().map(|outcome| outcome.ordinal).collect();
        assert!(ordinals.len() > 2);
        assert_eq!(ordinals, (0..ordinals.len()).collect::<Vec<_>>());
        assert!(
            report
                .chunks
                .iter()
                .all(|outcome| outcome.status == ChunkStatus::Indexed)
        );
    }

    #[test]
    fn settings_reject_invalid_overlap_before_any_run() {
        let mut config = Config::from_source(|key| match key {
            "AZURE_OPENAI_ENDPOINT" => Some("https://aoai.example.com".into()),
            "AZURE_OPENAI_API_VERSION" => Some("2024-06-01".into()),
            "AZURE_OPENAI_EMBEDDING_MODEL" => Some("embed".into()),
            "AZURE_OPENAI_GENERATIVE_MODEL" => Some("chat".into()),
            "AZURE_SEARCH_SERVICE_NAME" => Some("contoso".into()),
            "AZURE_SEARCH_INDEX_NAME" => Some("docs".into()),
            _ => None,
        })
        .expect("valid config");
        config.text_splitter_chunk_overlap = config.text_splitter_chunk_size;

        let error = PipelineSettings::from_config(&config).unwrap_err();
        assert!(matches!(error, ChunkingError::OverlapTooLarge { .. }));
    }
}
