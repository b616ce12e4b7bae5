//! Per-chunk embedding and upsert.
//!
//! Every chunk is attempted regardless of how its siblings fared; failures become
//! [`ChunkStatus::Failed`] entries in the report instead of errors. Retrying is left to the
//! trigger, which redelivers the whole document.

use crate::{
    embedding::EmbeddingClient,
    processing::{
        identifiers::{build_chunk_id, build_parent_id, document_title},
        types::{
            Chunk, ChunkOutcome, ChunkStatus, FailureStage, IngestReport, SourceDocument,
        },
    },
    search::{IndexRecord, IndexWriter},
};
use futures_util::{StreamExt, stream};

struct RecordContext<'a> {
    parent_id: String,
    title: &'a str,
    url: &'a str,
}

/// Embed and upsert `chunks` for `document`, reporting one outcome per chunk in ordinal order.
///
/// Up to `concurrency` chunks are in flight at once. Returns a skipped report when the document
/// has no usable name.
pub async fn ingest(
    document: &SourceDocument,
    chunks: Vec<Chunk>,
    embedder: &dyn EmbeddingClient,
    indexer: &dyn IndexWriter,
    concurrency: usize,
) -> IngestReport {
    let Some(name) = document.resolved_name() else {
        tracing::info!("Document has no name; skipped");
        return IngestReport::skipped();
    };

    let context = RecordContext {
        parent_id: build_parent_id(name),
        title: document_title(name),
        url: &document.url,
    };

    let outcomes: Vec<ChunkOutcome> = stream::iter(chunks)
        .map(|chunk| ingest_chunk(&context, chunk, embedder, indexer))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    IngestReport {
        document: Some(name.to_string()),
        parent_id: Some(context.parent_id),
        skipped: false,
        chunks: outcomes,
    }
}

async fn ingest_chunk(
    context: &RecordContext<'_>,
    chunk: Chunk,
    embedder: &dyn EmbeddingClient,
    indexer: &dyn IndexWriter,
) -> ChunkOutcome {
    let chunk_id = build_chunk_id(&context.parent_id, chunk.ordinal);

    let status = match embedder.embed(&chunk.content).await {
        Err(error) => {
            tracing::error!(
                chunk_id = %chunk_id,
                ordinal = chunk.ordinal,
                error = %error,
                "Failed to embed chunk"
            );
            ChunkStatus::Failed {
                stage: FailureStage::Embedding,
                message: error.to_string(),
            }
        }
        Ok(text_vector) => {
            let record = IndexRecord {
                parent_id: context.parent_id.clone(),
                title: context.title.to_string(),
                url: context.url.to_string(),
                chunk_id: chunk_id.clone(),
                chunk: chunk.content,
                text_vector,
            };
            match indexer.upsert(&record).await {
                Ok(()) => {
                    tracing::info!(chunk_id = %chunk_id, ordinal = chunk.ordinal, "Chunk indexed");
                    ChunkStatus::Indexed
                }
                Err(error) => {
                    tracing::error!(
                        chunk_id = %chunk_id,
                        ordinal = chunk.ordinal,
                        error = %error,
                        "Failed to index chunk"
                    );
                    ChunkStatus::Failed {
                        stage: FailureStage::Indexing,
                        message: error.to_string(),
                    }
                }
            }
        }
    };

    ChunkOutcome {
        ordinal: chunk.ordinal,
        chunk_id,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClientError;
    use crate::processing::types::HeaderMap;
    use crate::search::SearchIndexError;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashSet};
    use tokio::sync::Mutex;

    struct StubEmbedder {
        fail_on: HashSet<String>,
    }

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            if self.fail_on.contains(text) {
                return Err(EmbeddingClientError::GenerationFailed("quota exceeded".into()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[derive(Default)]
    struct MemoryIndex {
        records: Mutex<BTreeMap<String, IndexRecord>>,
        writes: Mutex<usize>,
        reject: HashSet<String>,
    }

    #[async_trait]
    impl IndexWriter for MemoryIndex {
        async fn upsert(&self, record: &IndexRecord) -> Result<(), SearchIndexError> {
            *self.writes.lock().await += 1;
            if self.reject.contains(&record.chunk) {
                return Err(SearchIndexError::Rejected {
                    key: record.chunk_id.clone(),
                    message: "field too long".into(),
                });
            }
            self.records
                .lock()
                .await
                .insert(record.chunk_id.clone(), record.clone());
            Ok(())
        }
    }

    fn chunks(contents: &[&str]) -> Vec<Chunk> {
        contents
            .iter()
            .enumerate()
            .map(|(ordinal, content)| Chunk {
                content: content.to_string(),
                headers: HeaderMap::new(),
                ordinal,
            })
            .collect()
    }

    fn embedder(fail_on: &[&str]) -> StubEmbedder {
        StubEmbedder {
            fail_on: fail_on.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn document() -> SourceDocument {
        SourceDocument::new("docs/report.pdf", "https://blob/docs/report.pdf", Vec::new())
    }

    #[tokio::test]
    async fn single_chunk_record_uses_parent_id_and_ordinal() {
        let index = MemoryIndex::default();
        let report = ingest(&document(), chunks(&["hello"]), &embedder(&[]), &index, 1).await;

        let parent = build_parent_id("docs/report.pdf");
        assert_eq!(report.parent_id.as_deref(), Some(parent.as_str()));
        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.chunks[0].chunk_id, format!("{parent}0"));

        let records = index.records.lock().await;
        let record = records.get(&format!("{parent}0")).expect("record stored");
        assert_eq!(record.title, "report.pdf");
        assert_eq!(record.url, "https://blob/docs/report.pdf");
        assert_eq!(record.chunk, "hello");
        assert_eq!(record.text_vector, vec![5.0, 1.0]);
    }

    #[tokio::test]
    async fn embedding_failure_does_not_stop_later_chunks() {
        let index = MemoryIndex::default();
        let report = ingest(
            &document(),
            chunks(&["a", "b", "bad", "c", "d"]),
            &embedder(&["bad"]),
            &index,
            1,
        )
        .await;

        assert_eq!(report.chunks.len(), 5);
        assert_eq!(report.indexed_count(), 4);
        assert_eq!(
            report.chunks[2].status,
            ChunkStatus::Failed {
                stage: FailureStage::Embedding,
                message: "Failed to generate embeddings: quota exceeded".into(),
            }
        );
        assert!(report.chunks[3].is_indexed());
        assert!(report.chunks[4].is_indexed());
        assert_eq!(*index.writes.lock().await, 4);
    }

    #[tokio::test]
    async fn indexing_failure_is_reported_with_message() {
        let index = MemoryIndex {
            reject: HashSet::from(["b".to_string()]),
            ..MemoryIndex::default()
        };
        let report = ingest(&document(), chunks(&["a", "b", "c"]), &embedder(&[]), &index, 1).await;

        assert_eq!(report.failed_count(), 1);
        match &report.chunks[1].status {
            ChunkStatus::Failed { stage, message } => {
                assert_eq!(*stage, FailureStage::Indexing);
                assert!(message.contains("field too long"));
            }
            other => panic!("unexpected status: {other:?}"),
        }
        assert!(report.chunks[2].is_indexed());
    }

    #[tokio::test]
    async fn concurrent_runs_keep_ordinal_order() {
        let index = MemoryIndex::default();
        let contents: Vec<String> = (0..20).map(|i| format!("chunk {i}")).collect();
        let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
        let report = ingest(&document(), chunks(&refs), &embedder(&[]), &index, 4).await;

        let ordinals: Vec<usize> = report.chunks.iter().map(|outcome| outcome.ordinal).collect();
        assert_eq!(ordinals, (0..20).collect::<Vec<_>>());
        assert_eq!(index.records.lock().await.len(), 20);
    }

    #[tokio::test]
    async fn reingesting_overwrites_same_keys() {
        let index = MemoryIndex::default();
        let first = ingest(&document(), chunks(&["x", "y"]), &embedder(&[]), &index, 1).await;
        let snapshot = index.records.lock().await.clone();
        let second = ingest(&document(), chunks(&["x", "y"]), &embedder(&[]), &index, 1).await;

        let first_ids: Vec<_> = first.chunks.iter().map(|o| o.chunk_id.clone()).collect();
        let second_ids: Vec<_> = second.chunks.iter().map(|o| o.chunk_id.clone()).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(*index.records.lock().await, snapshot);
        assert_eq!(index.records.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn unnamed_document_is_skipped() {
        let index = MemoryIndex::default();
        let document = SourceDocument {
            name: None,
            url: "https://blob/x".into(),
            content: Vec::new(),
        };
        let report = ingest(&document, chunks(&["a"]), &embedder(&[]), &index, 1).await;
        assert!(report.skipped);
        assert!(report.chunks.is_empty());
        assert_eq!(*index.writes.lock().await, 0);
    }
}
