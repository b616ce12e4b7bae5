//! Core data types and error definitions for the ingestion pipeline.

use crate::layout::ExtractionError;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Heading metadata attached to a section: level label (e.g. `Header 1`) to heading text.
pub type HeaderMap = BTreeMap<String, String>;

/// Errors produced while configuring the chunk splitter.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible size budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for new content in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Configured maximum chunk size.
        chunk_size: usize,
        /// Configured overlap.
        overlap: usize,
    },
}

/// Fatal errors that abort an ingestion run. The caller is expected to redeliver the document.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Layout analysis could not produce text for the document.
    #[error("Failed to extract document layout: {0}")]
    Extraction(#[from] ExtractionError),
}

/// A raw document delivered by the trigger source.
#[derive(Debug, Clone, Default)]
pub struct SourceDocument {
    /// Storage path of the blob, e.g. `docs/manual.pdf`. `None` when the trigger could not name it.
    pub name: Option<String>,
    /// Retrieval URL stored with every chunk for citation.
    pub url: String,
    /// Raw file bytes.
    pub content: Vec<u8>,
}

impl SourceDocument {
    /// Build a document from its trigger payload.
    pub fn new(name: impl Into<String>, url: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: Some(name.into()),
            url: url.into(),
            content,
        }
    }

    /// Name usable for identifiers, or `None` when it is absent or blank.
    pub fn resolved_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.trim().is_empty())
    }
}

/// Contiguous span of document text under one heading context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSection {
    /// Section body without the heading line itself.
    pub content: String,
    /// Headings active at this point of the document.
    pub headers: HeaderMap,
}

/// Size-bounded slice of a document, the unit of embedding and indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk text.
    pub content: String,
    /// Headings inherited from the originating section.
    pub headers: HeaderMap,
    /// Zero-based position in the document's chunk sequence.
    pub ordinal: usize,
}

/// Pipeline step at which a chunk failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Embedder returned an error or an unusable vector.
    Embedding,
    /// Indexer rejected the record or was unreachable.
    Indexing,
}

/// Result of processing a single chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Record was upserted.
    Indexed,
    /// Record was not written.
    Failed {
        /// Step that failed.
        stage: FailureStage,
        /// Error detail reported by the failing capability.
        message: String,
    },
}

/// Outcome of one chunk within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkOutcome {
    /// Chunk position within the document.
    pub ordinal: usize,
    /// Index key of the chunk record.
    pub chunk_id: String,
    /// Success or failure detail.
    #[serde(flatten)]
    pub status: ChunkStatus,
}

impl ChunkOutcome {
    /// Whether the chunk reached the index.
    pub fn is_indexed(&self) -> bool {
        matches!(self.status, ChunkStatus::Indexed)
    }
}

/// Report describing one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// Blob name of the ingested document.
    pub document: Option<String>,
    /// Parent identifier shared by every chunk record.
    pub parent_id: Option<String>,
    /// `true` when the run was a no-op because the document had no name.
    pub skipped: bool,
    /// Per-chunk outcomes in ordinal order.
    pub chunks: Vec<ChunkOutcome>,
}

impl IngestReport {
    /// Report for a run that did no work.
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    /// Number of chunks written to the index.
    pub fn indexed_count(&self) -> usize {
        self.chunks.iter().filter(|outcome| outcome.is_indexed()).count()
    }

    /// Number of chunks that failed to embed or index.
    pub fn failed_count(&self) -> usize {
        self.chunks.len() - self.indexed_count()
    }
}
