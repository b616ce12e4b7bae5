//! Document processing pipeline: heading split, bounded chunking, identifiers and index writes.

pub mod chunking;
pub mod driver;
pub mod headers;
pub mod identifiers;
mod service;
pub mod types;

pub use chunking::{ChunkingConfig, split_sections, split_text};
pub use headers::{HeadingRule, split_by_headers};
pub use service::{IngestionPipeline, PipelineSettings};
pub use types::{
    Chunk, ChunkOutcome, ChunkStatus, ChunkingError, FailureStage, HeaderMap, HeaderSection,
    IngestError, IngestReport, SourceDocument,
};
