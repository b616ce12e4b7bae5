//! Shared types used by the search index client.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while interacting with the search index.
#[derive(Debug, Error)]
pub enum SearchIndexError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid search endpoint: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Search service responded with an unexpected status code.
    #[error("Unexpected search response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Record could not be serialized into a request body.
    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Service accepted the batch but refused this document.
    #[error("Document '{key}' was rejected: {message}")]
    Rejected {
        /// Key of the rejected document.
        key: String,
        /// Error message reported by the service.
        message: String,
    },
}

/// One chunk document as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Identifier shared by all chunks of a source document.
    pub parent_id: String,
    /// Base file name of the source document.
    pub title: String,
    /// Retrieval URL of the source document.
    pub url: String,
    /// Unique index key.
    pub chunk_id: String,
    /// Chunk text.
    pub chunk: String,
    /// Embedding of the chunk text.
    pub text_vector: Vec<f32>,
}

/// Per-document status returned by the indexing endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResult {
    /// Key of the document the status belongs to.
    pub key: String,
    /// Whether the write succeeded.
    pub status: bool,
    /// Failure description, if any.
    #[serde(default)]
    pub error_message: Option<String>,
    /// HTTP-like status for this document.
    #[serde(default)]
    pub status_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndexingResponse {
    pub(crate) value: Vec<IndexingResult>,
}

/// Parameters of a hybrid (keyword + vector) query.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Full-text query.
    pub text: String,
    /// Query embedding matched against `text_vector`.
    pub vector: Vec<f32>,
    /// Nearest neighbours requested from the vector side.
    pub k_nearest: usize,
    /// Number of merged results returned.
    pub top: usize,
}

/// Retrieved chunk used to ground an answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    /// Base file name of the source document.
    #[serde(default)]
    pub title: String,
    /// Chunk text.
    #[serde(default)]
    pub chunk: String,
    /// Retrieval URL for citation.
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub(crate) value: Vec<SearchHit>,
}
