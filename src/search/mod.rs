//! Search index integration: record upserts, hybrid queries and index schema.

pub mod client;
pub mod schema;
pub mod types;

pub use client::AzureSearchService;
pub use types::{IndexRecord, IndexingResult, SearchHit, SearchIndexError, SearchQuery};

use async_trait::async_trait;

/// Write side of the index used by ingestion.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    /// Create or replace one record keyed by its `chunk_id`.
    async fn upsert(&self, record: &IndexRecord) -> Result<(), SearchIndexError>;
}

/// Read side of the index used by chat.
#[async_trait]
pub trait IndexReader: Send + Sync {
    /// Return the chunks most relevant to the query.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchIndexError>;
}

#[async_trait]
impl IndexWriter for AzureSearchService {
    async fn upsert(&self, record: &IndexRecord) -> Result<(), SearchIndexError> {
        let results = self.upload_records(std::slice::from_ref(record)).await?;
        match results
            .into_iter()
            .find(|result| result.key == record.chunk_id)
        {
            Some(result) if result.status => Ok(()),
            Some(result) => Err(SearchIndexError::Rejected {
                key: result.key,
                message: result
                    .error_message
                    .unwrap_or_else(|| format!("status code {:?}", result.status_code)),
            }),
            None => Err(SearchIndexError::Rejected {
                key: record.chunk_id.clone(),
                message: "no result returned for document".into(),
            }),
        }
    }
}

#[async_trait]
impl IndexReader for AzureSearchService {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, SearchIndexError> {
        self.hybrid_search(query).await
    }
}
