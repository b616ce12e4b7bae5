//! Layout extraction: raw document bytes to heading-annotated Markdown.

mod document_intelligence;

pub use document_intelligence::DocumentIntelligenceExtractor;

use crate::config::Config;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while turning a document into text. All of them abort the ingestion run.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// HTTP layer failed before receiving a response.
    #[error("Layout analysis request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Service responded with an unexpected status code.
    #[error("Unexpected layout analysis response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Response body for diagnostics.
        body: String,
    },
    /// Analysis was accepted but no operation URL was returned to poll.
    #[error("Layout analysis response did not include an Operation-Location header")]
    MissingOperationLocation,
    /// Service reported that the analysis failed.
    #[error("Layout analysis failed: {0}")]
    AnalysisFailed(String),
    /// Analysis did not finish within the polling budget.
    #[error("Layout analysis did not complete after {attempts} polls")]
    Timeout {
        /// Number of status polls issued.
        attempts: u32,
    },
    /// Plain-text document was not valid UTF-8.
    #[error("Document is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),
}

/// Capability that converts raw document bytes into Markdown-like text.
#[async_trait]
pub trait LayoutExtractor: Send + Sync {
    /// Analyze the document and return its full text with `#` heading markers.
    async fn analyze(&self, content: &[u8]) -> Result<String, ExtractionError>;
}

/// Extractor for documents that already are text or Markdown.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl LayoutExtractor for PlainTextExtractor {
    async fn analyze(&self, content: &[u8]) -> Result<String, ExtractionError> {
        let text = String::from_utf8(content.to_vec())?;
        Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
    }
}

/// Build the extractor selected by configuration.
pub fn build_extractor(config: &Config) -> Result<Arc<dyn LayoutExtractor>, ExtractionError> {
    match &config.doc_intelligence_endpoint {
        Some(endpoint) => {
            tracing::info!(endpoint = %endpoint, "Using Document Intelligence layout analysis");
            Ok(Arc::new(DocumentIntelligenceExtractor::new(
                endpoint,
                config.doc_intelligence_credential(),
            )?))
        }
        None => {
            tracing::info!("No layout analysis endpoint configured; treating documents as text");
            Ok(Arc::new(PlainTextExtractor))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plain_text_passes_markdown_through() {
        let text = PlainTextExtractor
            .analyze("\u{feff}# Title\nbody".as_bytes())
            .await
            .expect("text");
        assert_eq!(text, "# Title\nbody");
    }

    #[tokio::test]
    async fn plain_text_rejects_binary() {
        let error = PlainTextExtractor
            .analyze(&[0xff, 0xfe, 0x00])
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractionError::Decode(_)));
    }
}
