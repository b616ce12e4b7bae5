//! Azure Document Intelligence `prebuilt-layout` client.
//!
//! Analysis is asynchronous on the service side: the submit call answers `202 Accepted` with an
//! `Operation-Location` header, which is polled until the status is `succeeded` or `failed`.

use super::{ExtractionError, LayoutExtractor};
use crate::credential::Credential;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

const API_VERSION: &str = "2024-11-30";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_POLLS: u32 = 600;

/// Layout extractor backed by the Document Intelligence REST API.
pub struct DocumentIntelligenceExtractor {
    http: Client,
    analyze_url: String,
    credential: Credential,
    poll_interval: Duration,
    max_polls: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct OperationError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl DocumentIntelligenceExtractor {
    /// Build an extractor against the given resource endpoint.
    pub fn new(endpoint: &str, credential: Credential) -> Result<Self, ExtractionError> {
        let http = Client::builder().user_agent("ragdex/layout").build()?;
        Ok(Self::with_client(http, endpoint, credential))
    }

    /// Build an extractor from an existing HTTP client.
    pub fn with_client(http: Client, endpoint: &str, credential: Credential) -> Self {
        let analyze_url = format!(
            "{}/documentintelligence/documentModels/prebuilt-layout:analyze?api-version={API_VERSION}&outputContentFormat=markdown",
            endpoint.trim_end_matches('/')
        );
        Self {
            http,
            analyze_url,
            credential,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    /// Override the polling cadence.
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    async fn submit(&self, content: &[u8]) -> Result<String, ExtractionError> {
        let response = self
            .credential
            .apply(self.http.post(&self.analyze_url))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(content.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::UnexpectedStatus { status, body });
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(ExtractionError::MissingOperationLocation)
    }

    async fn poll(&self, operation_url: &str) -> Result<String, ExtractionError> {
        for attempt in 1..=self.max_polls {
            let response = self
                .credential
                .apply(self.http.get(operation_url))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ExtractionError::UnexpectedStatus { status, body });
            }

            let operation: AnalyzeOperation = response.json().await?;
            match operation.status.as_str() {
                "succeeded" => {
                    tracing::debug!(attempt, "Layout analysis succeeded");
                    return Ok(operation
                        .analyze_result
                        .map(|result| result.content)
                        .unwrap_or_default());
                }
                "failed" | "canceled" => {
                    let detail = operation
                        .error
                        .map(|error| format!("{}: {}", error.code, error.message))
                        .unwrap_or_else(|| operation.status.clone());
                    return Err(ExtractionError::AnalysisFailed(detail));
                }
                other => {
                    tracing::trace!(attempt, status = other, "Layout analysis in progress");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Err(ExtractionError::Timeout {
            attempts: self.max_polls,
        })
    }
}

#[async_trait]
impl LayoutExtractor for DocumentIntelligenceExtractor {
    async fn analyze(&self, content: &[u8]) -> Result<String, ExtractionError> {
        tracing::debug!(bytes = content.len(), "Submitting document for layout analysis");
        let operation_url = self.submit(content).await?;
        self.poll(&operation_url).await
    }
}
