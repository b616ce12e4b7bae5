//! HTTP client wrapper for Azure AI Search.

use crate::config::Config;
use crate::credential::Credential;
use crate::search::{
    schema::index_definition,
    types::{
        IndexRecord, IndexingResponse, IndexingResult, SearchHit, SearchIndexError, SearchQuery,
        SearchResponse,
    },
};
use reqwest::{Client, Method};
use serde_json::{Value, json};

/// Lightweight HTTP client for one search index.
pub struct AzureSearchService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) index_name: String,
    pub(crate) api_version: String,
    pub(crate) credential: Credential,
}

impl AzureSearchService {
    /// Construct a new client using configuration values.
    pub fn new(config: &Config) -> Result<Self, SearchIndexError> {
        let client = Client::builder().user_agent("ragdex/search").build()?;
        let base_url =
            normalize_base_url(&config.search_endpoint).map_err(SearchIndexError::InvalidUrl)?;
        let credential = config.search_credential();
        tracing::debug!(
            url = %base_url,
            index = %config.search_index_name,
            credential = credential.kind(),
            "Initialized search HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            index_name: config.search_index_name.clone(),
            api_version: config.search_api_version.clone(),
            credential,
        })
    }

    /// Name of the index this client writes to.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Create or update the index definition.
    pub async fn create_or_update_index(
        &self,
        dimension: usize,
        analyzer: Option<&str>,
    ) -> Result<(), SearchIndexError> {
        let body = index_definition(&self.index_name, dimension, analyzer);
        let response = self
            .request(Method::PUT, &format!("indexes/{}", self.index_name))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response).await?;
        tracing::info!(index = %self.index_name, dimension, "Index created or updated");
        Ok(())
    }

    /// Create-or-replace a batch of records, returning the per-key results.
    pub async fn upload_records(
        &self,
        records: &[IndexRecord],
    ) -> Result<Vec<IndexingResult>, SearchIndexError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let documents = records
            .iter()
            .map(|record| {
                let mut document = serde_json::to_value(record)?;
                if let Some(object) = document.as_object_mut() {
                    object.insert("@search.action".into(), json!("upload"));
                }
                Ok(document)
            })
            .collect::<Result<Vec<Value>, serde_json::Error>>()?;

        let response = self
            .request(
                Method::POST,
                &format!("indexes/{}/docs/index", self.index_name),
            )
            .json(&json!({ "value": documents }))
            .send()
            .await?;

        // 207 carries per-document failures in the same body shape as 200.
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::UnexpectedStatus { status, body });
        }

        let IndexingResponse { value } = response.json().await?;
        Ok(value)
    }

    /// Run a hybrid keyword + vector query returning `title`, `chunk` and `url`.
    pub async fn hybrid_search(
        &self,
        query: &SearchQuery,
    ) -> Result<Vec<SearchHit>, SearchIndexError> {
        let body = json!({
            "search": query.text,
            "vectorQueries": [{
                "kind": "vector",
                "vector": query.vector,
                "fields": "text_vector",
                "k": query.k_nearest,
            }],
            "select": "title,chunk,url",
            "top": query.top,
        });

        let response = self
            .request(
                Method::POST,
                &format!("indexes/{}/docs/search", self.index_name),
            )
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = SearchIndexError::UnexpectedStatus { status, body };
            tracing::error!(index = %self.index_name, error = %error, "Search request failed");
            return Err(error);
        }

        let SearchResponse { value } = response.json().await?;
        Ok(value)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let request = self
            .client
            .request(method, url)
            .query(&[("api-version", self.api_version.as_str())]);
        self.credential.apply(request)
    }

    async fn ensure_success(&self, response: reqwest::Response) -> Result<(), SearchIndexError> {
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = SearchIndexError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Search request failed");
            Err(error)
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
