use std::env;
use std::sync::OnceLock;
use thiserror::Error;

use crate::credential::Credential;

const DEFAULT_SEARCH_API_VERSION: &str = "2024-07-01";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_CHUNK_SIZE: usize = 2000;
const DEFAULT_CHUNK_OVERLAP: usize = 100;
const DEFAULT_HEADER_DEPTH: usize = 3;
const MAX_HEADER_DEPTH: usize = 6;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the ragdex service and CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Azure OpenAI resource endpoint.
    pub openai_endpoint: String,
    /// REST api-version used for embeddings and chat completions.
    pub openai_api_version: String,
    /// Deployment name of the embedding model.
    pub embedding_model: String,
    /// Deployment name of the generative chat model.
    pub generative_model: String,
    /// Optional `api-key` for Azure OpenAI.
    pub openai_api_key: Option<String>,
    /// Resolved Azure AI Search endpoint.
    pub search_endpoint: String,
    /// Name of the index holding document chunks.
    pub search_index_name: String,
    /// Optional `api-key` for Azure AI Search.
    pub search_api_key: Option<String>,
    /// REST api-version for Azure AI Search.
    pub search_api_version: String,
    /// Optional Document Intelligence endpoint. Plain-text extraction is used when absent.
    pub doc_intelligence_endpoint: Option<String>,
    /// Optional subscription key for Document Intelligence.
    pub doc_intelligence_api_key: Option<String>,
    /// Optional bearer token used by services without an API key.
    pub access_token: Option<String>,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Maximum chunk size in characters.
    pub text_splitter_chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub text_splitter_chunk_overlap: usize,
    /// Number of Markdown heading levels used for section splitting.
    pub text_splitter_header_depth: usize,
    /// Number of chunks embedded and upserted concurrently within one run.
    pub ingest_concurrency: usize,
    /// Number of hybrid search hits fed into the chat prompt.
    pub search_top: usize,
    /// k-nearest-neighbours requested from the vector query.
    pub search_k_nearest: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source { lookup };

        let search_endpoint = match source.optional("AZURE_SEARCH_ENDPOINT") {
            Some(endpoint) => endpoint,
            None => {
                let service = source.required("AZURE_SEARCH_SERVICE_NAME")?;
                format!("https://{service}.search.windows.net")
            }
        };

        let config = Self {
            openai_endpoint: source.required("AZURE_OPENAI_ENDPOINT")?,
            openai_api_version: source.required("AZURE_OPENAI_API_VERSION")?,
            embedding_model: source.required("AZURE_OPENAI_EMBEDDING_MODEL")?,
            generative_model: source.required("AZURE_OPENAI_GENERATIVE_MODEL")?,
            openai_api_key: source.optional("AZURE_OPENAI_API_KEY"),
            search_endpoint,
            search_index_name: source.required("AZURE_SEARCH_INDEX_NAME")?,
            search_api_key: source.optional("AZURE_SEARCH_API_KEY"),
            search_api_version: source
                .optional("AZURE_SEARCH_API_VERSION")
                .unwrap_or_else(|| DEFAULT_SEARCH_API_VERSION.to_string()),
            doc_intelligence_endpoint: source.optional("AZURE_DOC_INTELLIGENCE_ENDPOINT"),
            doc_intelligence_api_key: source.optional("AZURE_DOC_INTELLIGENCE_API_KEY"),
            access_token: source.optional("AZURE_ACCESS_TOKEN"),
            embedding_dimension: source
                .parsed("EMBEDDING_DIMENSION")?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            text_splitter_chunk_size: source
                .parsed("TEXT_SPLITTER_CHUNK_SIZE")?
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            text_splitter_chunk_overlap: source
                .parsed("TEXT_SPLITTER_CHUNK_OVERLAP")?
                .unwrap_or(DEFAULT_CHUNK_OVERLAP),
            text_splitter_header_depth: source
                .parsed("TEXT_SPLITTER_HEADER_DEPTH")?
                .unwrap_or(DEFAULT_HEADER_DEPTH),
            ingest_concurrency: source.parsed("INGEST_CONCURRENCY")?.unwrap_or(1),
            search_top: source.parsed("SEARCH_TOP")?.unwrap_or(5),
            search_k_nearest: source.parsed("SEARCH_K_NEAREST")?.unwrap_or(3),
            server_port: source.parsed("SERVER_PORT")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        if self.text_splitter_chunk_overlap >= self.text_splitter_chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".into(),
            ));
        }
        if !(1..=MAX_HEADER_DEPTH).contains(&self.text_splitter_header_depth) {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_HEADER_DEPTH".into(),
            ));
        }
        if self.ingest_concurrency == 0 {
            return Err(ConfigError::InvalidValue("INGEST_CONCURRENCY".into()));
        }
        if self.search_top == 0 {
            return Err(ConfigError::InvalidValue("SEARCH_TOP".into()));
        }
        if self.search_k_nearest == 0 {
            return Err(ConfigError::InvalidValue("SEARCH_K_NEAREST".into()));
        }
        Ok(())
    }

    /// Credential used for Azure OpenAI requests.
    pub fn openai_credential(&self) -> Credential {
        Credential::resolve(
            "api-key",
            self.openai_api_key.as_deref(),
            self.access_token.as_deref(),
        )
    }

    /// Credential used for Azure AI Search requests.
    pub fn search_credential(&self) -> Credential {
        Credential::resolve(
            "api-key",
            self.search_api_key.as_deref(),
            self.access_token.as_deref(),
        )
    }

    /// Credential used for Document Intelligence requests.
    pub fn doc_intelligence_credential(&self) -> Credential {
        Credential::resolve(
            "Ocp-Apim-Subscription-Key",
            self.doc_intelligence_api_key.as_deref(),
            self.access_token.as_deref(),
        )
    }
}

struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.optional(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string()))
            })
            .transpose()
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        search_endpoint = %config.search_endpoint,
        index = %config.search_index_name,
        layout_analysis = config.doc_intelligence_endpoint.is_some(),
        chunk_size = config.text_splitter_chunk_size,
        overlap = config.text_splitter_chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
