//! Streaming chat completions from Azure OpenAI.
//!
//! The service answers with `text/event-stream`; each `data:` line carries a JSON chunk whose
//! `choices[0].delta.content` holds the next text fragment, and `data: [DONE]` ends the stream.

use crate::config::Config;
use crate::credential::Credential;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised while requesting or reading a completion stream.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// HTTP layer failed before or while receiving the response.
    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with a non-success status.
    #[error("Unexpected completion response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Response body for diagnostics.
        body: String,
    },
    /// A server-sent event could not be decoded.
    #[error("Malformed completion event: {0}")]
    MalformedEvent(String),
}

/// Ordered text fragments of one completion.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

/// Capability that turns a prompt into a stream of answer fragments.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Start a streamed completion for a single user message.
    async fn stream_completion(&self, prompt: String) -> Result<CompletionStream, CompletionError>;
}

/// Azure OpenAI chat-completions client.
pub struct AzureOpenAiCompletionClient {
    http: Client,
    endpoint: String,
    credential: Credential,
}

impl AzureOpenAiCompletionClient {
    /// Build a client for the generative deployment named in configuration.
    pub fn new(config: &Config) -> Result<Self, CompletionError> {
        let http = Client::builder().user_agent("ragdex/completion").build()?;
        Ok(Self::with_client(
            http,
            &config.openai_endpoint,
            &config.generative_model,
            &config.openai_api_version,
            config.openai_credential(),
        ))
    }

    /// Build a client from explicit parts.
    pub fn with_client(
        http: Client,
        base_url: &str,
        deployment: &str,
        api_version: &str,
        credential: Credential,
    ) -> Self {
        let endpoint = format!(
            "{}/openai/deployments/{deployment}/chat/completions?api-version={api_version}",
            base_url.trim_end_matches('/')
        );
        Self {
            http,
            endpoint,
            credential,
        }
    }
}

#[async_trait]
impl CompletionClient for AzureOpenAiCompletionClient {
    async fn stream_completion(&self, prompt: String) -> Result<CompletionStream, CompletionError> {
        let body = json!({
            "messages": [{ "role": "user", "content": prompt }],
            "stream": true,
        });
        let response = self
            .credential
            .apply(self.http.post(&self.endpoint))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::UnexpectedStatus { status, body });
        }

        Ok(Box::pin(completion_fragments(response.bytes_stream())))
    }
}

/// Reassemble lines from a byte stream and yield the text fragments they carry.
fn completion_fragments<S, B>(bytes: S) -> impl Stream<Item = Result<String, CompletionError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        let mut finished = false;

        'read: while let Some(chunk) = bytes.next().await {
            buffer.extend_from_slice(chunk?.as_ref());
            while let Some(end) = buffer.iter().position(|byte| *byte == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                match parse_sse_line(&decode_line(line)?)? {
                    SseLine::Fragment(text) => {
                        yield text;
                    }
                    SseLine::Done => {
                        finished = true;
                        break 'read;
                    }
                    SseLine::Ignore => {}
                }
            }
        }

        if !finished && !buffer.is_empty() {
            if let SseLine::Fragment(text) = parse_sse_line(&decode_line(buffer)?)? {
                yield text;
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseLine {
    Fragment(String),
    Done,
    Ignore,
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

fn decode_line(line: Vec<u8>) -> Result<String, CompletionError> {
    String::from_utf8(line).map_err(|err| CompletionError::MalformedEvent(err.to_string()))
}

/// Classify one line of a completion event stream.
pub(crate) fn parse_sse_line(line: &str) -> Result<SseLine, CompletionError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Ignore);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if data.is_empty() {
        return Ok(SseLine::Ignore);
    }

    let chunk: CompletionChunk = serde_json::from_str(data)
        .map_err(|err| CompletionError::MalformedEvent(err.to_string()))?;
    // Content-filter preambles arrive with an empty `choices` array.
    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty());

    Ok(content.map_or(SseLine::Ignore, SseLine::Fragment))
}
