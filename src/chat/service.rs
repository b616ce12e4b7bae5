//! Retrieval-augmented answers streamed through a bounded channel.

use super::prompt::{format_sources, grounded_prompt};
use crate::{
    completion::{CompletionClient, CompletionError, CompletionStream},
    config::Config,
    embedding::{EmbeddingClient, EmbeddingClientError},
    search::{IndexReader, SearchIndexError, SearchQuery},
};
use futures_core::Stream;
use futures_util::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Message shown to users whenever a backend fails.
pub const APOLOGY: &str = "An internal server error occurred. Please contact the administrator.";

const CHANNEL_CAPACITY: usize = 32;

/// Errors raised before an answer starts streaming.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Query was missing or blank.
    #[error("Please enter a question")]
    EmptyQuery,
    /// Query embedding failed.
    #[error("Failed to embed query: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Hybrid search failed.
    #[error("Failed to search index: {0}")]
    Search(#[from] SearchIndexError),
    /// Completion request was rejected.
    #[error("Failed to start completion: {0}")]
    Completion(#[from] CompletionError),
}

/// One item of a streamed answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEvent {
    /// Next piece of answer text.
    Fragment(String),
    /// Upstream failed mid-answer; no further events follow.
    Failed(String),
}

/// Receiving end of an answer. Dropping it stops the upstream completion.
pub struct AnswerStream {
    receiver: mpsc::Receiver<AnswerEvent>,
}

impl AnswerStream {
    pub(crate) fn new(receiver: mpsc::Receiver<AnswerEvent>) -> Self {
        Self { receiver }
    }

    /// Await the next event, or `None` once the answer is complete.
    pub async fn next(&mut self) -> Option<AnswerEvent> {
        self.receiver.recv().await
    }

    /// Adapt into a [`Stream`] for response bodies.
    pub fn into_stream(self) -> impl Stream<Item = AnswerEvent> + Send {
        let mut receiver = self.receiver;
        async_stream::stream! {
            while let Some(event) = receiver.recv().await {
                yield event;
            }
        }
    }
}

/// Retrieval settings for chat.
#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    /// Number of search hits placed in the prompt.
    pub top: usize,
    /// Nearest neighbours requested from the vector query.
    pub k_nearest: usize,
}

impl ChatSettings {
    /// Derive settings from configuration values.
    pub fn from_config(config: &Config) -> Self {
        Self {
            top: config.search_top,
            k_nearest: config.search_k_nearest,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self { top: 5, k_nearest: 3 }
    }
}

/// Answers questions from indexed chunks.
pub struct ChatService {
    embedder: Arc<dyn EmbeddingClient>,
    reader: Arc<dyn IndexReader>,
    completion: Arc<dyn CompletionClient>,
    settings: ChatSettings,
}

impl ChatService {
    /// Assemble a chat service from its capabilities.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        reader: Arc<dyn IndexReader>,
        completion: Arc<dyn CompletionClient>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            embedder,
            reader,
            completion,
            settings,
        }
    }

    /// Retrieve sources for `query` and start streaming a grounded answer.
    pub async fn answer(&self, query: &str) -> Result<AnswerStream, ChatError> {
        if query.trim().is_empty() {
            return Err(ChatError::EmptyQuery);
        }

        let vector = self.embedder.embed(query).await?;
        let hits = self
            .reader
            .search(&SearchQuery {
                text: query.to_string(),
                vector,
                k_nearest: self.settings.k_nearest,
                top: self.settings.top,
            })
            .await?;
        tracing::debug!(hits = hits.len(), "Retrieved sources for chat");

        let prompt = grounded_prompt(query, &format_sources(&hits));
        let upstream = self.completion.stream_completion(prompt).await?;

        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(relay(upstream, sender));
        Ok(AnswerStream::new(receiver))
    }
}

async fn relay(mut upstream: CompletionStream, sender: mpsc::Sender<AnswerEvent>) {
    loop {
        let next = tokio::select! {
            _ = sender.closed() => {
                tracing::debug!("Chat consumer went away; stopping completion");
                return;
            }
            next = upstream.next() => next,
        };
        let Some(item) = next else {
            return;
        };
        let event = match item {
            Ok(fragment) => AnswerEvent::Fragment(fragment),
            Err(error) => {
                tracing::error!(error = %error, "Completion stream failed");
                let _ = sender.send(AnswerEvent::Failed(APOLOGY.to_string())).await;
                return;
            }
        };
        if sender.send(event).await.is_err() {
            tracing::debug!("Chat consumer went away; stopping completion");
            return;
        }
    }
}
