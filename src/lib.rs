#![deny(missing_docs)]

//! Core library for the ragdex ingestion pipeline and grounded chat service.

/// HTTP routing and REST handlers.
pub mod api;
/// Retrieval-augmented chat.
pub mod chat;
/// Streaming chat-completion client.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Credentials attached to outbound requests.
pub mod credential;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Document layout extraction.
pub mod layout;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Search index integration.
pub mod search;
/// Service wiring shared by the binaries.
pub mod service;
