#![deny(missing_docs)]

//! Core library for docket: summarize PDF collections and answer questions grounded in them.

/// HTTP routing and REST handlers.
pub mod api;
/// LLM completion clients.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Document text extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Chunking, summarization, ingestion, and retrieval pipelines.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Durable collection registry.
pub mod registry;
/// Vector store abstraction and in-memory backend.
pub mod vector_store;
