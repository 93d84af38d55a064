//! Core data types and error definitions for the processing pipeline.

use crate::{
    completion::{CompletionClient, CompletionClientError},
    embedding::{EmbeddingClient, EmbeddingClientError},
    extraction::TextExtractor,
    registry::{CollectionRegistry, RegistryError},
    vector_store::{StoreError, VectorStore},
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Status returned to callers after a fully successful upload.
pub const UPLOAD_SUCCESS_MESSAGE: &str = "Files uploaded, summarized, and processed successfully.";
/// Status returned when the collection name is missing or blank.
pub const MISSING_COLLECTION_NAME: &str = "Please provide a collection name.";
/// Status returned when an upload carries no files.
pub const MISSING_FILES: &str = "Please upload at least one file.";

/// Errors produced while splitting text into chunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkingError {
    /// A chunk must hold at least one word.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap must leave room for fresh words in every chunk.
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    InvalidOverlap {
        /// Configured chunk size.
        chunk_size: usize,
        /// Configured overlap.
        overlap: usize,
    },
}

/// External collaborator a pipeline call was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Embedding provider.
    Embedding,
    /// Vector store backend.
    VectorStore,
    /// LLM completion provider.
    Llm,
    /// Collection registry.
    Registry,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Embedding => "Embedding service",
            Self::VectorStore => "Vector store",
            Self::Llm => "LLM service",
            Self::Registry => "Collection registry",
        };
        f.write_str(label)
    }
}

/// Errors emitted by the ingestion and retrieval pipelines.
///
/// The `Display` output is the status text handed back to callers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Caller supplied an unusable argument.
    #[error("{0}")]
    InvalidArgument(String),
    /// The collection name is already taken.
    #[error(
        "Error creating collection: collection `{0}` already exists. Please try a different collection name."
    )]
    CollectionExists(String),
    /// No collection with this name exists.
    #[error(
        "Error accessing collection: collection `{0}` does not exist. Make sure the collection name is correct."
    )]
    CollectionNotFound(String),
    /// A collaborator call failed.
    #[error("{service} request failed: {message}")]
    ExternalService {
        /// Collaborator that failed.
        service: ServiceKind,
        /// Failure reported by the collaborator.
        message: String,
    },
    /// A collaborator call did not finish in time.
    #[error("{service} request timed out after {}s", .after.as_secs_f32())]
    Timeout {
        /// Collaborator that timed out.
        service: ServiceKind,
        /// Timeout that expired.
        after: Duration,
    },
    /// A document could not be turned into text.
    #[error("Error reading file {file}: {message}")]
    Extraction {
        /// Name of the offending upload.
        file: String,
        /// Extraction failure.
        message: String,
    },
    /// Vector length disagrees with the collection's dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured or stored dimension.
        expected: usize,
        /// Dimension actually produced.
        actual: usize,
    },
    /// The registry could not record the collection.
    #[error("Error updating collection registry: {0}")]
    Registry(String),
}

impl PipelineError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService { .. } | Self::Timeout { .. })
    }

    pub(crate) fn missing_collection_name() -> Self {
        Self::InvalidArgument(MISSING_COLLECTION_NAME.to_string())
    }
}

impl From<StoreError> for PipelineError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::CollectionExists(name) => Self::CollectionExists(name),
            StoreError::CollectionNotFound(name) => Self::CollectionNotFound(name),
            StoreError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            StoreError::Backend(message) => Self::ExternalService {
                service: ServiceKind::VectorStore,
                message,
            },
        }
    }
}

impl From<EmbeddingClientError> for PipelineError {
    fn from(error: EmbeddingClientError) -> Self {
        Self::ExternalService {
            service: ServiceKind::Embedding,
            message: error.to_string(),
        }
    }
}

impl From<CompletionClientError> for PipelineError {
    fn from(error: CompletionClientError) -> Self {
        Self::ExternalService {
            service: ServiceKind::Llm,
            message: error.to_string(),
        }
    }
}

impl From<RegistryError> for PipelineError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::Duplicate(name) => Self::CollectionExists(name),
            RegistryError::Storage(message) => Self::Registry(message),
        }
    }
}

/// Validate a caller-supplied collection name, returning it without surrounding whitespace.
pub(crate) fn validate_collection_name(name: &str) -> Result<&str, PipelineError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::missing_collection_name());
    }
    Ok(trimmed)
}

/// A document handed to the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Original file name, recorded in summaries and the registry.
    pub name: String,
    /// Raw document bytes.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Bundle a file name with its content.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Collection that was created.
    pub collection: String,
    /// Number of documents processed.
    pub documents: usize,
    /// Number of per-chunk summaries generated.
    pub summaries: usize,
    /// Number of vector records written.
    pub records: usize,
}

/// Long-lived handles to every external collaborator.
#[derive(Clone)]
pub struct Collaborators {
    /// Document text extractor.
    pub extractor: Arc<dyn TextExtractor>,
    /// Embedding provider.
    pub embedder: Arc<dyn EmbeddingClient>,
    /// Vector store backend.
    pub store: Arc<dyn VectorStore>,
    /// LLM completion provider.
    pub completion: Arc<dyn CompletionClient>,
    /// Collection registry.
    pub registry: Arc<dyn CollectionRegistry>,
}
