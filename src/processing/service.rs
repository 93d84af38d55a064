//! Facade wiring collaborators into the ingestion and retrieval pipelines.

use super::chunking::TextSplitter;
use super::ingest::{IngestSettings, Ingestor};
use super::resilience::CallPolicy;
use super::retrieval::Retriever;
use super::types::{
    ChunkingError, Collaborators, PipelineError, UPLOAD_SUCCESS_MESSAGE, UploadedFile,
};
use crate::{
    completion::{CompletionClientError, build_completion_client},
    config::{Config, VectorStoreBackend},
    embedding::{EmbeddingClientError, build_embedding_client},
    extraction::PdfTextExtractor,
    metrics::{MetricsSnapshot, PipelineMetrics},
    qdrant::{QdrantError, QdrantService},
    registry::{CollectionRegistry, RegistryError, SqliteRegistry, render_listing},
    vector_store::{MemoryVectorStore, VectorStore},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building the service at startup.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// Embedding client could not be constructed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Completion client could not be constructed.
    #[error(transparent)]
    Completion(#[from] CompletionClientError),
    /// Qdrant client could not be constructed.
    #[error(transparent)]
    Qdrant(#[from] QdrantError),
    /// Registry could not be opened.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Chunking parameters were rejected.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
}

/// Operations exposed at the system boundary (HTTP, CLI).
///
/// Every operation returns a human-readable string, success or failure alike.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Create `collection_name` from the uploaded documents.
    async fn upload_files(&self, files: Vec<UploadedFile>, collection_name: &str) -> String;

    /// Return the stored passages closest to `query`.
    async fn search(&self, query: &str, collection_name: &str) -> String;

    /// Answer `question` from the passages stored in `collection_name`.
    async fn ask_question(&self, question: &str, collection_name: &str) -> String;

    /// Render every registered collection with its files.
    async fn list_collections(&self) -> String;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns the collaborator handles for the lifetime of the process.
///
/// Build it once at startup, share it through an `Arc`, and call [`DocumentService::shutdown`]
/// before exiting.
pub struct DocumentService {
    ingestor: Ingestor,
    retriever: Retriever,
    store: Arc<dyn VectorStore>,
    registry: Arc<dyn CollectionRegistry>,
    metrics: Arc<PipelineMetrics>,
}

impl DocumentService {
    /// Assemble the service from explicit collaborators.
    pub fn new(
        collaborators: Collaborators,
        settings: IngestSettings,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let store = collaborators.store.clone();
        let registry = collaborators.registry.clone();
        let retriever = Retriever::new(
            collaborators.clone(),
            settings.policy,
            settings.dimension,
            metrics.clone(),
        );
        let ingestor = Ingestor::new(collaborators, settings, metrics.clone());
        Self {
            ingestor,
            retriever,
            store,
            registry,
            metrics,
        }
    }

    /// Build every collaborator described by `config`.
    pub async fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        let store: Arc<dyn VectorStore> = match config.vector_store {
            VectorStoreBackend::Qdrant => Arc::new(QdrantService::new(
                &config.qdrant_url,
                config.qdrant_api_key.clone(),
            )?),
            VectorStoreBackend::Memory => {
                tracing::warn!("Using in-memory vector store; collections vanish on restart");
                Arc::new(MemoryVectorStore::new())
            }
        };
        let registry = Arc::new(SqliteRegistry::open(&config.registry_path).await?);
        tracing::info!(
            store = ?config.vector_store,
            registry = %config.registry_path.display(),
            embedding_model = %config.embedding.model,
            llm_model = %config.llm.model,
            "Collaborators initialized"
        );

        let collaborators = Collaborators {
            extractor: Arc::new(PdfTextExtractor::new()),
            embedder: build_embedding_client(&config.embedding)?,
            store,
            completion: build_completion_client(&config.llm)?,
            registry,
        };
        let settings = IngestSettings {
            splitter: TextSplitter::new(config.chunk_size, config.chunk_overlap)?,
            dimension: config.embedding.dimension,
            summary_concurrency: config.summary_concurrency,
            policy: CallPolicy::from_config(config),
        };

        let service = Self::new(collaborators, settings, Arc::new(PipelineMetrics::new()));
        match service.unindexed_collections().await {
            Ok(missing) if !missing.is_empty() => tracing::warn!(
                collections = ?missing,
                "Registered collections have no vector index; their names stay reserved"
            ),
            Ok(_) => {}
            Err(error) => tracing::warn!(error = %error, "Skipped registry consistency check"),
        }
        Ok(service)
    }

    /// Names in the registry whose collection is absent from the vector store.
    ///
    /// This happens after restarting with the in-memory store, or when a collection is dropped
    /// outside this process. Searches on these names report the collection as missing.
    pub async fn unindexed_collections(&self) -> Result<Vec<String>, PipelineError> {
        let entries = self.registry.read_all().await?;
        let indexed = self.store.list_collections().await?;
        let missing: Vec<String> = entries
            .into_iter()
            .filter(|entry| !indexed.contains(&entry.collection_name))
            .inspect(|entry| {
                tracing::debug!(
                    collection = %entry.collection_name,
                    files = entry.file_names().len(),
                    registered_at = %entry.created_at,
                    "Registered collection missing from vector store"
                );
            })
            .map(|entry| entry.collection_name)
            .collect();
        Ok(missing)
    }

    /// Release long-lived handles.
    pub async fn shutdown(&self) {
        self.registry.close().await;
        tracing::info!("Document service shut down");
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    async fn upload_files(&self, files: Vec<UploadedFile>, collection_name: &str) -> String {
        match self.ingestor.ingest(files, collection_name).await {
            Ok(_) => UPLOAD_SUCCESS_MESSAGE.to_string(),
            Err(error) => {
                tracing::warn!(collection = collection_name, error = %error, "Upload failed");
                error.to_string()
            }
        }
    }

    async fn search(&self, query: &str, collection_name: &str) -> String {
        self.retriever
            .search(query, collection_name)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(collection = collection_name, error = %error, "Search failed");
                error.to_string()
            })
    }

    async fn ask_question(&self, question: &str, collection_name: &str) -> String {
        self.retriever
            .answer(question, collection_name)
            .await
            .unwrap_or_else(|error| {
                tracing::warn!(collection = collection_name, error = %error, "Answer failed");
                error.to_string()
            })
    }

    async fn list_collections(&self) -> String {
        match self.registry.read_all().await {
            Ok(entries) => render_listing(&entries),
            Err(error) => {
                tracing::error!(error = %error, "Failed to read collection registry");
                format!("Error reading collections: {error}")
            }
        }
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
