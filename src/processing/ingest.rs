//! Ingestion path: extract, chunk, summarize, re-chunk, embed, store, register.

use super::chunking::TextSplitter;
use super::resilience::{CallPolicy, with_retry, with_timeout};
use super::retrieval::embed_one;
use super::summarize::{Summarizer, format_summary_record};
use super::types::{
    Collaborators, IngestReport, MISSING_FILES, PipelineError, ServiceKind, UploadedFile,
    validate_collection_name,
};
use crate::metrics::PipelineMetrics;
use crate::vector_store::VectorRecord;
use futures_util::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Tunables for one ingestion pipeline.
#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    /// Splitter used for both the raw text and the accumulated summaries.
    pub splitter: TextSplitter,
    /// Dimension every stored vector must have.
    pub dimension: usize,
    /// Maximum summarization calls in flight; results keep document order regardless.
    pub summary_concurrency: usize,
    /// Timeout and retry policy for collaborator calls.
    pub policy: CallPolicy,
}

/// Drives uploads from raw bytes to a registered, searchable collection.
pub struct Ingestor {
    collaborators: Collaborators,
    summarizer: Summarizer,
    settings: IngestSettings,
    metrics: Arc<PipelineMetrics>,
}

struct Populated {
    summaries: usize,
    records: usize,
}

impl Ingestor {
    /// Create an ingestor over shared collaborator handles.
    pub fn new(
        collaborators: Collaborators,
        settings: IngestSettings,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let summarizer = Summarizer::new(collaborators.completion.clone(), settings.policy);
        Self {
            collaborators,
            summarizer,
            settings,
            metrics,
        }
    }

    /// Ingest `files` into a new collection named `collection`.
    ///
    /// The name must be neither registered nor present in the store. If anything fails after the
    /// collection was created, it is deleted again so no partial index survives and nothing is
    /// registered.
    pub async fn ingest(
        &self,
        files: Vec<UploadedFile>,
        collection: &str,
    ) -> Result<IngestReport, PipelineError> {
        let result = self.run(files, collection).await;
        if result.is_err() {
            self.metrics.record_failed_ingestion();
        }
        result
    }

    async fn run(
        &self,
        files: Vec<UploadedFile>,
        collection: &str,
    ) -> Result<IngestReport, PipelineError> {
        let name = validate_collection_name(collection)?;
        if files.is_empty() {
            return Err(PipelineError::InvalidArgument(MISSING_FILES.to_string()));
        }

        let span = tracing::info_span!("ingest", run_id = %Uuid::new_v4(), collection = name);
        async {
            tracing::info!(
                files = files.len(),
                chunk_size = self.settings.splitter.chunk_size(),
                overlap = self.settings.splitter.overlap(),
                "Starting ingestion"
            );
            let registry = &self.collaborators.registry;
            let registered =
                with_timeout(ServiceKind::Registry, self.settings.policy.timeout, async {
                    registry.contains(name).await.map_err(PipelineError::from)
                })
                .await?;
            if registered {
                tracing::warn!("Collection name already registered");
                return Err(PipelineError::CollectionExists(name.to_string()));
            }

            let store = &self.collaborators.store;
            with_timeout(ServiceKind::VectorStore, self.settings.policy.timeout, async {
                store
                    .create_collection(name, self.settings.dimension)
                    .await
                    .map_err(PipelineError::from)
            })
            .await?;

            match self.populate(&files, name).await {
                Ok(populated) => {
                    self.metrics.record_ingestion(
                        files.len() as u64,
                        populated.summaries as u64,
                        populated.records as u64,
                    );
                    tracing::info!(
                        summaries = populated.summaries,
                        records = populated.records,
                        "Ingestion complete"
                    );
                    Ok(IngestReport {
                        collection: name.to_string(),
                        documents: files.len(),
                        summaries: populated.summaries,
                        records: populated.records,
                    })
                }
                Err(error) => {
                    tracing::error!(error = %error, "Ingestion failed; removing collection");
                    self.roll_back(name).await;
                    Err(error)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn populate(
        &self,
        files: &[UploadedFile],
        name: &str,
    ) -> Result<Populated, PipelineError> {
        let mut accumulated = String::new();
        let mut summary_count = 0;

        for file in files {
            let text = self
                .collaborators
                .extractor
                .extract_text(&file.name, &file.bytes)
                .await
                .map_err(|error| PipelineError::Extraction {
                    file: file.name.clone(),
                    message: error.to_string(),
                })?;

            let chunks: Vec<String> = self
                .settings
                .splitter
                .split(&text)
                .into_iter()
                .map(|chunk| chunk.text)
                .filter(|chunk| !chunk.trim().is_empty())
                .collect();
            if chunks.is_empty() {
                tracing::warn!(file = %file.name, "No text extracted; skipping summaries");
                continue;
            }
            tracing::debug!(file = %file.name, chunks = chunks.len(), "Summarizing document");

            let pending: Vec<_> = chunks
                .iter()
                .map(|chunk| self.summarizer.summarize(chunk))
                .collect();
            let summaries: Vec<String> = stream::iter(pending)
                .buffered(self.settings.summary_concurrency.max(1))
                .try_collect()
                .await?;

            for (idx, summary) in summaries.iter().enumerate() {
                accumulated.push_str(&format_summary_record(&file.name, idx + 1, summary));
            }
            summary_count += summaries.len();
        }

        let summary_chunks: Vec<String> = self
            .settings
            .splitter
            .split(&accumulated)
            .into_iter()
            .map(|chunk| chunk.text)
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();

        let store = &self.collaborators.store;
        let record_count = summary_chunks.len();
        for (idx, text) in summary_chunks.into_iter().enumerate() {
            let record_id = format!("summary_{idx}");
            let vector = embed_one(
                self.collaborators.embedder.as_ref(),
                &self.settings.policy,
                self.settings.dimension,
                &text,
            )
            .await?;
            let record = VectorRecord {
                id: record_id.clone(),
                vector,
                text,
            };

            with_retry(ServiceKind::VectorStore, &self.settings.policy, || {
                let record = record.clone();
                async move { store.upsert(name, record).await.map_err(PipelineError::from) }
            })
            .await?;
            tracing::debug!(record_id = %record_id, "Stored summary chunk");
        }

        let file_names: Vec<String> = files.iter().map(|file| file.name.clone()).collect();
        let registry = &self.collaborators.registry;
        with_timeout(ServiceKind::Registry, self.settings.policy.timeout, async {
            registry
                .append(name, &file_names)
                .await
                .map_err(PipelineError::from)
        })
        .await?;

        Ok(Populated {
            summaries: summary_count,
            records: record_count,
        })
    }

    async fn roll_back(&self, name: &str) {
        let store = &self.collaborators.store;
        let outcome = with_timeout(ServiceKind::VectorStore, self.settings.policy.timeout, async {
            store
                .delete_collection(name)
                .await
                .map_err(PipelineError::from)
        })
        .await;
        match outcome {
            Ok(()) => tracing::warn!(collection = name, "Removed partially ingested collection"),
            Err(error) => tracing::error!(
                collection = name,
                error = %error,
                "Failed to remove partially ingested collection"
            ),
        }
    }
}
