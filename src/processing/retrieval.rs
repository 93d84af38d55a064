//! Query path: embed the question, look up nearest summaries, optionally ask the LLM.

use super::resilience::{CallPolicy, with_retry, with_timeout};
use super::types::{Collaborators, PipelineError, ServiceKind, validate_collection_name};
use crate::completion::CompletionRequest;
use crate::embedding::EmbeddingClient;
use crate::metrics::PipelineMetrics;
use std::sync::Arc;

/// Number of passages returned by a search.
pub const SEARCH_RESULT_COUNT: usize = 2;

/// System role used for grounded answers.
pub const ANSWER_SYSTEM_ROLE: &str = "You are a paralegal AI assistant. Your role is to assist with legal inquiries by providing clear and concise answers based on the provided question and legal context. Always maintain a highly professional tone, ensuring that your responses are well-reasoned and legally accurate.";

/// Build the user message carrying the question and the retrieved context.
pub fn build_answer_prompt(question: &str, context: &str) -> String {
    format!(
        "Question: {question}\nLegal Context: {context}\nPlease provide a detailed response considering the above information. \
         Also, when answering the question, make sure to inform the user which filename you are using \
         (the filename is often given in the context)."
    )
}

/// Embed a single text with retry, checking the vector length against `dimension`.
pub(crate) async fn embed_one(
    embedder: &dyn EmbeddingClient,
    policy: &CallPolicy,
    dimension: usize,
    text: &str,
) -> Result<Vec<f32>, PipelineError> {
    let mut vectors = with_retry(ServiceKind::Embedding, policy, || async move {
        embedder
            .generate_embeddings(vec![text.to_string()])
            .await
            .map_err(PipelineError::from)
    })
    .await?;

    let vector = vectors.pop().ok_or_else(|| PipelineError::ExternalService {
        service: ServiceKind::Embedding,
        message: "provider returned no vectors".to_string(),
    })?;
    if vector.len() != dimension {
        return Err(PipelineError::DimensionMismatch {
            expected: dimension,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

/// Drives `search` and `answer` requests.
pub struct Retriever {
    collaborators: Collaborators,
    policy: CallPolicy,
    dimension: usize,
    metrics: Arc<PipelineMetrics>,
}

impl Retriever {
    /// Create a retriever over shared collaborator handles.
    pub fn new(
        collaborators: Collaborators,
        policy: CallPolicy,
        dimension: usize,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            collaborators,
            policy,
            dimension,
            metrics,
        }
    }

    /// Return up to [`SEARCH_RESULT_COUNT`] stored passages most similar to `query`, joined with
    /// blank lines, best match first.
    pub async fn search(&self, query: &str, collection: &str) -> Result<String, PipelineError> {
        let name = validate_collection_name(collection)?;
        let store = &self.collaborators.store;

        let exists = with_retry(ServiceKind::VectorStore, &self.policy, || async move {
            store
                .collection_exists(name)
                .await
                .map_err(PipelineError::from)
        })
        .await?;
        if !exists {
            return Err(PipelineError::CollectionNotFound(name.to_string()));
        }

        let vector = embed_one(
            self.collaborators.embedder.as_ref(),
            &self.policy,
            self.dimension,
            query,
        )
        .await?;

        let hits = with_retry(ServiceKind::VectorStore, &self.policy, || {
            let vector = vector.clone();
            async move {
                store
                    .query(name, vector, SEARCH_RESULT_COUNT)
                    .await
                    .map_err(PipelineError::from)
            }
        })
        .await?;

        tracing::info!(
            collection = name,
            hits = hits.len(),
            record_ids = ?hits.iter().map(|hit| hit.id.as_str()).collect::<Vec<_>>(),
            "Search served"
        );
        self.metrics.record_search();
        Ok(hits
            .into_iter()
            .map(|hit| hit.text)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Answer `question` grounded in the passages returned by [`Retriever::search`].
    ///
    /// A failed search is returned as-is; the LLM is not called in that case.
    pub async fn answer(&self, question: &str, collection: &str) -> Result<String, PipelineError> {
        let context = self.search(question, collection).await?;
        let request = CompletionRequest::with_system(
            ANSWER_SYSTEM_ROLE,
            build_answer_prompt(question, &context),
        );

        let completion = &self.collaborators.completion;
        let answer = with_timeout(ServiceKind::Llm, self.policy.timeout, async {
            completion
                .complete(request)
                .await
                .map_err(PipelineError::from)
        })
        .await?;

        tracing::info!(
            collection = collection.trim(),
            context_chars = context.len(),
            answer_chars = answer.len(),
            "Answer generated"
        );
        self.metrics.record_answer();
        Ok(answer)
    }
}
