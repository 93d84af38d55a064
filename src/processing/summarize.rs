//! Per-chunk summarization through the completion collaborator.

use super::resilience::{CallPolicy, with_timeout};
use super::types::{PipelineError, ServiceKind};
use crate::completion::{CompletionClient, CompletionRequest};
use std::sync::Arc;

/// Build the summarization prompt for one chunk of document text.
pub fn build_summary_prompt(text: &str) -> String {
    format!(
        "You are an expert in legal language and document summarization. Your task is to provide a \
         concise and accurate summary of the given document. Keep the summary concise, ideally in \
         2000 words, while covering all essential points. Here is the document to summarize:\n\n{text}"
    )
}

/// Format one summary the way it is accumulated before re-chunking.
pub fn format_summary_record(file_name: &str, part: usize, summary: &str) -> String {
    format!("Summary of {file_name} (Part {part}):\n{summary}\n\n")
}

/// Asks the LLM for a summary of a single chunk.
#[derive(Clone)]
pub struct Summarizer {
    completion: Arc<dyn CompletionClient>,
    policy: CallPolicy,
}

impl Summarizer {
    /// Create a summarizer over the given completion client.
    pub fn new(completion: Arc<dyn CompletionClient>, policy: CallPolicy) -> Self {
        Self { completion, policy }
    }

    /// Summarize `chunk`. Completions are not retried.
    pub async fn summarize(&self, chunk: &str) -> Result<String, PipelineError> {
        let request = CompletionRequest::user(build_summary_prompt(chunk));
        let summary = with_timeout(ServiceKind::Llm, self.policy.timeout, async {
            self.completion
                .complete(request)
                .await
                .map_err(PipelineError::from)
        })
        .await?;
        tracing::debug!(
            chunk_chars = chunk.len(),
            summary_chars = summary.len(),
            "Chunk summarized"
        );
        Ok(summary)
    }
}
