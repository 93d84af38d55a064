//! Plain-text extraction from uploaded documents.
//!
//! PDF parsing is CPU bound, so the PDF extractor hands the bytes to Tokio's blocking pool
//! instead of stalling the request executor.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while turning document bytes into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document could not be parsed.
    #[error("unreadable document: {0}")]
    Unreadable(String),
    /// The blocking extraction task was cancelled or panicked.
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Interface implemented by document text extractors.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Convert the raw document bytes into plain text.
    async fn extract_text(&self, file_name: &str, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Extracts text from PDF documents using `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    /// Construct a new PDF extractor.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, file_name: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        tracing::debug!(file = file_name, bytes = bytes.len(), "Extracting PDF text");
        let owned = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&owned))
            .await
            .map_err(|error| ExtractionError::Task(error.to_string()))?
            .map_err(|error| ExtractionError::Unreadable(error.to_string()))?;

        let text = normalize_page_breaks(&text);
        if text.trim().is_empty() {
            tracing::warn!(file = file_name, "PDF contained no extractable text");
        }
        Ok(text)
    }
}

/// Replace form feeds between pages with blank lines so page ends read as paragraph breaks.
fn normalize_page_breaks(text: &str) -> String {
    text.replace('\x0C', "\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_bytes_that_are_not_a_pdf() {
        let error = PdfTextExtractor::new()
            .extract_text("notes.pdf", b"plain text, not a pdf")
            .await
            .expect_err("garbage input must fail");
        assert!(matches!(
            error,
            ExtractionError::Unreadable(_) | ExtractionError::Task(_)
        ));
    }

    #[test]
    fn page_breaks_become_paragraph_breaks() {
        assert_eq!(normalize_page_breaks("one\x0Ctwo"), "one\n\ntwo");
    }
}
