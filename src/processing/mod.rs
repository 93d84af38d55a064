//! Document pipeline: chunking, summarization, ingestion, and retrieval orchestration.

pub mod chunking;
pub mod ingest;
pub mod resilience;
pub mod retrieval;
mod service;
pub mod summarize;
pub mod types;

pub use chunking::{Chunk, TextSplitter};
pub use ingest::{IngestSettings, Ingestor};
pub use resilience::{CallPolicy, RetryPolicy};
pub use retrieval::{Retriever, SEARCH_RESULT_COUNT};
pub use service::{DocumentApi, DocumentService, ServiceInitError};
pub use summarize::Summarizer;
pub use types::{
    ChunkingError, Collaborators, IngestReport, PipelineError, ServiceKind, UploadedFile,
};
