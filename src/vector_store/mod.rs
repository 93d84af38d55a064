//! Vector store boundary: one namespace per collection, upsert-by-id, and k-NN queries.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryVectorStore;

/// Errors reported by vector store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A namespace with this name already exists.
    #[error("collection `{0}` already exists")]
    CollectionExists(String),
    /// No namespace with this name exists.
    #[error("collection `{0}` does not exist")]
    CollectionNotFound(String),
    /// A vector's length does not match the collection's dimension.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the collection was created with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Transport or backend failure.
    #[error("vector store request failed: {0}")]
    Backend(String),
}

/// A stored embedding together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Identifier unique within the collection.
    pub id: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Text the vector was computed from.
    pub text: String,
}

/// A query hit, best match first.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredText {
    /// Identifier of the matched record.
    pub id: String,
    /// Similarity score reported by the backend.
    pub score: f32,
    /// Stored text of the matched record.
    pub text: String,
}

/// Interface implemented by vector store backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection; fails with [`StoreError::CollectionExists`] when the name is taken.
    ///
    /// Concurrent calls for the same name must let exactly one succeed.
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), StoreError>;

    /// Report whether a collection exists.
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Remove a collection and all of its records.
    async fn delete_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Insert or replace a record by id.
    async fn upsert(&self, collection: &str, record: VectorRecord) -> Result<(), StoreError>;

    /// Return up to `limit` records ordered by descending similarity to `vector`.
    async fn query(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredText>, StoreError>;

    /// Names of all collections held by the backend.
    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;
}
