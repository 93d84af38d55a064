//! Process-local vector store.
//!
//! Keeps every collection in memory and answers queries by brute-force cosine similarity.
//! Handy for tests and single-process demos; nothing survives a restart.

use super::{ScoredText, StoreError, VectorRecord, VectorStore};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug)]
struct MemoryCollection {
    dimension: usize,
    records: Vec<VectorRecord>,
}

/// In-memory [`VectorStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held by `collection`, if it exists.
    pub async fn record_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|entry| entry.records.len())
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }
        collections.insert(
            name.to_string(),
            MemoryCollection {
                dimension,
                records: Vec::new(),
            },
        );
        tracing::debug!(collection = name, dimension, "Created in-memory collection");
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    async fn upsert(&self, collection: &str, record: VectorRecord) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        if record.vector.len() != entry.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: entry.dimension,
                actual: record.vector.len(),
            });
        }

        match entry.records.iter_mut().find(|stored| stored.id == record.id) {
            Some(stored) => *stored = record,
            None => entry.records.push(record),
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredText>, StoreError> {
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        if vector.len() != entry.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: entry.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<ScoredText> = entry
            .records
            .iter()
            .map(|record| ScoredText {
                id: record.id.clone(),
                score: Self::cosine_similarity(&vector, &record.vector),
                text: record.text.clone(),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
