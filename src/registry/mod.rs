//! Durable record of which files were ingested into which collection.
//!
//! The registry is add-only: an entry is written once, after an ingestion fully succeeds, and is
//! never updated or removed afterwards.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

pub use sqlite::SqliteRegistry;

/// Message returned by [`render_listing`] when nothing has been ingested yet.
pub const EMPTY_LISTING: &str = "No collections found.";

/// Errors raised by registry backends.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An entry for this collection name already exists.
    #[error("collection `{0}` is already registered")]
    Duplicate(String),
    /// Underlying storage failed.
    #[error("registry storage failed: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for RegistryError {
    fn from(error: sqlx::Error) -> Self {
        RegistryError::Storage(error.to_string())
    }
}

/// One registered collection and the files ingested into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// Unique collection name.
    pub collection_name: String,
    /// File names joined with `", "`.
    pub files: String,
    /// RFC 3339 timestamp of the append.
    pub created_at: String,
}

impl RegistryEntry {
    /// Individual file names in upload order.
    pub fn file_names(&self) -> Vec<&str> {
        if self.files.is_empty() {
            return Vec::new();
        }
        self.files.split(", ").collect()
    }
}

/// Interface implemented by registry backends.
#[async_trait]
pub trait CollectionRegistry: Send + Sync {
    /// Record a freshly ingested collection. Appends are serialized by the backend.
    async fn append(&self, collection_name: &str, file_names: &[String])
    -> Result<(), RegistryError>;

    /// Every entry, oldest first. An empty vector means nothing was ingested yet.
    async fn read_all(&self) -> Result<Vec<RegistryEntry>, RegistryError>;

    /// Whether `collection_name` already has an entry.
    async fn contains(&self, collection_name: &str) -> Result<bool, RegistryError> {
        Ok(self
            .read_all()
            .await?
            .iter()
            .any(|entry| entry.collection_name == collection_name))
    }

    /// Release backend resources. Further calls may fail.
    async fn close(&self);
}

/// Render entries as human-readable `Collection:`/`Files:` blocks.
pub fn render_listing(entries: &[RegistryEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_LISTING.to_string();
    }
    entries
        .iter()
        .map(|entry| {
            format!(
                "Collection: {}\nFiles: {}\n\n",
                entry.collection_name, entry.files
            )
        })
        .collect()
}
