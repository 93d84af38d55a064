//! SQLite-backed collection registry.

use super::{CollectionRegistry, RegistryEntry, RegistryError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    files TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

/// Registry stored in a single SQLite file; the file and table are created on first open.
#[derive(Debug)]
pub struct SqliteRegistry {
    pool: Pool<Sqlite>,
    append_lock: Mutex<()>,
}

impl SqliteRegistry {
    /// Open (or create) the registry database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|error| RegistryError::Storage(error.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        tracing::debug!(path = %path.display(), "Collection registry ready");

        Ok(Self {
            pool,
            append_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl CollectionRegistry for SqliteRegistry {
    async fn append(
        &self,
        collection_name: &str,
        file_names: &[String],
    ) -> Result<(), RegistryError> {
        let _guard = self.append_lock.lock().await;
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|error| RegistryError::Storage(error.to_string()))?;

        let mut tx = self.pool.begin().await?;
        let inserted =
            sqlx::query("INSERT INTO collections (name, files, created_at) VALUES (?, ?, ?)")
                .bind(collection_name)
                .bind(file_names.join(", "))
                .bind(created_at)
                .execute(&mut *tx)
                .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(error)) if error.is_unique_violation() => {
                return Err(RegistryError::Duplicate(collection_name.to_string()));
            }
            Err(error) => return Err(error.into()),
        }
        tx.commit().await?;

        tracing::info!(
            collection = collection_name,
            files = file_names.len(),
            "Registered collection"
        );
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let rows = sqlx::query("SELECT name, files, created_at FROM collections ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<RegistryEntry, RegistryError> {
                Ok(RegistryEntry {
                    collection_name: row.try_get("name")?,
                    files: row.try_get("files")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn contains(&self, collection_name: &str) -> Result<bool, RegistryError> {
        let row = sqlx::query("SELECT 1 FROM collections WHERE name = ?")
            .bind(collection_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
