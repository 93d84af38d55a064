//! HTTP client wrapper for interacting with Qdrant.

use crate::qdrant::{
    payload::{build_payload, compute_chunk_hash, current_timestamp_rfc3339, point_id_for},
    types::{ListCollectionsResponse, QdrantError, QueryResponse, QueryResponseResult},
};
use crate::vector_store::{ScoredText, StoreError, VectorRecord, VectorStore};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};

/// Lightweight HTTP client for Qdrant operations.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl QdrantService {
    /// Construct a new client for the Qdrant instance at `url`.
    pub fn new(url: &str, api_key: Option<String>) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("docket/0.1").build()?;

        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Build a request whose path is `segments` appended to the base URL, each percent-encoded
    /// as one segment.
    fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<reqwest::RequestBuilder, QdrantError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|err| QdrantError::InvalidUrl(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| QdrantError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);

        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    fn collection_request(
        &self,
        method: Method,
        name: &str,
        rest: &[&str],
    ) -> Result<reqwest::RequestBuilder, QdrantError> {
        // Dot segments are dropped by URL normalization and would address the parent path.
        if matches!(name, "" | "." | "..") {
            return Err(QdrantError::InvalidCollectionName(name.to_string()));
        }
        let mut segments = vec!["collections", name];
        segments.extend_from_slice(rest);
        self.request(method, &segments)
    }

    async fn unexpected(response: reqwest::Response) -> QdrantError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        QdrantError::UnexpectedStatus { status, body }
    }
}

#[async_trait]
impl VectorStore for QdrantService {
    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), StoreError> {
        let body = json!({
            "vectors": {
                "size": dimension,
                "distance": "Cosine"
            }
        });

        let response = self
            .collection_request(Method::PUT, name, &[])?
            .json(&body)
            .send()
            .await
            .map_err(QdrantError::from)?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(collection = name, dimension, "Collection created");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT
            || (status == StatusCode::BAD_REQUEST && body.contains("already exists"))
        {
            return Err(StoreError::CollectionExists(name.to_string()));
        }

        let error = QdrantError::UnexpectedStatus { status, body };
        tracing::error!(collection = name, error = %error, "Collection creation failed");
        Err(error.into())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let response = self
            .collection_request(Method::GET, name, &[])?
            .send()
            .await
            .map_err(QdrantError::from)?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => {
                let error = Self::unexpected(response).await;
                tracing::error!(
                    collection = name,
                    error = %error,
                    "Collection existence check failed"
                );
                Err(error.into())
            }
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let response = self
            .collection_request(Method::DELETE, name, &[])?
            .send()
            .await
            .map_err(QdrantError::from)?;

        match response.status() {
            status if status.is_success() => {
                tracing::debug!(collection = name, "Collection deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StoreError::CollectionNotFound(name.to_string())),
            _ => {
                let error = Self::unexpected(response).await;
                tracing::error!(collection = name, error = %error, "Collection deletion failed");
                Err(error.into())
            }
        }
    }

    async fn upsert(&self, collection: &str, record: VectorRecord) -> Result<(), StoreError> {
        let VectorRecord { id, vector, text } = record;
        let payload = build_payload(
            &id,
            &text,
            &current_timestamp_rfc3339(),
            &compute_chunk_hash(&text),
        );
        let body = json!({
            "points": [{
                "id": point_id_for(&id),
                "vector": vector,
                "payload": payload,
            }]
        });

        let response = self
            .collection_request(Method::PUT, collection, &["points"])?
            .query(&[("wait", true)])
            .json(&body)
            .send()
            .await
            .map_err(QdrantError::from)?;

        match response.status() {
            status if status.is_success() => {
                tracing::debug!(collection, record_id = %id, "Point upserted");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StoreError::CollectionNotFound(collection.to_string())),
            _ => {
                let error = Self::unexpected(response).await;
                tracing::error!(
                    collection,
                    record_id = %id,
                    error = %error,
                    "Qdrant upsert failed"
                );
                Err(error.into())
            }
        }
    }

    async fn query(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredText>, StoreError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .collection_request(Method::POST, collection, &["points", "query"])?
            .json(&body)
            .send()
            .await
            .map_err(QdrantError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::CollectionNotFound(collection.to_string()));
        }
        if !response.status().is_success() {
            let error = Self::unexpected(response).await;
            tracing::error!(collection, error = %error, "Qdrant search failed");
            return Err(error.into());
        }

        let payload: QueryResponse = response.json().await.map_err(QdrantError::from)?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        Ok(points
            .into_iter()
            .map(|point| {
                let mut payload = point.payload.unwrap_or_default();
                let text = match payload.remove("text") {
                    Some(Value::String(text)) => text,
                    _ => String::new(),
                };
                let id = match payload.remove("record_id") {
                    Some(Value::String(id)) => id,
                    _ => String::new(),
                };
                ScoredText {
                    id,
                    score: point.score,
                    text,
                }
            })
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        let response = self
            .request(Method::GET, &["collections"])?
            .send()
            .await
            .map_err(QdrantError::from)?;

        if response.status().is_success() {
            let payload: ListCollectionsResponse =
                response.json().await.map_err(QdrantError::from)?;
            Ok(payload
                .result
                .collections
                .into_iter()
                .map(|collection| collection.name)
                .collect())
        } else {
            let error = Self::unexpected(response).await;
            tracing::error!(error = %error, "Failed to list collections");
            Err(error.into())
        }
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}
