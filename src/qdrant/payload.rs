//! Helpers for constructing Qdrant point ids and payloads.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside each record.
pub(crate) fn build_payload(
    record_id: &str,
    text: &str,
    timestamp_rfc3339: &str,
    chunk_hash: &str,
) -> Value {
    let mut payload = Map::new();
    payload.insert("record_id".into(), Value::String(record_id.to_string()));
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert("chunk_hash".into(), Value::String(chunk_hash.to_string()));
    payload.insert(
        "ingested_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Derive the Qdrant point id for a record id.
///
/// Qdrant only accepts integers or UUIDs as point ids, so string ids such as `summary_3` are
/// mapped to a name-based UUID. The mapping is stable, which keeps upserts idempotent.
pub fn point_id_for(record_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, record_id.as_bytes()).to_string()
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
