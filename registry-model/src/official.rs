//! Opaque upstream metadata with typed accessors for the known keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The upstream registry's metadata blob for a server version.
///
/// RAGMap interprets `status`, `publishedAt`, `updatedAt` and `isLatest`
/// and passes everything else through unchanged. No closed schema is
/// imposed on the blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfficialMeta(pub Value);

impl OfficialMeta {
    pub fn status(&self) -> Option<&str> {
        self.0.get("status").and_then(Value::as_str)
    }

    pub fn is_latest(&self) -> Option<bool> {
        self.0.get("isLatest").and_then(Value::as_bool)
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("publishedAt")
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("updatedAt")
    }

    /// `updatedAt` as epoch milliseconds, for ordering without reparsing.
    pub fn updated_at_ms(&self) -> Option<i64> {
        self.updated_at().map(|t| t.timestamp_millis())
    }

    pub fn published_at_ms(&self) -> Option<i64> {
        self.published_at().map(|t| t.timestamp_millis())
    }

    /// Whether the upstream marked this version deleted (case-insensitive).
    pub fn is_deleted(&self) -> bool {
        self.status()
            .map(|s| s.eq_ignore_ascii_case("deleted"))
            .unwrap_or(false)
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_keys_are_accessible_unknown_keys_round_trip() {
        let meta = OfficialMeta(json!({
            "status": "active",
            "publishedAt": "2026-03-01T10:00:00Z",
            "updatedAt": "2026-03-02T10:00:00Z",
            "isLatest": true,
            "x-upstream-internal": { "shard": 7 }
        }));

        assert_eq!(meta.status(), Some("active"));
        assert_eq!(meta.is_latest(), Some(true));
        assert!(meta.updated_at_ms() > meta.published_at_ms());

        let out = serde_json::to_value(&meta).unwrap();
        assert_eq!(out["x-upstream-internal"]["shard"], 7);
    }

    #[test]
    fn deleted_status_is_case_insensitive() {
        assert!(OfficialMeta(json!({ "status": "Deleted" })).is_deleted());
        assert!(!OfficialMeta(json!({ "status": "deprecated" })).is_deleted());
        assert!(!OfficialMeta(Value::Null).is_deleted());
    }

    #[test]
    fn malformed_timestamps_read_as_absent() {
        let meta = OfficialMeta(json!({ "updatedAt": "yesterday" }));
        assert_eq!(meta.updated_at(), None);
    }
}
