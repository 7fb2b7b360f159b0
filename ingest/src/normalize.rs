//! Normalization of raw upstream entries.
//!
//! The upstream list endpoint has shipped two envelope layouts: a wrapped
//! one (`{server: {...}, _meta: {...}}`) and a flat one where the server
//! fields sit at the top level next to `_meta`. Both are accepted; the
//! registry metadata blobs stay opaque.

use registry_model::{OfficialMeta, ServerRecord};
use serde_json::Value;
use tracing::warn;

const OFFICIAL_META_KEY: &str = "io.modelcontextprotocol.registry/official";
const PUBLISHER_META_KEY: &str = "io.modelcontextprotocol.registry/publisher-provided";

/// A raw upstream entry split into its normalized parts.
#[derive(Debug, Clone)]
pub struct NormalizedUpstream {
    pub server: ServerRecord,
    pub official: OfficialMeta,
    pub publisher_provided: Option<Value>,
}

/// Splits one upstream entry. Returns `None` (and logs) for entries that
/// are not objects or carry an empty name or version; the run skips them.
pub fn normalize_entry(value: Value) -> Option<NormalizedUpstream> {
    let Value::Object(mut obj) = value else {
        warn!("skipping non-object upstream entry");
        return None;
    };

    let (mut server_obj, meta) = if let Some(server) = obj.remove("server") {
        let meta = obj.remove("_meta");
        let Value::Object(server_obj) = server else {
            warn!("skipping entry with non-object `server`");
            return None;
        };
        (server_obj, meta)
    } else {
        let meta = obj.remove("_meta");
        (obj, meta)
    };

    let server_meta = server_obj.remove("_meta");

    let official = extract_official(meta.as_ref());
    let publisher_provided = extract_publisher(meta.as_ref(), server_meta);

    let server = match ServerRecord::from_upstream_value(Value::Object(server_obj)) {
        Ok(server) => server,
        Err(e) => {
            warn!(error = %e, "skipping undecodable upstream entry");
            return None;
        }
    };

    if server.name.is_empty() || server.version.is_empty() {
        warn!(name = %server.name, "skipping entry with empty name or version");
        return None;
    }

    Some(NormalizedUpstream {
        server,
        official,
        publisher_provided,
    })
}

fn extract_official(meta: Option<&Value>) -> OfficialMeta {
    let Some(meta) = meta else {
        return OfficialMeta::default();
    };
    if let Some(official) = meta.get(OFFICIAL_META_KEY) {
        return OfficialMeta(official.clone());
    }
    // Tolerate blobs that are the official metadata itself.
    if looks_official(meta) {
        return OfficialMeta(meta.clone());
    }
    OfficialMeta::default()
}

fn looks_official(value: &Value) -> bool {
    ["status", "isLatest", "publishedAt", "updatedAt"]
        .iter()
        .any(|k| value.get(k).is_some())
}

fn extract_publisher(meta: Option<&Value>, server_meta: Option<Value>) -> Option<Value> {
    if let Some(publisher) = meta.and_then(|m| m.get(PUBLISHER_META_KEY)) {
        return Some(publisher.clone());
    }
    match server_meta {
        Some(Value::Object(map)) => {
            if let Some(publisher) = map.get(PUBLISHER_META_KEY) {
                return Some(publisher.clone());
            }
            if map.is_empty() {
                None
            } else {
                Some(Value::Object(map))
            }
        }
        _ => None,
    }
}
