//! The canonical serialized form of a server version.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{OfficialMeta, RagEnrichment, ServerRecord};

/// A server version with its upstream metadata and derived enrichment.
///
/// Entries are immutable per `(name, version)` apart from re-ingestion
/// (which replaces the whole entry) and reachability writes (which touch
/// only the reachability fields of `ragmap`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub server: ServerRecord,
    #[serde(default)]
    pub official: OfficialMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_provided: Option<Value>,
    pub ragmap: RagEnrichment,
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        &self.server.name
    }

    pub fn version(&self) -> &str {
        &self.server.version
    }
}
