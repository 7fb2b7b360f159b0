//! Derived RAG-relevance classification for a server version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Functional role inferred for a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Retriever,
    Evaluator,
    Indexer,
    Router,
    #[default]
    Other,
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerKind::Retriever => "retriever",
            ServerKind::Evaluator => "evaluator",
            ServerKind::Indexer => "indexer",
            ServerKind::Router => "router",
            ServerKind::Other => "other",
        };
        f.write_str(s)
    }
}

impl FromStr for ServerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retriever" => Ok(ServerKind::Retriever),
            "evaluator" => Ok(ServerKind::Evaluator),
            "indexer" => Ok(ServerKind::Indexer),
            "router" => Ok(ServerKind::Router),
            "other" => Ok(ServerKind::Other),
            _ => Err(()),
        }
    }
}

/// HTTP method that produced a reachability classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    Head,
    Get,
}

/// A dense vector computed for a server's text blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingInfo {
    pub model: String,
    pub dimensions: usize,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// The derived enrichment attached to every catalog entry.
///
/// Everything except the embedding and the reachability fields is a pure
/// function of the server record. Reachability fields are written only by
/// the reachability scheduler; their absence means "unknown", never "false".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagEnrichment {
    pub categories: Vec<String>,
    pub rag_score: u32,
    pub reasons: Vec<String>,
    pub keywords: Vec<String>,
    /// `None` only on entries that predate enrichment; readers fall back to
    /// recomputing from the server record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_remote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<bool>,
    #[serde(default)]
    pub server_kind: ServerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingInfo>,
    pub embedding_text_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable_checked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reachable_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable_method: Option<ProbeMethod>,
}

impl RagEnrichment {
    /// Whether any reachability field has ever been written.
    pub fn reachability_known(&self) -> bool {
        self.reachable.is_some()
            || self.reachable_checked_at.is_some()
            || self.reachable_status.is_some()
    }
}
