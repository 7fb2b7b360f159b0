//! Deterministic RAG-relevance enrichment.
//!
//! [`enrich`] is a pure function of a [`ServerRecord`]: the same record
//! always yields bit-identical categories, score, reasons, keywords,
//! capability booleans, server kind and text hash. Embeddings and
//! reachability are filled in elsewhere (the ingestion coordinator and the
//! reachability scheduler respectively).

mod rules;

use regex::Regex;
use registry_model::{
    RagEnrichment, ServerKind, ServerRecord, TRANSPORT_STREAMABLE_HTTP,
};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

const MAX_REASONS: usize = 12;
const MAX_KEYWORDS: usize = 24;

static CITATIONS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bcitation(s)?\b|cite(s|d)?\s+(source|reference)|source\s+attribution|grounding\b|provenance\b",
    )
    .unwrap_or_else(|e| panic!("invalid citations pattern: {e}"))
});

/// Kind patterns, first match wins; evaluated on name + title + description.
static KIND_RULES: LazyLock<Vec<(ServerKind, Regex)>> = LazyLock::new(|| {
    [
        (
            ServerKind::Evaluator,
            r"evaluate|evaluation|benchmark|dataset|leaderboard|judge",
        ),
        (
            ServerKind::Indexer,
            r"ingest|index|crawl|scrape|etl|connector",
        ),
        (
            ServerKind::Router,
            r"router|select tool|tool selection|orchestrate",
        ),
        (
            ServerKind::Retriever,
            r"search|retrieval|retriever|semantic search|rag|vector search",
        ),
    ]
    .into_iter()
    .map(|(kind, pat)| {
        let re = Regex::new(&format!("(?i){pat}"))
            .unwrap_or_else(|e| panic!("invalid kind pattern {kind}: {e}"));
        (kind, re)
    })
    .collect()
});

/// The text blob scored by the rule table and sent to the embeddings
/// provider. Rebuilt on demand, never persisted.
pub fn embedding_text(server: &ServerRecord) -> String {
    let mut parts: Vec<&str> = Vec::new();
    fn push<'a>(parts: &mut Vec<&'a str>, s: Option<&'a str>) {
        if let Some(s) = s.filter(|s| !s.is_empty()) {
            parts.push(s);
        }
    }

    push(&mut parts, Some(&server.name));
    push(&mut parts, server.title.as_deref());
    push(&mut parts, server.description.as_deref());
    push(&mut parts, server.repository_url.as_deref());
    push(&mut parts, server.website_url.as_deref());
    for package in &server.packages {
        push(&mut parts, Some(&package.identifier));
        push(&mut parts, Some(&package.registry_type));
        push(&mut parts, package.transport.as_ref().map(|t| t.kind.as_str()));
    }
    for remote in &server.remotes {
        push(&mut parts, Some(&remote.kind));
        push(&mut parts, Some(&remote.url));
    }

    parts.join("\n")
}

/// Derives the full enrichment for a server record.
///
/// `embedding` is left `None`; the coordinator attaches it after (and only
/// if) the provider call succeeds. Reachability fields are left unknown.
pub fn enrich(server: &ServerRecord) -> RagEnrichment {
    let text = embedding_text(server);

    let mut categories: Vec<String> = Vec::new();
    let mut reasons: Vec<String> = Vec::new();
    let mut keywords: Vec<String> = Vec::new();
    let mut score: u32 = 0;
    let mut core_fired = false;

    for (rule, re) in rules::compiled_rules() {
        if rule.require_core && !core_fired {
            continue;
        }
        if !re.is_match(&text) {
            continue;
        }
        if !rule.require_core {
            core_fired = true;
        }
        score += rule.weight;
        push_unique(&mut categories, rule.category);
        push_unique(&mut reasons, rule.category);
        if let Some(keyword) = rule.keyword {
            push_unique(&mut keywords, keyword);
        }
    }

    reasons.truncate(MAX_REASONS);
    keywords.truncate(MAX_KEYWORDS);

    let has_remote = infer_has_remote(server);

    RagEnrichment {
        categories,
        rag_score: score.min(100),
        reasons,
        keywords,
        has_remote: Some(has_remote),
        local_only: Some(!has_remote),
        citations: Some(CITATIONS_RE.is_match(&text)),
        server_kind: classify_kind(server),
        embedding: None,
        embedding_text_hash: hash_text(&text),
        ..Default::default()
    }
}

/// True iff any remote has a non-empty url, or any package exposes a
/// `streamable-http` transport with a non-empty url.
pub fn infer_has_remote(server: &ServerRecord) -> bool {
    server.remotes.iter().any(|r| !r.url.is_empty())
        || server.packages.iter().any(|p| {
            p.transport
                .as_ref()
                .filter(|t| t.kind == TRANSPORT_STREAMABLE_HTTP)
                .and_then(|t| t.url.as_deref())
                .is_some_and(|u| !u.is_empty())
        })
}

fn classify_kind(server: &ServerRecord) -> ServerKind {
    let mut text = server.name.clone();
    for part in [server.title.as_deref(), server.description.as_deref()] {
        if let Some(part) = part {
            text.push('\n');
            text.push_str(part);
        }
    }
    KIND_RULES
        .iter()
        .find(|(_, re)| re.is_match(&text))
        .map(|(kind, _)| *kind)
        .unwrap_or(ServerKind::Other)
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> ServerRecord {
        ServerRecord::from_upstream_value(value).unwrap()
    }

    #[test]
    fn storage_does_not_match_rag_inside_a_word() {
        let server = record(json!({
            "name": "acme/blob",
            "version": "1.0.0",
            "description": "storage"
        }));
        let e = enrich(&server);
        assert_eq!(e.rag_score, 0);
        assert!(e.categories.is_empty());
    }

    #[test]
    fn rules_fire_in_table_order() {
        let server = record(json!({
            "name": "acme/knowledge",
            "version": "1.0.0",
            "description": "RAG server: semantic search over embeddings in a vector store"
        }));
        let e = enrich(&server);
        assert_eq!(
            e.categories,
            ["rag", "retrieval", "embeddings", "vector-db", "search"]
        );
        assert_eq!(e.rag_score, 30 + 15 + 20 + 20 + 8);
        assert_eq!(e.reasons, e.categories);
    }

    #[test]
    fn search_alone_does_not_fire_without_a_core_rule() {
        let server = record(json!({
            "name": "acme/finder",
            "version": "1.0.0",
            "description": "query tool for finding things"
        }));
        let e = enrich(&server);
        assert_eq!(e.rag_score, 0);
        assert!(e.reasons.is_empty());
        assert!(e.keywords.is_empty());
    }

    #[test]
    fn score_caps_at_one_hundred() {
        let server = record(json!({
            "name": "acme/everything",
            "version": "1.0.0",
            "description": "rag retrieval embeddings vector db qdrant pinecone weaviate \
                            milvus chroma reranker pdf ingestion search"
        }));
        let e = enrich(&server);
        assert_eq!(e.rag_score, 100);
        // Vendor rules carry no keyword label.
        assert!(!e.keywords.iter().any(|k| k == "qdrant"));
    }

    #[test]
    fn citations_and_remote_inference() {
        let server = record(json!({
            "name": "acme/grounded",
            "version": "1.0.0",
            "description": "retrieval with source attribution",
            "remotes": [{ "type": "sse", "url": "https://sse.example" }]
        }));
        let e = enrich(&server);
        assert_eq!(e.citations, Some(true));
        assert_eq!(e.has_remote, Some(true));
        assert_eq!(e.local_only, Some(false));
    }

    #[test]
    fn stdio_only_package_is_local() {
        let server = record(json!({
            "name": "acme/local",
            "version": "1.0.0",
            "packages": [{ "registryType": "npm", "identifier": "@acme/local",
                           "transport": { "type": "stdio" } }]
        }));
        let e = enrich(&server);
        assert_eq!(e.has_remote, Some(false));
        assert_eq!(e.local_only, Some(true));
    }

    #[test]
    fn kind_rules_apply_in_order() {
        let server = record(json!({
            "name": "acme/bench",
            "version": "1.0.0",
            "description": "benchmark search quality"
        }));
        // Evaluator wins over retriever despite "search".
        assert_eq!(enrich(&server).server_kind, ServerKind::Evaluator);

        let server = record(json!({
            "name": "acme/search",
            "version": "1.0.0",
            "description": "semantic search"
        }));
        assert_eq!(enrich(&server).server_kind, ServerKind::Retriever);
    }

    #[test]
    fn enrichment_is_deterministic() {
        let value = json!({
            "name": "acme/repeat",
            "version": "2.0.0",
            "title": "Repeatable",
            "description": "rag retrieval",
            "packages": [{ "registryType": "pypi", "identifier": "acme-repeat",
                           "transport": { "type": "stdio" } }]
        });
        let a = enrich(&record(value.clone()));
        let b = enrich(&record(value));
        assert_eq!(a, b);
        assert_eq!(a.embedding_text_hash.len(), 64);
    }
}
