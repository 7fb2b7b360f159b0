//! Keyword and semantic ranking with quality tiebreakers.

use regex::Regex;
use registry_model::{CatalogEntry, ServerKind, probe_url};
use serde::Serialize;
use std::cmp::Ordering;

use crate::filters::{SearchFilters, matches};

/// Queries keep at most this many distinct tokens.
pub const MAX_QUERY_TOKENS: usize = 16;

/// Which ranker produced a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Keyword,
    Semantic,
}

/// One ranked result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Absent on `top` results, which are ordered purely by quality.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<HitKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    pub rag_score: u32,
    pub categories: Vec<String>,
    pub server_kind: ServerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SearchHit {
    fn from_entry(entry: &CatalogEntry, kind: Option<HitKind>, score: Option<f32>) -> Self {
        Self {
            name: entry.name().to_string(),
            version: entry.version().to_string(),
            title: entry.server.title.clone(),
            description: entry.server.description.clone(),
            kind,
            score,
            rag_score: entry.ragmap.rag_score,
            categories: entry.ragmap.categories.clone(),
            server_kind: entry.ragmap.server_kind,
            reachable: entry.ragmap.reachable,
            url: probe_url(&entry.server).map(str::to_string),
        }
    }
}

/// A hybrid search request over the latest catalog.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    pub filters: SearchFilters,
    /// Embedding of the query text; `None` disables the semantic ranker.
    pub query_embedding: Option<Vec<f32>>,
}

/// Lowercase alphanumeric tokens: split on anything else, take the first
/// sixteen, dedupe preserving order.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let raw: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .take(MAX_QUERY_TOKENS)
        .collect();

    let mut tokens: Vec<String> = Vec::with_capacity(raw.len());
    for token in raw {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Count of distinct tokens that match `text` as a word-boundary prefix.
pub fn keyword_score(tokens: &[Regex], text: &str) -> u32 {
    tokens.iter().filter(|re| re.is_match(text)).count() as u32
}

/// Compiles the per-token word-boundary prefix matchers.
pub fn compile_tokens(tokens: &[String]) -> Vec<Regex> {
    tokens
        .iter()
        .filter_map(|t| Regex::new(&format!(r"(?i)\b{}", regex::escape(t))).ok())
        .collect()
}

/// Cosine similarity in [-1, 1]; zero for mismatched or degenerate vectors.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// Quality-signal ordering: reachable first, then score, recency, name.
/// Used to break ranker ties and as the sole order for `top`.
pub fn quality_cmp(a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
    let reachable_a = a.ragmap.reachable == Some(true);
    let reachable_b = b.ragmap.reachable == Some(true);
    reachable_b
        .cmp(&reachable_a)
        .then_with(|| b.ragmap.rag_score.cmp(&a.ragmap.rag_score))
        .then_with(|| {
            let ua = a.official.updated_at_ms().unwrap_or(i64::MIN);
            let ub = b.official.updated_at_ms().unwrap_or(i64::MIN);
            ub.cmp(&ua)
        })
        .then_with(|| a.server.name.cmp(&b.server.name))
}

/// Hybrid search: keyword and (when a query embedding is present) semantic
/// ranking over the filtered catalog, merged semantic-first.
pub fn search(entries: &[CatalogEntry], request: &SearchRequest) -> Vec<SearchHit> {
    let filtered: Vec<&CatalogEntry> = entries
        .iter()
        .filter(|e| matches(e, &request.filters))
        .collect();

    // Keyword ranking over the rebuilt text blobs.
    let tokens = compile_tokens(&tokenize_query(&request.query));
    let mut keyword: Vec<(u32, &CatalogEntry)> = filtered
        .iter()
        .filter_map(|entry| {
            let text = rag_enrich::embedding_text(&entry.server);
            let score = keyword_score(&tokens, &text);
            (score > 0).then_some((score, *entry))
        })
        .collect();
    keyword.sort_by(|(sa, ea), (sb, eb)| sb.cmp(sa).then_with(|| quality_cmp(ea, eb)));

    // Semantic ranking, only with a query vector; entries without an
    // embedding are skipped, never excluded by the filter itself.
    let mut semantic: Vec<(f32, &CatalogEntry)> = Vec::new();
    if let Some(query_vector) = &request.query_embedding {
        semantic = filtered
            .iter()
            .filter_map(|entry| {
                let embedding = entry.ragmap.embedding.as_ref()?;
                let score = cosine(query_vector, &embedding.vector);
                (score > 0.0).then_some((score, *entry))
            })
            .collect();
        semantic.sort_by(|(sa, ea), (sb, eb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| quality_cmp(ea, eb))
        });
    }

    // Merge: semantic results first, then keyword-only names.
    let mut out: Vec<SearchHit> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for (score, entry) in &semantic {
        if out.len() == request.limit {
            break;
        }
        out.push(SearchHit::from_entry(
            entry,
            Some(HitKind::Semantic),
            Some(*score),
        ));
        seen.push(entry.name());
    }
    for (score, entry) in &keyword {
        if out.len() == request.limit {
            break;
        }
        if seen.contains(&entry.name()) {
            continue;
        }
        out.push(SearchHit::from_entry(
            entry,
            Some(HitKind::Keyword),
            Some(*score as f32),
        ));
    }
    out
}

/// Pure quality ranking of the filtered catalog.
pub fn top(entries: &[CatalogEntry], limit: usize, filters: &SearchFilters) -> Vec<SearchHit> {
    let mut filtered: Vec<&CatalogEntry> =
        entries.iter().filter(|e| matches(e, filters)).collect();
    filtered.sort_by(|a, b| quality_cmp(a, b));
    filtered
        .into_iter()
        .take(limit)
        .map(|entry| SearchHit::from_entry(entry, None, None))
        .collect()
}
