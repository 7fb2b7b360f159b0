//! The RAG-relevance rule table.
//!
//! Rules are applied in table order. A `require_core` rule contributes only
//! after at least one core (non-`require_core`) rule has fired, so generic
//! terms like "search" never carry a record on their own.

use regex::Regex;
use std::sync::LazyLock;

pub(crate) struct Rule {
    /// Category tag; doubles as the reason identifier.
    pub category: &'static str,
    pub weight: u32,
    pub pattern: &'static str,
    pub keyword: Option<&'static str>,
    pub require_core: bool,
}

const RULES: &[Rule] = &[
    Rule {
        category: "rag",
        weight: 30,
        pattern: r"\brag\b|retrieval[- ]augmented",
        keyword: Some("rag"),
        require_core: false,
    },
    Rule {
        category: "retrieval",
        weight: 15,
        pattern: r"\bretriev(al|e)\b|semantic search",
        keyword: Some("retrieval"),
        require_core: false,
    },
    Rule {
        category: "embeddings",
        weight: 20,
        pattern: r"\bembedding(s)?\b|vectorize|text-embedding",
        keyword: Some("embeddings"),
        require_core: false,
    },
    Rule {
        category: "vector-db",
        weight: 20,
        pattern: r"\bvector\s*(db|database)\b|vector store|pgvector",
        keyword: Some("vector db"),
        require_core: false,
    },
    Rule {
        category: "qdrant",
        weight: 15,
        pattern: r"\bqdrant\b",
        keyword: None,
        require_core: false,
    },
    Rule {
        category: "pinecone",
        weight: 15,
        pattern: r"\bpinecone\b",
        keyword: None,
        require_core: false,
    },
    Rule {
        category: "weaviate",
        weight: 15,
        pattern: r"\bweaviate\b",
        keyword: None,
        require_core: false,
    },
    Rule {
        category: "milvus",
        weight: 15,
        pattern: r"\bmilvus\b",
        keyword: None,
        require_core: false,
    },
    Rule {
        category: "chroma",
        weight: 15,
        pattern: r"\bchroma\b",
        keyword: None,
        require_core: false,
    },
    Rule {
        category: "reranking",
        weight: 12,
        pattern: r"\brerank(er|ing)?\b",
        keyword: Some("rerank"),
        require_core: false,
    },
    Rule {
        category: "documents",
        weight: 10,
        pattern: r"\bpdf\b|docx|markdown|documents?\b",
        keyword: Some("documents"),
        require_core: false,
    },
    Rule {
        category: "ingestion",
        weight: 10,
        pattern: r"\bingest(ion|ing)?\b|etl|connector",
        keyword: Some("ingestion"),
        require_core: false,
    },
    Rule {
        category: "search",
        weight: 8,
        pattern: r"\bsearch\b|query\b",
        keyword: Some("search"),
        require_core: true,
    },
];

static COMPILED: LazyLock<Vec<(&'static Rule, Regex)>> = LazyLock::new(|| {
    RULES
        .iter()
        .map(|rule| {
            let re = Regex::new(&format!("(?i){}", rule.pattern))
                .unwrap_or_else(|e| panic!("invalid rule pattern {}: {e}", rule.category));
            (rule, re)
        })
        .collect()
});

pub(crate) fn compiled_rules() -> &'static [(&'static Rule, Regex)] {
    &COMPILED
}
