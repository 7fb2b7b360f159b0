//! Static capability descriptor served at the discovery paths.

use axum::Json;
use serde_json::{Value, json};

/// `GET /.well-known/agent.json` and `/.well-known/agent-card.json`.
pub async fn agent_card() -> Json<Value> {
    Json(json!({
        "name": "RAGMap",
        "description": "Curated subregistry of RAG-relevant Model Context Protocol servers",
        "version": env!("CARGO_PKG_VERSION"),
        "capabilities": ["search", "top", "install", "explain", "registry-listing"],
        "endpoints": {
            "servers": "/v0.1/servers",
            "search": "/rag/search",
            "top": "/rag/top",
            "install": "/rag/install",
            "explain": "/rag/servers/{name}/explain",
            "categories": "/rag/categories",
            "stats": "/rag/stats",
        },
    }))
}
