//! Shared handler state.

use catalog_store::CatalogStore;
use embed_service::EmbeddingClient;
use registry_client::UpstreamClient;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::AppConfig;

/// Shared state for handlers. Wrapped in an `Arc` and cloned per request.
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
    pub embedder: Arc<EmbeddingClient>,
    pub upstream: Arc<UpstreamClient>,
    pub config: AppConfig,
    /// Single-flight guards: a second trigger while a run is in progress
    /// answers 409 instead of queueing.
    pub ingest_gate: Mutex<()>,
    pub reachability_gate: Mutex<()>,
}

pub type SharedState = Arc<AppState>;
