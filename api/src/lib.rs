//! HTTP shell over the RAGMap core.
//!
//! Wires configuration, telemetry, the catalog store, the embedding client
//! and the upstream registry client into an axum router, then serves the
//! read API plus the protected trigger endpoints.

mod config;
mod error;
mod params;
mod redirect;
mod routes;
mod state;
mod telemetry;

pub use config::{AppConfig, StorageKind};
pub use error::AppError;
pub use state::{AppState, SharedState};

use axum::{
    Router, middleware,
    routing::{get, post},
};
use catalog_store::{CatalogStore, MemoryStore, SurrealStore};
use embed_service::EmbeddingClient;
use registry_client::UpstreamClient;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Builds the full application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/readyz", get(routes::health::readyz))
        .route("/.well-known/agent.json", get(routes::well_known::agent_card))
        .route(
            "/.well-known/agent-card.json",
            get(routes::well_known::agent_card),
        )
        .route("/v0.1/servers", get(routes::servers::list_servers))
        .route("/v0.1/servers/{*tail}", get(routes::servers::server_tail))
        .route("/rag/categories", get(routes::rag::categories))
        .route("/rag/search", get(routes::rag::search))
        .route("/rag/top", get(routes::rag::top))
        .route("/rag/install", get(routes::rag::install))
        .route("/rag/servers/{*tail}", get(routes::rag::explain_tail))
        .route("/rag/stats", get(routes::rag::stats))
        .route("/internal/ingest/run", post(routes::internal::run_ingest))
        .route(
            "/internal/reachability/run",
            post(routes::internal::run_reachability),
        )
        .layer(middleware::from_fn(redirect::well_known_redirect))
        .with_state(state)
}

/// Boots the service and serves until the process is stopped.
///
/// # Errors
/// Configuration, store and listener setup errors; axum serve errors.
pub async fn start() -> Result<(), AppError> {
    telemetry::init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn CatalogStore> = match config.storage {
        StorageKind::Memory => Arc::new(MemoryStore::new()),
        StorageKind::Surreal => {
            // from_env guarantees the path is present for this kind.
            let path = config.surreal_path.clone().unwrap_or_default();
            Arc::new(SurrealStore::open_file(&path).await?)
        }
    };

    let embedder = Arc::new(EmbeddingClient::from_config(&config.embedding)?);
    let upstream = Arc::new(UpstreamClient::new(
        &config.upstream_url,
        config.upstream_timeout_secs,
    )?);

    info!(
        bind = %config.bind_addr,
        storage = config.storage.as_str(),
        upstream = %config.upstream_url,
        embeddings = embedder.enabled(),
        "ragmap starting"
    );

    let bind_addr = config.bind_addr.clone();
    let state: SharedState = Arc::new(AppState {
        store,
        embedder,
        upstream,
        config,
        ingest_gate: Mutex::new(()),
        reachability_gate: Mutex::new(()),
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(AppError::Bind)?;
    axum::serve(listener, app).await.map_err(AppError::Server)?;

    Ok(())
}
