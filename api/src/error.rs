//! Public application error type and its HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

/// Errors the API surfaces, both at startup and per request.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / config ---
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    // --- IO / network / server ---
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request / routing ---
    #[error("invalid request")]
    Validation { issues: Value },

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("ingest token is not configured")]
    TokenNotConfigured,

    #[error("a run is already in progress")]
    Busy,

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    // --- Bubbled from the core ---
    #[error(transparent)]
    Store(#[from] catalog_store::StoreError),

    #[error(transparent)]
    Ingest(#[from] ingest::IngestError),

    #[error("embedding client setup failed: {0}")]
    Embed(#[from] embed_service::EmbedError),

    #[error("upstream client setup failed: {0}")]
    Upstream(#[from] registry_client::UpstreamError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation { issues } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request", "issues": issues }),
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Not found" })),
            AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" }))
            }
            AppError::TokenNotConfigured => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Ingest token is not configured" }),
            ),
            AppError::Busy => (StatusCode::CONFLICT, json!({ "error": "busy" })),
            AppError::Unavailable(detail) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "status": "not_ready", "detail": detail }),
            ),
            AppError::Ingest(ingest::IngestError::Upstream(e)) => {
                error!(error = %e, "ingestion aborted on upstream error");
                (StatusCode::BAD_GATEWAY, json!({ "error": e.to_string() }))
            }
            other => {
                // Read-path store failures and startup-only variants:
                // generic payload, full detail in the logs.
                error!(error = %other, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
