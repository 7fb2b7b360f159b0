//! Liveness and readiness endpoints.

use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::{error::AppError, state::SharedState};

/// `GET /health` — always 200 once the process is up.
pub async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "storageKind": state.config.storage.as_str(),
        "embeddings": state.embedder.enabled(),
        "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

/// `GET /readyz` — 200 when the durable store answers, else 503.
pub async fn readyz(State(state): State<SharedState>) -> Result<Json<Value>, AppError> {
    let health = state.store.health_check().await;
    if health.ok {
        Ok(Json(json!({ "status": "ready" })))
    } else {
        Err(AppError::Unavailable(
            health.detail.unwrap_or_else(|| "storage unavailable".into()),
        ))
    }
}
