//! Protected trigger endpoints for the external scheduler.
//!
//! Both require the `X-Ingest-Token` header to match the configured token:
//! 401 on mismatch, 500 when no token is configured at all. A second
//! trigger while a run is in flight answers 409.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
};
use ingest::{IngestReport, PageSource};
use reachability::{DEFAULT_PROBE_TIMEOUT_MS, Prober, RefreshOptions, RefreshReport};
use registry_model::RunMode;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{error::AppError, state::SharedState};

const TOKEN_HEADER: &str = "X-Ingest-Token";

/// Token comparison: `None` configured means the server is misconfigured,
/// anything else is an exact (trimmed) match.
pub(crate) fn check_token(
    configured: Option<&str>,
    provided: Option<&str>,
) -> Result<(), AppError> {
    let configured = configured.map(str::trim).filter(|t| !t.is_empty());
    let Some(expected) = configured else {
        return Err(AppError::TokenNotConfigured);
    };
    match provided.map(str::trim) {
        Some(given) if given == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

fn authorize(state: &SharedState, headers: &HeaderMap) -> Result<(), AppError> {
    check_token(
        state.config.ingest_token.as_deref(),
        headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestRunBody {
    mode: Option<String>,
}

/// An empty body means "all defaults"; anything else must be valid JSON.
fn parse_body<T: Default + serde::de::DeserializeOwned>(raw: &str) -> Result<T, AppError> {
    if raw.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(raw).map_err(|e| AppError::Validation {
        issues: json!({ "body": e.to_string() }),
    })
}

/// `POST /internal/ingest/run`
pub async fn run_ingest(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<IngestReport>, AppError> {
    authorize(&state, &headers)?;

    let body: IngestRunBody = parse_body(&body)?;
    let mode = match body.mode {
        None => RunMode::default(),
        Some(raw) => raw.parse::<RunMode>().map_err(|_| AppError::Validation {
            issues: json!({ "mode": "must be \"full\" or \"incremental\"" }),
        })?,
    };

    let _guard = state.ingest_gate.try_lock().map_err(|_| AppError::Busy)?;
    info!(%mode, "ingestion triggered");

    let source: &dyn PageSource = state.upstream.as_ref();
    let report = ingest::run(state.store.as_ref(), source, &state.embedder, mode).await?;
    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReachabilityRunBody {
    limit: Option<usize>,
}

/// `POST /internal/reachability/run`
pub async fn run_reachability(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<RefreshReport>, AppError> {
    authorize(&state, &headers)?;

    let body: ReachabilityRunBody = parse_body(&body)?;
    let limit = body.limit.unwrap_or(50);
    let _guard = state
        .reachability_gate
        .try_lock()
        .map_err(|_| AppError::Busy)?;
    info!(limit, "reachability refresh triggered");

    let prober = Prober::new(DEFAULT_PROBE_TIMEOUT_MS, state.config.policy)
        .map_err(|e| AppError::Config(e.to_string()))?;
    let options = RefreshOptions {
        limit,
        ..Default::default()
    };
    let report = reachability::refresh(state.store.as_ref(), &prober, &options).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_configuration_is_a_server_error() {
        assert!(matches!(
            check_token(None, Some("x")),
            Err(AppError::TokenNotConfigured)
        ));
        assert!(matches!(
            check_token(Some("  "), Some("x")),
            Err(AppError::TokenNotConfigured)
        ));
    }

    #[test]
    fn mismatched_or_absent_tokens_are_unauthorized() {
        assert!(matches!(
            check_token(Some("secret"), None),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            check_token(Some("secret"), Some("wrong")),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn matching_tokens_pass() {
        assert!(check_token(Some("secret"), Some("secret")).is_ok());
        assert!(check_token(Some(" secret "), Some("secret")).is_ok());
    }
}
