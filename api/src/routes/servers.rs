//! Registry-compatible listing endpoints.
//!
//! Server names may contain forward slashes, so `/v0.1/servers/{name}/...`
//! is routed through a wildcard and split on the trailing `/versions`
//! markers; the name and version segments are percent-decoded afterwards,
//! which makes literal and encoded slashes resolve identically.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use catalog_store::{LatestQuery, VersionSelector};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::AppError,
    params::{Issues, parse_limit, parse_rfc3339},
    state::SharedState,
};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct ListServersParams {
    limit: Option<String>,
    cursor: Option<String>,
    updated_since: Option<String>,
}

/// `GET /v0.1/servers`
pub async fn list_servers(
    State(state): State<SharedState>,
    Query(params): Query<ListServersParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut issues = Issues::new();
    let limit = parse_limit(
        params.limit.as_deref(),
        DEFAULT_LIST_LIMIT,
        MAX_LIST_LIMIT,
        &mut issues,
    );
    let updated_since = parse_rfc3339(params.updated_since.as_deref(), "updated_since", &mut issues);
    if !issues.is_empty() {
        return Err(AppError::Validation {
            issues: serde_json::Value::Object(issues),
        });
    }

    let page = state
        .store
        .list_latest(&LatestQuery {
            cursor: params.cursor,
            limit,
            updated_since,
        })
        .await?;

    let mut metadata = json!({ "count": page.entries.len() });
    if let Some(next) = page.next_cursor {
        metadata["nextCursor"] = json!(next);
    }
    Ok(Json(json!({ "servers": page.entries, "metadata": metadata })))
}

#[derive(Debug, PartialEq)]
pub(crate) enum ServerPath {
    Versions(String),
    Version(String, String),
}

pub(crate) fn parse_server_path(tail: &str) -> Option<ServerPath> {
    if let Some(name) = tail.strip_suffix("/versions") {
        if name.is_empty() {
            return None;
        }
        return Some(ServerPath::Versions(decode(name)));
    }
    if let Some(idx) = tail.rfind("/versions/") {
        let name = &tail[..idx];
        let version = &tail[idx + "/versions/".len()..];
        if name.is_empty() || version.is_empty() {
            return None;
        }
        return Some(ServerPath::Version(decode(name), decode(version)));
    }
    None
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// `GET /v0.1/servers/{name}/versions` and
/// `GET /v0.1/servers/{name}/versions/{version|latest}`
pub async fn server_tail(
    State(state): State<SharedState>,
    Path(tail): Path<String>,
) -> Result<Response, AppError> {
    match parse_server_path(&tail) {
        Some(ServerPath::Versions(name)) => {
            let versions = state.store.list_versions(&name).await?;
            if versions.is_empty() {
                return Err(AppError::NotFound);
            }
            let count = versions.len();
            let body = json!({
                "servers": versions,
                "metadata": { "count": count }
            });
            Ok(Json(body).into_response())
        }
        Some(ServerPath::Version(name, version)) => {
            let selector = if version == "latest" {
                VersionSelector::Latest
            } else {
                VersionSelector::Exact(version)
            };
            let entry = state
                .store
                .get_version(&name, selector)
                .await?
                .ok_or(AppError::NotFound)?;
            Ok(Json(entry).into_response())
        }
        None => Err(AppError::NotFound),
    }
}
