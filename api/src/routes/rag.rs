//! RAG discovery endpoints: search, top, install, explain, categories,
//! stats.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use catalog_store::{VersionSelector, collect_latest};
use percent_encoding::percent_decode_str;
use rag_query::{CatalogStats, InstallProjection, SearchFilters, SearchRequest};
use registry_model::ServerKind;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    error::AppError,
    params::{
        Issues, parse_bool, parse_categories, parse_limit, parse_server_kind, parse_transport,
        parse_u32,
    },
    state::SharedState,
};

const DEFAULT_RESULT_LIMIT: usize = 10;
const MAX_RESULT_LIMIT: usize = 50;
const DEFAULT_QUERY: &str = "rag";
const DEFAULT_TOP_MIN_SCORE: u32 = 10;

/// `GET /rag/categories`
pub async fn categories(State(state): State<SharedState>) -> Result<Json<Value>, AppError> {
    let categories = state.store.list_categories().await?;
    Ok(Json(json!({ "categories": categories })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    q: Option<String>,
    limit: Option<String>,
    categories: Option<String>,
    min_score: Option<String>,
    transport: Option<String>,
    registry_type: Option<String>,
    has_remote: Option<String>,
    reachable: Option<String>,
    citations: Option<String>,
    local_only: Option<String>,
    server_kind: Option<String>,
}

fn build_filters(params: &SearchParams, issues: &mut Issues) -> SearchFilters {
    SearchFilters {
        min_score: parse_u32(params.min_score.as_deref(), "minScore", issues),
        categories: parse_categories(params.categories.as_deref()),
        transport: parse_transport(params.transport.as_deref(), issues),
        registry_type: params.registry_type.clone().filter(|t| !t.is_empty()),
        has_remote: parse_bool(params.has_remote.as_deref(), "hasRemote", issues),
        reachable: parse_bool(params.reachable.as_deref(), "reachable", issues),
        citations: parse_bool(params.citations.as_deref(), "citations", issues),
        local_only: parse_bool(params.local_only.as_deref(), "localOnly", issues),
        server_kind: parse_server_kind(params.server_kind.as_deref(), issues),
    }
}

/// `GET /rag/search` — hybrid keyword + semantic search.
pub async fn search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let mut issues = Issues::new();
    let limit = parse_limit(
        params.limit.as_deref(),
        DEFAULT_RESULT_LIMIT,
        MAX_RESULT_LIMIT,
        &mut issues,
    );
    let filters = build_filters(&params, &mut issues);
    if !issues.is_empty() {
        return Err(AppError::Validation {
            issues: Value::Object(issues),
        });
    }

    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_QUERY.to_string());

    // A failed query embedding downgrades to keyword-only search.
    let query_embedding = match state.embedder.embed(&query).await {
        Ok(computed) => computed.map(|c| c.vector),
        Err(e) => {
            warn!(error = %e, "query embedding failed, keyword-only search");
            None
        }
    };

    let entries = collect_latest(state.store.as_ref()).await?;
    let hits = rag_query::search(
        &entries,
        &SearchRequest {
            query: query.clone(),
            limit,
            filters,
            query_embedding,
        },
    );

    let count = hits.len();
    Ok(Json(json!({
        "query": query,
        "results": hits,
        "metadata": { "count": count }
    })))
}

/// `GET /rag/top` — quality-ranked listing; defaults to scored retrievers.
pub async fn top(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let mut issues = Issues::new();
    let limit = parse_limit(
        params.limit.as_deref(),
        DEFAULT_RESULT_LIMIT,
        MAX_RESULT_LIMIT,
        &mut issues,
    );
    let mut filters = build_filters(&params, &mut issues);
    if !issues.is_empty() {
        return Err(AppError::Validation {
            issues: Value::Object(issues),
        });
    }

    if params.server_kind.is_none() {
        filters.server_kind = Some(ServerKind::Retriever);
    }
    if params.min_score.is_none() {
        filters.min_score = Some(DEFAULT_TOP_MIN_SCORE);
    }

    let entries = collect_latest(state.store.as_ref()).await?;
    let hits = rag_query::top(&entries, limit, &filters);

    let count = hits.len();
    Ok(Json(json!({
        "results": hits,
        "metadata": { "count": count }
    })))
}

#[derive(Debug, Deserialize)]
pub struct InstallParams {
    name: Option<String>,
}

/// `GET /rag/install?name=...`
pub async fn install(
    State(state): State<SharedState>,
    Query(params): Query<InstallParams>,
) -> Result<Json<InstallProjection>, AppError> {
    let Some(name) = params.name.filter(|n| !n.is_empty()) else {
        return Err(AppError::Validation {
            issues: json!({ "name": "required" }),
        });
    };
    let entry = state
        .store
        .get_version(&name, VersionSelector::Latest)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(rag_query::project_install(&entry)))
}

/// `GET /rag/servers/{name}/explain`
pub async fn explain_tail(
    State(state): State<SharedState>,
    Path(tail): Path<String>,
) -> Result<Json<Value>, AppError> {
    let Some(raw_name) = tail.strip_suffix("/explain").filter(|n| !n.is_empty()) else {
        return Err(AppError::NotFound);
    };
    let name = percent_decode_str(raw_name).decode_utf8_lossy().into_owned();
    let entry = state
        .store
        .get_version(&name, VersionSelector::Latest)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(json!({
        "name": entry.name(),
        "version": entry.version(),
        "ragScore": entry.ragmap.rag_score,
        "categories": entry.ragmap.categories,
        "reasons": entry.ragmap.reasons,
    })))
}

/// `GET /rag/stats`
pub async fn stats(State(state): State<SharedState>) -> Result<Json<CatalogStats>, AppError> {
    let entries = collect_latest(state.store.as_ref()).await?;
    let last_ingest = state.store.last_successful_ingest_at().await?;
    let last_reachability = state.store.last_reachability_run_at().await?;
    Ok(Json(rag_query::project_stats(
        &entries,
        last_ingest,
        last_reachability,
    )))
}
