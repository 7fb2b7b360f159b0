//! Ingestion coordinator: page the upstream catalog, enrich and embed each
//! record, and fold everything into the catalog store.
//!
//! A run is fail-fast on upstream and store errors: partial progress
//! persists and the last-successful-ingest watermark moves only on clean
//! completion, so a failed incremental run re-covers the same window.
//! Embedding failures are downgraded to "no embedding for this record".

mod normalize;

pub use normalize::{NormalizedUpstream, normalize_entry};

use catalog_store::{CatalogStore, StoreError, VersionPut, VersionSelector};
use chrono::{DateTime, Utc};
use embed_service::EmbeddingClient;
use registry_client::{MAX_UPSTREAM_PAGE, PageRequest, UpstreamClient, UpstreamError, UpstreamPage};
use registry_model::{CatalogEntry, EmbeddingInfo, RunMode};
use serde::Serialize;
use std::{future::Future, pin::Pin};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Statistics for one ingestion run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub mode: RunMode,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Entries received from upstream, including skipped ones.
    pub fetched: usize,
    pub upserted: usize,
    /// Servers hidden by this run (full runs only).
    pub hidden: usize,
    pub duration_ms: u64,
}

/// Source of upstream catalog pages. [`UpstreamClient`] is the production
/// implementation; tests script one in-process.
pub trait PageSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        req: &'a PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamPage, UpstreamError>> + Send + 'a>>;
}

impl PageSource for UpstreamClient {
    fn fetch<'a>(
        &'a self,
        req: &'a PageRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamPage, UpstreamError>> + Send + 'a>> {
        Box::pin(self.fetch_page(req))
    }
}

/// Executes one ingestion run.
///
/// # Errors
/// Upstream and store errors abort the run; prior upserts are not undone.
pub async fn run(
    store: &dyn CatalogStore,
    source: &dyn PageSource,
    embedder: &EmbeddingClient,
    mode: RunMode,
) -> Result<IngestReport, IngestError> {
    let started_at = Utc::now();
    let run_id = store.begin_run(mode).await?;

    let updated_since = match mode {
        RunMode::Incremental => store
            .last_successful_ingest_at()
            .await?
            .map(|t| t.to_rfc3339()),
        RunMode::Full => None,
    };

    info!(%run_id, %mode, updated_since = ?updated_since, "ingestion run started");

    let mut fetched = 0usize;
    let mut upserted = 0usize;
    let mut cursor: Option<String> = None;

    loop {
        let page = source
            .fetch(&PageRequest {
                cursor: cursor.clone(),
                limit: MAX_UPSTREAM_PAGE,
                updated_since: updated_since.clone(),
            })
            .await?;
        fetched += page.entries.len();

        for raw in page.entries {
            let Some(normalized) = normalize_entry(raw) else {
                continue;
            };
            upsert_one(store, embedder, &run_id, normalized).await?;
            upserted += 1;
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    let hidden = match mode {
        RunMode::Full => store.hide_servers_not_seen(&run_id).await?,
        RunMode::Incremental => 0,
    };

    let finished_at = Utc::now();
    store.set_last_successful_ingest_at(finished_at).await?;

    let report = IngestReport {
        mode,
        run_id,
        started_at,
        finished_at,
        fetched,
        upserted,
        hidden,
        duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
    };
    info!(
        run_id = %report.run_id,
        fetched = report.fetched,
        upserted = report.upserted,
        hidden = report.hidden,
        duration_ms = report.duration_ms,
        "ingestion run finished"
    );
    Ok(report)
}

async fn upsert_one(
    store: &dyn CatalogStore,
    embedder: &EmbeddingClient,
    run_id: &str,
    normalized: NormalizedUpstream,
) -> Result<(), IngestError> {
    let now = Utc::now();
    let hidden = normalized.official.is_deleted();

    let mut ragmap = rag_enrich::enrich(&normalized.server);
    if embedder.enabled() {
        let embedding =
            resolve_embedding(store, embedder, &normalized, &ragmap.embedding_text_hash).await?;
        ragmap.embedding = embedding;
    }

    store
        .mark_server_seen(run_id, &normalized.server.name, now)
        .await?;

    debug!(
        name = %normalized.server.name,
        version = %normalized.server.version,
        score = ragmap.rag_score,
        hidden,
        "upserting server version"
    );

    store
        .upsert_server_version(VersionPut {
            run_id: run_id.to_string(),
            at: now,
            entry: CatalogEntry {
                server: normalized.server,
                official: normalized.official,
                publisher_provided: normalized.publisher_provided,
                ragmap,
            },
            hidden,
        })
        .await?;
    Ok(())
}

/// Reuses the stored embedding when the text blob is unchanged (same
/// content hash), otherwise asks the provider. Provider failures are
/// non-fatal and leave the record without an embedding.
async fn resolve_embedding(
    store: &dyn CatalogStore,
    embedder: &EmbeddingClient,
    normalized: &NormalizedUpstream,
    text_hash: &str,
) -> Result<Option<EmbeddingInfo>, IngestError> {
    if let Some(existing) = store
        .get_version(
            &normalized.server.name,
            VersionSelector::Exact(normalized.server.version.clone()),
        )
        .await?
    {
        if existing.ragmap.embedding_text_hash == text_hash {
            if let Some(embedding) = existing.ragmap.embedding {
                debug!(name = %normalized.server.name, "embedding reused, text unchanged");
                return Ok(Some(embedding));
            }
        }
    }

    let text = rag_enrich::embedding_text(&normalized.server);
    match embedder.embed(&text).await {
        Ok(Some(computed)) => Ok(Some(EmbeddingInfo {
            model: computed.model,
            dimensions: computed.vector.len(),
            vector: computed.vector,
            created_at: Utc::now(),
        })),
        Ok(None) => Ok(None),
        Err(e) => {
            warn!(
                name = %normalized.server.name,
                error = %e,
                "embedding failed, continuing without"
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_store::{LatestQuery, MemoryStore};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<UpstreamPage, UpstreamError>>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<UpstreamPage, UpstreamError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl PageSource for ScriptedSource {
        fn fetch<'a>(
            &'a self,
            req: &'a PageRequest,
        ) -> Pin<Box<dyn Future<Output = Result<UpstreamPage, UpstreamError>> + Send + 'a>> {
            self.requests.lock().unwrap().push(req.clone());
            let next = self
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(UpstreamPage {
                    entries: Vec::new(),
                    next_cursor: None,
                    count: None,
                }));
            Box::pin(async move { next })
        }
    }

    fn upstream_entry(name: &str, version: &str, official: serde_json::Value) -> serde_json::Value {
        json!({
            "server": { "name": name, "version": version, "description": "semantic search" },
            "_meta": { "io.modelcontextprotocol.registry/official": official }
        })
    }

    fn page(entries: Vec<serde_json::Value>, next: Option<&str>) -> UpstreamPage {
        UpstreamPage {
            entries,
            next_cursor: next.map(str::to_string),
            count: None,
        }
    }

    #[tokio::test]
    async fn full_run_pages_upserts_and_hides() {
        let store = MemoryStore::new();

        // First run seeds a server that the second run will not see.
        let source = ScriptedSource::new(vec![Ok(page(
            vec![
                upstream_entry("acme/stays", "1.0.0", json!({ "isLatest": true })),
                upstream_entry("acme/goes", "1.0.0", json!({ "isLatest": true })),
            ],
            None,
        ))]);
        let report = run(&store, &source, &EmbeddingClient::disabled(), RunMode::Full)
            .await
            .unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.hidden, 0);

        let source = ScriptedSource::new(vec![
            Ok(page(
                vec![upstream_entry("acme/stays", "1.0.0", json!({ "isLatest": true }))],
                Some("p2"),
            )),
            Ok(page(Vec::new(), None)),
        ]);
        let report = run(&store, &source, &EmbeddingClient::disabled(), RunMode::Full)
            .await
            .unwrap();
        assert_eq!(report.hidden, 1);

        let page = store
            .list_latest(&LatestQuery {
                cursor: None,
                limit: 10,
                updated_since: None,
            })
            .await
            .unwrap();
        let names: Vec<&str> = page.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["acme/stays"]);

        // The follow-up page request carried the rolling cursor.
        let requests = source.requests.lock().unwrap();
        assert_eq!(requests[1].cursor.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn incremental_run_passes_watermark_and_never_hides() {
        let store = MemoryStore::new();
        let watermark = Utc::now();
        store.set_last_successful_ingest_at(watermark).await.unwrap();

        // Seed a visible server from an earlier full run.
        let source = ScriptedSource::new(vec![Ok(page(
            vec![upstream_entry("acme/old", "1.0.0", json!({ "isLatest": true }))],
            None,
        ))]);
        run(&store, &source, &EmbeddingClient::disabled(), RunMode::Full)
            .await
            .unwrap();

        let source = ScriptedSource::new(vec![Ok(page(
            vec![upstream_entry("acme/new", "1.0.0", json!({ "isLatest": true }))],
            None,
        ))]);
        let report = run(
            &store,
            &source,
            &EmbeddingClient::disabled(),
            RunMode::Incremental,
        )
        .await
        .unwrap();
        assert_eq!(report.hidden, 0);

        let requests = source.requests.lock().unwrap();
        assert!(requests[0].updated_since.is_some());

        // acme/old was not in the incremental page but stays visible.
        let page = store
            .list_latest(&LatestQuery {
                cursor: None,
                limit: 10,
                updated_since: None,
            })
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 2);
    }

    #[tokio::test]
    async fn deleted_status_ingests_hidden() {
        let store = MemoryStore::new();
        let source = ScriptedSource::new(vec![Ok(page(
            vec![
                upstream_entry("acme/deleted", "1.0.0", json!({ "status": "deleted", "isLatest": true })),
                upstream_entry(
                    "acme/deprecated",
                    "1.0.0",
                    json!({ "status": "deprecated", "isLatest": true }),
                ),
            ],
            None,
        ))]);
        run(&store, &source, &EmbeddingClient::disabled(), RunMode::Full)
            .await
            .unwrap();

        let page = store
            .list_latest(&LatestQuery {
                cursor: None,
                limit: 10,
                updated_since: None,
            })
            .await
            .unwrap();
        let names: Vec<&str> = page.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["acme/deprecated"]);
    }

    #[tokio::test]
    async fn upstream_failure_aborts_but_keeps_partial_progress() {
        let store = MemoryStore::new();
        let source = ScriptedSource::new(vec![
            Ok(page(
                vec![upstream_entry("acme/first", "1.0.0", json!({ "isLatest": true }))],
                Some("p2"),
            )),
            Err(UpstreamError::Http {
                status: 502,
                body_excerpt: "bad gateway".into(),
            }),
        ]);

        let err = run(&store, &source, &EmbeddingClient::disabled(), RunMode::Full)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Upstream(_)));

        // Partial progress persists; the watermark did not move.
        let page = store
            .list_latest(&LatestQuery {
                cursor: None,
                limit: 10,
                updated_since: None,
            })
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 1);
        assert!(store.last_successful_ingest_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_without_name_or_version_are_skipped() {
        let store = MemoryStore::new();
        let source = ScriptedSource::new(vec![Ok(page(
            vec![
                json!({ "server": { "name": "", "version": "1.0.0" } }),
                upstream_entry("acme/ok", "1.0.0", json!({ "isLatest": true })),
            ],
            None,
        ))]);
        let report = run(&store, &source, &EmbeddingClient::disabled(), RunMode::Full)
            .await
            .unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.upserted, 1);
    }
}
