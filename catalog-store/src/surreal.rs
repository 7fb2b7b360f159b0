//! Durable catalog store over SurrealDB.
//!
//! Documents live in four schemaless tables: `server` (name-level state),
//! `version` (one document per `(name, version)`), `run` and `process_meta`.
//! Version documents are addressed by a deterministic `name@version` record
//! id so a re-upsert replaces the whole document in one statement. Listings
//! are produced by scanning `server` rows and resolving each name's latest
//! version document; no separate snapshot table is required.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use registry_model::{CatalogEntry, RunMode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, SurrealKv};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::TtlCell;
use crate::{
    CatalogStore, LatestPage, LatestQuery, MAX_PAGE_LIMIT, ReachabilityUpdate, StoreError,
    StoreHealth, VersionPut, VersionSelector, collect_latest,
};

const NAMESPACE: &str = "ragmap";
const DATABASE: &str = "catalog";
const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize)]
struct ServerRow {
    name: String,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    last_seen_run_id: Option<String>,
    #[serde(default)]
    last_seen_at_ms: Option<i64>,
    #[serde(default)]
    latest_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionRow {
    name: String,
    version: String,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    last_seen_run_id: Option<String>,
    #[serde(default)]
    is_latest: bool,
    #[serde(default)]
    published_at_ms: i64,
    #[serde(default)]
    updated_at_ms: i64,
    entry: CatalogEntry,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunRow {
    run_id: String,
    mode: String,
    started_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetaRow {
    #[serde(default)]
    last_ingest_at: Option<String>,
    #[serde(default)]
    last_reachability_at: Option<String>,
}

/// SurrealDB-backed catalog store.
pub struct SurrealStore {
    db: Surreal<Db>,
    categories: TtlCell<Vec<String>>,
}

impl SurrealStore {
    /// Opens an in-memory engine. Used by tests and throwaway environments.
    pub async fn open_memory() -> Result<Self, StoreError> {
        let db = Surreal::new::<Mem>(()).await?;
        Self::initialize(db).await
    }

    /// Opens (or creates) a SurrealKV datastore at `path`.
    pub async fn open_file(path: &str) -> Result<Self, StoreError> {
        let db = Surreal::new::<SurrealKv>(path.to_string()).await?;
        Self::initialize(db).await
    }

    async fn initialize(db: Surreal<Db>) -> Result<Self, StoreError> {
        db.use_ns(NAMESPACE).use_db(DATABASE).await?;

        db.query(
            "DEFINE TABLE IF NOT EXISTS server SCHEMALESS;
             DEFINE INDEX IF NOT EXISTS server_name ON server FIELDS name UNIQUE;
             DEFINE TABLE IF NOT EXISTS version SCHEMALESS;
             DEFINE INDEX IF NOT EXISTS version_key ON version FIELDS name, version UNIQUE;
             DEFINE TABLE IF NOT EXISTS run SCHEMALESS;
             DEFINE TABLE IF NOT EXISTS process_meta SCHEMALESS;",
        )
        .await?;

        info!(ns = NAMESPACE, db = DATABASE, "catalog store ready");
        Ok(Self {
            db,
            categories: TtlCell::new(CACHE_TTL),
        })
    }

    fn version_key(name: &str, version: &str) -> String {
        format!("{name}@{version}")
    }

    async fn server_row(&self, name: &str) -> Result<Option<ServerRow>, StoreError> {
        Ok(self.db.select(("server", name)).await?)
    }

    async fn version_row(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<VersionRow>, StoreError> {
        let key = Self::version_key(name, version);
        Ok(self.db.select(("version", key.as_str())).await?)
    }

    async fn set_meta_field(&self, field: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut patch = serde_json::Map::new();
        patch.insert(
            field.to_string(),
            serde_json::Value::String(at.to_rfc3339()),
        );
        let _: Option<MetaRow> = self
            .db
            .upsert(("process_meta", "state"))
            .merge(serde_json::Value::Object(patch))
            .await?;
        Ok(())
    }

    async fn meta_row(&self) -> Result<MetaRow, StoreError> {
        let row: Option<MetaRow> = self.db.select(("process_meta", "state")).await?;
        Ok(row.unwrap_or_default())
    }

    fn clear_caches(&self) {
        self.categories.clear();
    }
}

fn parse_meta_time(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl CatalogStore for SurrealStore {
    async fn begin_run(&self, mode: RunMode) -> Result<String, StoreError> {
        let run_id = Uuid::new_v4().to_string();
        let _: Option<RunRow> = self
            .db
            .create(("run", run_id.as_str()))
            .content(RunRow {
                run_id: run_id.clone(),
                mode: mode.to_string(),
                started_at: Utc::now().to_rfc3339(),
            })
            .await?;
        self.clear_caches();
        debug!(%run_id, %mode, "run started");
        Ok(run_id)
    }

    async fn last_successful_ingest_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(parse_meta_time(self.meta_row().await?.last_ingest_at))
    }

    async fn set_last_successful_ingest_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_meta_field("last_ingest_at", at).await
    }

    async fn last_reachability_run_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(parse_meta_time(self.meta_row().await?.last_reachability_at))
    }

    async fn set_last_reachability_run_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.set_meta_field("last_reachability_at", at).await
    }

    async fn mark_server_seen(
        &self,
        run_id: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let _: Option<ServerRow> = self
            .db
            .upsert(("server", name))
            .merge(json!({
                "name": name,
                "last_seen_run_id": run_id,
                "last_seen_at_ms": at.timestamp_millis(),
            }))
            .await?;
        Ok(())
    }

    async fn upsert_server_version(&self, put: VersionPut) -> Result<(), StoreError> {
        let name = put.entry.server.name.clone();
        let version = put.entry.server.version.clone();
        let claims_latest = put.entry.official.is_latest() == Some(true);

        let current = self.server_row(&name).await?;
        let becomes_latest = claims_latest
            || current
                .as_ref()
                .map(|row| {
                    row.latest_version.is_none()
                        || row.latest_version.as_deref() == Some(version.as_str())
                })
                .unwrap_or(true);

        let row = VersionRow {
            name: name.clone(),
            version: version.clone(),
            hidden: put.hidden,
            last_seen_run_id: Some(put.run_id.clone()),
            is_latest: claims_latest,
            published_at_ms: put.entry.official.published_at_ms().unwrap_or(0),
            updated_at_ms: put.entry.official.updated_at_ms().unwrap_or(0),
            entry: put.entry,
        };
        let key = Self::version_key(&name, &version);
        let _: Option<VersionRow> = self
            .db
            .upsert(("version", key.as_str()))
            .content(row)
            .await?;

        let patch = if becomes_latest {
            json!({ "name": &name, "latest_version": &version, "hidden": put.hidden })
        } else {
            json!({ "name": &name })
        };
        let _: Option<ServerRow> = self.db.upsert(("server", name.as_str())).merge(patch).await?;

        self.clear_caches();
        Ok(())
    }

    async fn hide_servers_not_seen(&self, run_id: &str) -> Result<usize, StoreError> {
        let mut response = self
            .db
            .query(
                "UPDATE server SET hidden = true \
                 WHERE hidden = false \
                 AND (last_seen_run_id = NONE OR last_seen_run_id != $run) \
                 RETURN AFTER",
            )
            .bind(("run", run_id.to_string()))
            .await?;
        let rows: Vec<ServerRow> = response.take(0)?;
        self.clear_caches();
        debug!(%run_id, hidden = rows.len(), "hid servers not seen by run");
        Ok(rows.len())
    }

    async fn list_latest(&self, query: &LatestQuery) -> Result<LatestPage, StoreError> {
        let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);
        let mut after = query.cursor.clone().unwrap_or_default();
        let mut entries: Vec<CatalogEntry> = Vec::new();

        loop {
            let mut response = self
                .db
                .query(
                    "SELECT * FROM server \
                     WHERE hidden = false AND name > $after \
                     ORDER BY name ASC LIMIT $batch",
                )
                .bind(("after", after.clone()))
                .bind(("batch", (limit + 1) as i64))
                .await?;
            let rows: Vec<ServerRow> = response.take(0)?;
            let scanned = rows.len();

            for row in rows {
                after = row.name.clone();
                let Some(version) = row.latest_version.as_deref() else {
                    continue;
                };
                let Some(doc) = self.version_row(&row.name, version).await? else {
                    continue;
                };
                if doc.hidden {
                    continue;
                }
                if let Some(since) = query.updated_since {
                    if !doc.entry.official.updated_at().is_some_and(|t| t > since) {
                        continue;
                    }
                }
                if entries.len() == limit {
                    // A further match exists past the page boundary.
                    return Ok(LatestPage {
                        next_cursor: entries.last().map(|e| e.name().to_string()),
                        entries,
                    });
                }
                entries.push(doc.entry);
            }

            if scanned < limit + 1 {
                break;
            }
        }

        Ok(LatestPage {
            entries,
            next_cursor: None,
        })
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<CatalogEntry>, StoreError> {
        match self.server_row(name).await? {
            Some(row) if !row.hidden => {}
            _ => return Ok(Vec::new()),
        }

        let mut response = self
            .db
            .query(
                "SELECT * FROM version \
                 WHERE name = $name AND hidden = false \
                 ORDER BY is_latest DESC, published_at_ms DESC, version ASC",
            )
            .bind(("name", name.to_string()))
            .await?;
        let rows: Vec<VersionRow> = response.take(0)?;
        Ok(rows.into_iter().map(|r| r.entry).collect())
    }

    async fn get_version(
        &self,
        name: &str,
        selector: VersionSelector,
    ) -> Result<Option<CatalogEntry>, StoreError> {
        let Some(server) = self.server_row(name).await?.filter(|r| !r.hidden) else {
            return Ok(None);
        };
        let version = match &selector {
            VersionSelector::Latest => match server.latest_version.as_deref() {
                Some(v) => v.to_string(),
                None => return Ok(None),
            },
            VersionSelector::Exact(v) => v.clone(),
        };
        Ok(self
            .version_row(name, &version)
            .await?
            .filter(|row| !row.hidden)
            .map(|row| row.entry))
    }

    async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        if let Some(cached) = self.categories.get() {
            return Ok(cached.as_ref().clone());
        }

        let latest = collect_latest(self).await?;
        let mut set = std::collections::BTreeSet::new();
        for entry in &latest {
            set.extend(entry.ragmap.categories.iter().cloned());
        }
        let categories: Vec<String> = set.into_iter().collect();
        self.categories.put(categories.clone());
        Ok(categories)
    }

    async fn set_reachability(
        &self,
        name: &str,
        update: ReachabilityUpdate,
    ) -> Result<(), StoreError> {
        let Some(server) = self.server_row(name).await? else {
            return Ok(());
        };
        let Some(version) = server.latest_version else {
            return Ok(());
        };

        // Single partial UPDATE so concurrent ingestion never observes a
        // half-written reachability state.
        let statement = if update.ok {
            "UPDATE version SET \
               entry.ragmap.reachable = $ok, \
               entry.ragmap.reachableCheckedAt = $checked, \
               entry.ragmap.reachableStatus = $status, \
               entry.ragmap.reachableMethod = $method, \
               entry.ragmap.lastReachableAt = $checked \
             WHERE name = $name AND version = $version"
        } else {
            "UPDATE version SET \
               entry.ragmap.reachable = $ok, \
               entry.ragmap.reachableCheckedAt = $checked, \
               entry.ragmap.reachableStatus = $status, \
               entry.ragmap.reachableMethod = $method \
             WHERE name = $name AND version = $version"
        };

        let method = update
            .method
            .map(|m| serde_json::to_value(m))
            .transpose()?
            .and_then(|v| v.as_str().map(str::to_string));

        self.db
            .query(statement)
            .bind(("ok", update.ok))
            .bind(("checked", update.checked_at.to_rfc3339()))
            .bind(("status", update.status.map(i64::from)))
            .bind(("method", method))
            .bind(("name", name.to_string()))
            .bind(("version", version))
            .await?;

        self.clear_caches();
        Ok(())
    }

    async fn health_check(&self) -> StoreHealth {
        match self.db.query("RETURN 1").await {
            Ok(_) => StoreHealth {
                ok: true,
                detail: None,
            },
            Err(e) => StoreHealth {
                ok: false,
                detail: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_model::{OfficialMeta, ProbeMethod, RagEnrichment, ServerRecord};
    use serde_json::json;

    fn entry(name: &str, version: &str, official: serde_json::Value) -> CatalogEntry {
        CatalogEntry {
            server: ServerRecord {
                name: name.into(),
                version: version.into(),
                description: None,
                title: None,
                repository_url: None,
                website_url: None,
                remotes: Vec::new(),
                packages: Vec::new(),
                extra: serde_json::Map::new(),
            },
            official: OfficialMeta(official),
            publisher_provided: None,
            ragmap: RagEnrichment {
                embedding_text_hash: "h".into(),
                ..Default::default()
            },
        }
    }

    async fn seed(store: &SurrealStore, run: &str, entry: CatalogEntry, hidden: bool) {
        store
            .mark_server_seen(run, &entry.server.name.clone(), Utc::now())
            .await
            .unwrap();
        store
            .upsert_server_version(VersionPut {
                run_id: run.into(),
                at: Utc::now(),
                entry,
                hidden,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn round_trips_entries_through_the_document_store() {
        let store = SurrealStore::open_memory().await.unwrap();
        let run = store.begin_run(RunMode::Full).await.unwrap();

        seed(
            &store,
            &run,
            entry("acme/a", "1.0.0", json!({ "isLatest": true })),
            false,
        )
        .await;
        seed(
            &store,
            &run,
            entry("acme/with/slashes", "1.0.0", json!({ "isLatest": true })),
            false,
        )
        .await;

        let got = store
            .get_version("acme/with/slashes", VersionSelector::Latest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.name(), "acme/with/slashes");

        let page = store
            .list_latest(&LatestQuery {
                cursor: None,
                limit: 10,
                updated_since: None,
            })
            .await
            .unwrap();
        let names: Vec<&str> = page.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["acme/a", "acme/with/slashes"]);
    }

    #[tokio::test]
    async fn exact_fill_pages_carry_no_cursor() {
        let store = SurrealStore::open_memory().await.unwrap();
        let run = store.begin_run(RunMode::Full).await.unwrap();
        seed(&store, &run, entry("acme/a", "1.0.0", json!({})), false).await;
        seed(&store, &run, entry("acme/b", "1.0.0", json!({})), false).await;
        seed(&store, &run, entry("acme/c", "1.0.0", json!({})), false).await;

        let first = store
            .list_latest(&LatestQuery {
                cursor: None,
                limit: 2,
                updated_since: None,
            })
            .await
            .unwrap();
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("acme/b"));

        let last = store
            .list_latest(&LatestQuery {
                cursor: first.next_cursor,
                limit: 2,
                updated_since: None,
            })
            .await
            .unwrap();
        assert_eq!(last.entries.len(), 1);
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn hide_not_seen_counts_only_stale_visible_servers() {
        let store = SurrealStore::open_memory().await.unwrap();
        let first = store.begin_run(RunMode::Full).await.unwrap();
        seed(&store, &first, entry("acme/kept", "1.0.0", json!({})), false).await;
        seed(&store, &first, entry("acme/stale", "1.0.0", json!({})), false).await;

        let second = store.begin_run(RunMode::Full).await.unwrap();
        seed(&store, &second, entry("acme/kept", "1.0.0", json!({})), false).await;

        assert_eq!(store.hide_servers_not_seen(&second).await.unwrap(), 1);
        assert_eq!(store.hide_servers_not_seen(&second).await.unwrap(), 0);

        assert!(
            store
                .get_version("acme/stale", VersionSelector::Latest)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn reachability_is_a_partial_update() {
        let store = SurrealStore::open_memory().await.unwrap();
        let run = store.begin_run(RunMode::Full).await.unwrap();
        let mut e = entry("acme/a", "1.0.0", json!({ "isLatest": true }));
        e.ragmap.rag_score = 33;
        seed(&store, &run, e, false).await;

        store
            .set_reachability(
                "acme/a",
                ReachabilityUpdate {
                    ok: true,
                    checked_at: Utc::now(),
                    status: Some(200),
                    method: Some(ProbeMethod::Get),
                },
            )
            .await
            .unwrap();

        let got = store
            .get_version("acme/a", VersionSelector::Latest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.ragmap.rag_score, 33);
        assert_eq!(got.ragmap.reachable, Some(true));
        assert_eq!(got.ragmap.reachable_method, Some(ProbeMethod::Get));
        assert!(got.ragmap.last_reachable_at.is_some());
    }

    #[tokio::test]
    async fn process_meta_round_trips() {
        let store = SurrealStore::open_memory().await.unwrap();
        assert!(store.last_successful_ingest_at().await.unwrap().is_none());

        let at = Utc::now();
        store.set_last_successful_ingest_at(at).await.unwrap();
        let got = store.last_successful_ingest_at().await.unwrap().unwrap();
        assert_eq!(got.timestamp_millis(), at.timestamp_millis());
    }
}
