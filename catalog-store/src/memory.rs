//! Volatile in-memory store for tests and development.
//!
//! A single `RwLock` serializes writers; readers observe self-consistent
//! entries. Derived caches are invalidated on every mutation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use registry_model::{CatalogEntry, RagEnrichment, RunMeta, RunMode};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::cache::TtlCell;
use crate::{
    CatalogStore, LatestPage, LatestQuery, MAX_PAGE_LIMIT, ReachabilityUpdate, StoreError,
    StoreHealth, VersionPut, VersionSelector,
};

const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct VersionRecord {
    entry: CatalogEntry,
    hidden: bool,
    #[allow(dead_code)]
    last_seen_run_id: String,
}

#[derive(Debug, Clone, Default)]
struct NameRecord {
    hidden: bool,
    last_seen_run_id: Option<String>,
    last_seen_at: Option<DateTime<Utc>>,
    latest_version: Option<String>,
    versions: HashMap<String, VersionRecord>,
}

#[derive(Default)]
struct Inner {
    servers: BTreeMap<String, NameRecord>,
    runs: HashMap<String, RunMeta>,
    last_ingest_at: Option<DateTime<Utc>>,
    last_reachability_at: Option<DateTime<Utc>>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
    categories: TtlCell<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            categories: TtlCell::new(CACHE_TTL),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn apply_reachability(ragmap: &mut RagEnrichment, update: &ReachabilityUpdate) {
    ragmap.reachable = Some(update.ok);
    ragmap.reachable_checked_at = Some(update.checked_at);
    ragmap.reachable_status = update.status;
    ragmap.reachable_method = update.method;
    if update.ok {
        ragmap.last_reachable_at = Some(update.checked_at);
    }
}

impl NameRecord {
    fn latest_entry(&self) -> Option<&VersionRecord> {
        self.latest_version
            .as_deref()
            .and_then(|v| self.versions.get(v))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn begin_run(&self, mode: RunMode) -> Result<String, StoreError> {
        let run_id = Uuid::new_v4().to_string();
        let mut inner = self.inner.write().await;
        inner.runs.insert(
            run_id.clone(),
            RunMeta {
                run_id: run_id.clone(),
                mode,
                started_at: Utc::now(),
                finished_at: None,
            },
        );
        drop(inner);
        self.categories.clear();
        debug!(%run_id, %mode, "run started");
        Ok(run_id)
    }

    async fn last_successful_ingest_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.inner.read().await.last_ingest_at)
    }

    async fn set_last_successful_ingest_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.write().await.last_ingest_at = Some(at);
        Ok(())
    }

    async fn last_reachability_run_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.inner.read().await.last_reachability_at)
    }

    async fn set_last_reachability_run_at(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.write().await.last_reachability_at = Some(at);
        Ok(())
    }

    async fn mark_server_seen(
        &self,
        run_id: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let record = inner.servers.entry(name.to_string()).or_default();
        record.last_seen_run_id = Some(run_id.to_string());
        record.last_seen_at = Some(at);
        Ok(())
    }

    async fn upsert_server_version(&self, put: VersionPut) -> Result<(), StoreError> {
        let name = put.entry.server.name.clone();
        let version = put.entry.server.version.clone();
        let claims_latest = put.entry.official.is_latest() == Some(true);

        let mut inner = self.inner.write().await;
        let record = inner.servers.entry(name).or_default();
        record.versions.insert(
            version.clone(),
            VersionRecord {
                entry: put.entry,
                hidden: put.hidden,
                last_seen_run_id: put.run_id,
            },
        );
        let becomes_latest = claims_latest
            || record.latest_version.is_none()
            || record.latest_version.as_deref() == Some(version.as_str());
        if becomes_latest {
            record.latest_version = Some(version);
            record.hidden = put.hidden;
        }
        drop(inner);
        self.categories.clear();
        Ok(())
    }

    async fn hide_servers_not_seen(&self, run_id: &str) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let mut hidden = 0usize;
        for record in inner.servers.values_mut() {
            if !record.hidden && record.last_seen_run_id.as_deref() != Some(run_id) {
                record.hidden = true;
                hidden += 1;
            }
        }
        drop(inner);
        self.categories.clear();
        debug!(%run_id, hidden, "hid servers not seen by run");
        Ok(hidden)
    }

    async fn list_latest(&self, query: &LatestQuery) -> Result<LatestPage, StoreError> {
        let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);
        let inner = self.inner.read().await;

        let lower = match &query.cursor {
            Some(cursor) => Bound::Excluded(cursor.clone()),
            None => Bound::Unbounded,
        };

        let mut entries = Vec::new();
        let mut next_cursor = None;
        for record in inner.servers.range((lower, Bound::Unbounded)).map(|(_, r)| r) {
            if record.hidden {
                continue;
            }
            let Some(version) = record.latest_entry() else {
                continue;
            };
            if version.hidden {
                continue;
            }
            if let Some(since) = query.updated_since {
                if !version
                    .entry
                    .official
                    .updated_at()
                    .is_some_and(|t| t > since)
                {
                    continue;
                }
            }
            if entries.len() == limit {
                // One more match exists past the page boundary.
                next_cursor = entries.last().map(|e: &CatalogEntry| e.name().to_string());
                break;
            }
            entries.push(version.entry.clone());
        }

        Ok(LatestPage {
            entries,
            next_cursor,
        })
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<CatalogEntry>, StoreError> {
        let inner = self.inner.read().await;
        let Some(record) = inner.servers.get(name).filter(|r| !r.hidden) else {
            return Ok(Vec::new());
        };

        let mut versions: Vec<&VersionRecord> =
            record.versions.values().filter(|v| !v.hidden).collect();
        versions.sort_by(|a, b| {
            let latest_a = a.entry.official.is_latest() == Some(true);
            let latest_b = b.entry.official.is_latest() == Some(true);
            latest_b
                .cmp(&latest_a)
                .then_with(|| {
                    let pa = a.entry.official.published_at_ms().unwrap_or(i64::MIN);
                    let pb = b.entry.official.published_at_ms().unwrap_or(i64::MIN);
                    pb.cmp(&pa)
                })
                .then_with(|| a.entry.version().cmp(b.entry.version()))
        });

        Ok(versions.into_iter().map(|v| v.entry.clone()).collect())
    }

    async fn get_version(
        &self,
        name: &str,
        selector: VersionSelector,
    ) -> Result<Option<CatalogEntry>, StoreError> {
        let inner = self.inner.read().await;
        let Some(record) = inner.servers.get(name).filter(|r| !r.hidden) else {
            return Ok(None);
        };
        let version = match &selector {
            VersionSelector::Latest => record.latest_entry(),
            VersionSelector::Exact(v) => record.versions.get(v),
        };
        Ok(version
            .filter(|v| !v.hidden)
            .map(|v| v.entry.clone()))
    }

    async fn list_categories(&self) -> Result<Vec<String>, StoreError> {
        if let Some(cached) = self.categories.get() {
            return Ok(cached.as_ref().clone());
        }

        let inner = self.inner.read().await;
        let mut set = BTreeSet::new();
        for record in inner.servers.values() {
            if record.hidden {
                continue;
            }
            if let Some(version) = record.latest_entry().filter(|v| !v.hidden) {
                set.extend(version.entry.ragmap.categories.iter().cloned());
            }
        }
        drop(inner);

        let categories: Vec<String> = set.into_iter().collect();
        self.categories.put(categories.clone());
        Ok(categories)
    }

    async fn set_reachability(
        &self,
        name: &str,
        update: ReachabilityUpdate,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.servers.get_mut(name) else {
            return Ok(());
        };
        let Some(version) = record.latest_version.clone() else {
            return Ok(());
        };
        if let Some(version) = record.versions.get_mut(&version) {
            apply_reachability(&mut version.entry.ragmap, &update);
        }
        drop(inner);
        self.categories.clear();
        Ok(())
    }

    async fn health_check(&self) -> StoreHealth {
        StoreHealth {
            ok: true,
            detail: None,
        }
    }
}
