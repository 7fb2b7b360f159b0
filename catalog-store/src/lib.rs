//! Versioned catalog storage.
//!
//! The store persists server versions with their enrichment, projects a
//! per-name "latest" snapshot, tracks which servers an ingestion run has
//! seen, and hides (never deletes) servers a full run did not observe.
//!
//! Two implementations satisfy the same [`CatalogStore`] contract:
//! - [`MemoryStore`] — volatile, for tests and development
//! - [`SurrealStore`] — durable, over a SurrealDB document store

mod cache;
mod errors;
mod memory;
mod surreal;

pub use errors::StoreError;
pub use memory::MemoryStore;
pub use surreal::SurrealStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use registry_model::{CatalogEntry, ProbeMethod, RunMode};

/// Hard ceiling on `list_latest` page sizes.
pub const MAX_PAGE_LIMIT: usize = 200;

/// One versioned write produced by the ingestion coordinator.
#[derive(Debug, Clone)]
pub struct VersionPut {
    pub run_id: String,
    pub at: DateTime<Utc>,
    pub entry: CatalogEntry,
    /// True when the upstream marked this version deleted.
    pub hidden: bool,
}

/// Page request over the latest snapshot.
#[derive(Debug, Clone, Default)]
pub struct LatestQuery {
    /// Opaque cursor: the last name returned by the previous page.
    pub cursor: Option<String>,
    pub limit: usize,
    /// Keep only entries whose `official.updatedAt` is strictly greater.
    pub updated_since: Option<DateTime<Utc>>,
}

/// One page of latest entries, name-ordered.
#[derive(Debug, Clone)]
pub struct LatestPage {
    pub entries: Vec<CatalogEntry>,
    pub next_cursor: Option<String>,
}

/// Which version of a server to fetch.
#[derive(Debug, Clone)]
pub enum VersionSelector {
    Latest,
    Exact(String),
}

/// A reachability probe result to fold into the latest enrichment.
#[derive(Debug, Clone, Copy)]
pub struct ReachabilityUpdate {
    pub ok: bool,
    pub checked_at: DateTime<Utc>,
    pub status: Option<u16>,
    pub method: Option<ProbeMethod>,
}

/// Availability of the underlying durable store.
#[derive(Debug, Clone)]
pub struct StoreHealth {
    pub ok: bool,
    pub detail: Option<String>,
}

/// The storage contract shared by the ingestion coordinator, the
/// reachability scheduler and the read API.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Starts a run: returns a fresh unique id and clears derived caches.
    async fn begin_run(&self, mode: RunMode) -> Result<String, StoreError>;

    async fn last_successful_ingest_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
    async fn set_last_successful_ingest_at(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn last_reachability_run_at(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
    async fn set_last_reachability_run_at(&self, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Creates a stub record if the name is new, then stamps the run id and
    /// timestamp on it.
    async fn mark_server_seen(
        &self,
        run_id: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Writes the version entry, replacing any previous entry for the same
    /// `(name, version)`. When the entry claims `isLatest` (or the name has
    /// no latest yet) the name-level snapshot moves to it.
    async fn upsert_server_version(&self, put: VersionPut) -> Result<(), StoreError>;

    /// Hides every visible server whose `lastSeenRunId` differs from
    /// `run_id`. Returns the number of servers hidden.
    async fn hide_servers_not_seen(&self, run_id: &str) -> Result<usize, StoreError>;

    /// Pages name-ordered, non-hidden latest entries.
    async fn list_latest(&self, query: &LatestQuery) -> Result<LatestPage, StoreError>;

    /// Non-hidden versions of a name, ordered by (isLatest desc,
    /// publishedAt desc). Empty when the name is unknown or hidden.
    async fn list_versions(&self, name: &str) -> Result<Vec<CatalogEntry>, StoreError>;

    /// A single version, or `None` when unknown or hidden.
    async fn get_version(
        &self,
        name: &str,
        selector: VersionSelector,
    ) -> Result<Option<CatalogEntry>, StoreError>;

    /// Sorted union of categories across latest non-hidden entries.
    async fn list_categories(&self) -> Result<Vec<String>, StoreError>;

    /// Folds a probe result into the reachability fields of the latest
    /// entry's enrichment. No-op when the server is not present.
    async fn set_reachability(
        &self,
        name: &str,
        update: ReachabilityUpdate,
    ) -> Result<(), StoreError>;

    async fn health_check(&self) -> StoreHealth;
}

/// Collects the full latest snapshot by paging [`CatalogStore::list_latest`].
pub async fn collect_latest(store: &dyn CatalogStore) -> Result<Vec<CatalogEntry>, StoreError> {
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .list_latest(&LatestQuery {
                cursor: cursor.clone(),
                limit: MAX_PAGE_LIMIT,
                updated_since: None,
            })
            .await?;
        out.extend(page.entries);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(out)
}
