//! Tiered probe scheduling over the latest catalog.
//!
//! Candidates are bucketed into three priorities: high-value retrievers
//! (A) rotate unknown-first then oldest-checked-first, remaining
//! retrievers (B) go by score, and everything else (C) is shuffled for
//! opportunistic coverage. Tier A gets 70% of the probe budget. Probes run
//! strictly one at a time with a fixed pause in between.

use catalog_store::{
    CatalogStore, LatestQuery, MAX_PAGE_LIMIT, ReachabilityUpdate, StoreError,
};
use chrono::Utc;
use rand::seq::SliceRandom;
use registry_model::{CatalogEntry, ServerKind, probe_url};
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::probe::UrlProber;

const MAX_REFRESH_LIMIT: usize = 500;
const TIER_A_SHARE_PERCENT: usize = 70;

/// One probeable latest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub url: String,
    pub rag_score: u32,
    pub server_kind: ServerKind,
    pub updated_at_ms: i64,
    /// Millis of the last reachability check; `None` = never probed.
    pub checked_at_ms: Option<i64>,
}

impl Candidate {
    fn from_entry(entry: &CatalogEntry) -> Option<Self> {
        // Explicitly-local servers are never probed.
        if entry.ragmap.has_remote == Some(false) {
            return None;
        }
        let url = probe_url(&entry.server)?;
        Some(Self {
            name: entry.name().to_string(),
            url: url.to_string(),
            rag_score: entry.ragmap.rag_score,
            server_kind: entry.ragmap.server_kind,
            updated_at_ms: entry.official.updated_at_ms().unwrap_or(0),
            checked_at_ms: entry
                .ragmap
                .reachable_checked_at
                .map(|t| t.timestamp_millis()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// How many candidates to probe; clamped to 1..=500.
    pub limit: usize,
    /// Pause between consecutive probes.
    pub pause: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            pause: Duration::from_millis(800),
        }
    }
}

/// Statistics for one scheduler run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub candidates: usize,
    pub selected: usize,
    pub checked: usize,
    pub reachable: usize,
    pub duration_ms: u64,
}

/// Probes up to `limit` candidates from the latest catalog and folds the
/// results into the store.
///
/// # Errors
/// Store errors abort the run; results already written persist.
pub async fn refresh(
    store: &dyn CatalogStore,
    prober: &dyn UrlProber,
    options: &RefreshOptions,
) -> Result<RefreshReport, StoreError> {
    let started = Utc::now();
    let limit = options.limit.clamp(1, MAX_REFRESH_LIMIT);

    let mut candidates = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store
            .list_latest(&LatestQuery {
                cursor: cursor.clone(),
                limit: MAX_PAGE_LIMIT,
                updated_since: None,
            })
            .await?;
        candidates.extend(page.entries.iter().filter_map(Candidate::from_entry));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    let total = candidates.len();

    let (mut tier_a, mut tier_b, mut tier_c) = bucket(candidates);
    sort_tier_a(&mut tier_a);
    sort_tier_b(&mut tier_b);
    tier_c.shuffle(&mut rand::thread_rng());
    let selected = select(tier_a, tier_b, tier_c, limit);

    info!(
        candidates = total,
        selected = selected.len(),
        limit,
        "reachability refresh starting"
    );

    let mut checked = 0usize;
    let mut reachable = 0usize;
    let last = selected.len().saturating_sub(1);
    for (i, candidate) in selected.iter().enumerate() {
        let outcome = prober.probe(&candidate.url).await;
        debug!(
            name = %candidate.name,
            url = %candidate.url,
            ok = outcome.ok,
            status = ?outcome.status,
            "probe result"
        );
        store
            .set_reachability(
                &candidate.name,
                ReachabilityUpdate {
                    ok: outcome.ok,
                    checked_at: Utc::now(),
                    status: outcome.status,
                    method: outcome.method,
                },
            )
            .await?;
        checked += 1;
        if outcome.ok {
            reachable += 1;
        }
        if i != last {
            sleep(options.pause).await;
        }
    }

    let finished = Utc::now();
    store.set_last_reachability_run_at(finished).await?;

    let report = RefreshReport {
        candidates: total,
        selected: checked,
        checked,
        reachable,
        duration_ms: (finished - started).num_milliseconds().max(0) as u64,
    };
    info!(
        checked = report.checked,
        reachable = report.reachable,
        duration_ms = report.duration_ms,
        "reachability refresh finished"
    );
    Ok(report)
}

fn bucket(candidates: Vec<Candidate>) -> (Vec<Candidate>, Vec<Candidate>, Vec<Candidate>) {
    let mut a = Vec::new();
    let mut b = Vec::new();
    let mut c = Vec::new();
    for candidate in candidates {
        if candidate.server_kind == ServerKind::Retriever && candidate.rag_score >= 10 {
            a.push(candidate);
        } else if candidate.server_kind == ServerKind::Retriever && candidate.rag_score >= 1 {
            b.push(candidate);
        } else {
            c.push(candidate);
        }
    }
    (a, b, c)
}

/// Tier A rotation: never-probed first, then oldest-checked, then score,
/// recency and name.
fn sort_tier_a(tier: &mut [Candidate]) {
    tier.sort_by(|x, y| {
        let known = x.checked_at_ms.is_some().cmp(&y.checked_at_ms.is_some());
        known
            .then_with(|| x.checked_at_ms.cmp(&y.checked_at_ms))
            .then_with(|| y.rag_score.cmp(&x.rag_score))
            .then_with(|| y.updated_at_ms.cmp(&x.updated_at_ms))
            .then_with(|| x.name.cmp(&y.name))
    });
}

fn sort_tier_b(tier: &mut [Candidate]) {
    tier.sort_by(|x, y| {
        y.rag_score
            .cmp(&x.rag_score)
            .then_with(|| y.updated_at_ms.cmp(&x.updated_at_ms))
            .then_with(|| x.name.cmp(&y.name))
    });
}

/// Takes up to 70% of the budget from tier A, then fills from B and C.
fn select(
    tier_a: Vec<Candidate>,
    tier_b: Vec<Candidate>,
    tier_c: Vec<Candidate>,
    limit: usize,
) -> Vec<Candidate> {
    let quota_a = (limit * TIER_A_SHARE_PERCENT).div_ceil(100);
    let mut out: Vec<Candidate> = tier_a.into_iter().take(quota_a.min(limit)).collect();
    for candidate in tier_b.into_iter().chain(tier_c) {
        if out.len() == limit {
            break;
        }
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use catalog_store::{MemoryStore, VersionPut, VersionSelector};
    use registry_model::{OfficialMeta, ProbeMethod, RagEnrichment, RemoteEndpoint, RunMode, ServerRecord};
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    fn candidate(
        name: &str,
        rag_score: u32,
        updated_at: &str,
        checked_at: Option<&str>,
    ) -> Candidate {
        let ms = |s: &str| {
            chrono::DateTime::parse_from_rfc3339(&format!("{s}T00:00:00Z"))
                .unwrap()
                .timestamp_millis()
        };
        Candidate {
            name: name.into(),
            url: format!("https://{name}.example"),
            rag_score,
            server_kind: ServerKind::Retriever,
            updated_at_ms: ms(updated_at),
            checked_at_ms: checked_at.map(ms),
        }
    }

    #[test]
    fn tier_a_rotates_unknown_then_oldest_checked() {
        let mut tier = vec![
            candidate("oldest", 5000, "2026-01-01", Some("2026-01-15")),
            candidate("high-newer", 9000, "2026-03-01", Some("2026-02-01")),
            candidate("same-check-high-updated", 100, "2026-03-10", Some("2026-02-10")),
            candidate("same-check-high-old", 100, "2026-03-01", Some("2026-02-10")),
            candidate("unknown", 10, "2026-03-01", None),
        ];
        sort_tier_a(&mut tier);
        let selected = select(tier, Vec::new(), Vec::new(), 8);
        let names: Vec<&str> = selected.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "unknown",
                "oldest",
                "high-newer",
                "same-check-high-updated",
                "same-check-high-old"
            ]
        );
    }

    #[test]
    fn tier_a_quota_leaves_room_for_lower_tiers() {
        let tier_a: Vec<Candidate> = (0..10)
            .map(|i| candidate(&format!("a{i}"), 50, "2026-01-01", None))
            .collect();
        let tier_b: Vec<Candidate> = (0..5)
            .map(|i| candidate(&format!("b{i}"), 5, "2026-01-01", None))
            .collect();

        let selected = select(tier_a, tier_b, Vec::new(), 10);
        assert_eq!(selected.len(), 10);
        let from_a = selected.iter().filter(|c| c.name.starts_with('a')).count();
        assert_eq!(from_a, 7); // ceil(10 * 0.7)
    }

    #[test]
    fn buckets_split_on_kind_and_score() {
        let mut retriever_strong = candidate("strong", 10, "2026-01-01", None);
        retriever_strong.server_kind = ServerKind::Retriever;
        let mut retriever_weak = candidate("weak", 1, "2026-01-01", None);
        retriever_weak.server_kind = ServerKind::Retriever;
        let mut evaluator = candidate("eval", 90, "2026-01-01", None);
        evaluator.server_kind = ServerKind::Evaluator;
        let mut zero = candidate("zero", 0, "2026-01-01", None);
        zero.server_kind = ServerKind::Retriever;

        let (a, b, c) = bucket(vec![retriever_strong, retriever_weak, evaluator, zero]);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(c.len(), 2);
    }

    struct ScriptedProber {
        outcome: ProbeOutcome,
        calls: Mutex<Vec<String>>,
    }

    impl UrlProber for ScriptedProber {
        fn probe<'a>(
            &'a self,
            url: &'a str,
        ) -> Pin<Box<dyn Future<Output = ProbeOutcome> + Send + 'a>> {
            self.calls.lock().unwrap().push(url.to_string());
            let outcome = self.outcome;
            Box::pin(async move { outcome })
        }
    }

    fn retriever_entry(name: &str, url: &str) -> CatalogEntry {
        CatalogEntry {
            server: ServerRecord {
                name: name.into(),
                version: "1.0.0".into(),
                description: Some("semantic search".into()),
                title: None,
                repository_url: None,
                website_url: None,
                remotes: vec![RemoteEndpoint {
                    kind: "streamable-http".into(),
                    url: url.into(),
                    headers: Vec::new(),
                    extra: serde_json::Map::new(),
                }],
                packages: Vec::new(),
                extra: serde_json::Map::new(),
            },
            official: OfficialMeta(json!({ "isLatest": true })),
            publisher_provided: None,
            ragmap: RagEnrichment {
                rag_score: 23,
                server_kind: ServerKind::Retriever,
                has_remote: Some(true),
                local_only: Some(false),
                embedding_text_hash: "h".into(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn refresh_probes_and_persists_results() {
        let store = MemoryStore::new();
        let run = store.begin_run(RunMode::Full).await.unwrap();
        let entry = retriever_entry("acme/search", "https://mcp.acme.example");
        store
            .mark_server_seen(&run, "acme/search", Utc::now())
            .await
            .unwrap();
        store
            .upsert_server_version(VersionPut {
                run_id: run.clone(),
                at: Utc::now(),
                entry,
                hidden: false,
            })
            .await
            .unwrap();

        let prober = ScriptedProber {
            outcome: ProbeOutcome {
                ok: true,
                status: Some(401),
                method: Some(ProbeMethod::Head),
            },
            calls: Mutex::new(Vec::new()),
        };

        let report = refresh(
            &store,
            &prober,
            &RefreshOptions {
                limit: 10,
                pause: Duration::ZERO,
            },
        )
        .await
        .unwrap();

        assert_eq!(report.candidates, 1);
        assert_eq!(report.checked, 1);
        assert_eq!(report.reachable, 1);
        assert_eq!(
            prober.calls.lock().unwrap().as_slice(),
            ["https://mcp.acme.example"]
        );

        let got = store
            .get_version("acme/search", VersionSelector::Latest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.ragmap.reachable, Some(true));
        assert_eq!(got.ragmap.reachable_status, Some(401));
        assert!(store.last_reachability_run_at().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn entries_without_probe_url_are_not_candidates() {
        let store = MemoryStore::new();
        let run = store.begin_run(RunMode::Full).await.unwrap();
        let mut entry = retriever_entry("acme/local", "ignored");
        entry.server.remotes.clear();
        entry.ragmap.has_remote = Some(false);
        entry.ragmap.local_only = Some(true);
        store
            .mark_server_seen(&run, "acme/local", Utc::now())
            .await
            .unwrap();
        store
            .upsert_server_version(VersionPut {
                run_id: run.clone(),
                at: Utc::now(),
                entry,
                hidden: false,
            })
            .await
            .unwrap();

        let prober = ScriptedProber {
            outcome: ProbeOutcome {
                ok: true,
                status: Some(200),
                method: Some(ProbeMethod::Head),
            },
            calls: Mutex::new(Vec::new()),
        };

        let report = refresh(&store, &prober, &RefreshOptions::default()).await.unwrap();
        assert_eq!(report.candidates, 0);
        assert_eq!(report.checked, 0);
        assert!(prober.calls.lock().unwrap().is_empty());
    }
}
