//! Coverage statistics over the latest catalog.

use chrono::{DateTime, SecondsFormat, Utc};
use registry_model::{CatalogEntry, probe_url};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_latest_servers: usize,
    pub count_rag_score_gte1: usize,
    pub count_rag_score_gte25: usize,
    /// Entries with a remote endpoint and at least one probeable URL.
    pub reachability_candidates: usize,
    pub reachability_known: usize,
    pub reachability_true: usize,
    pub reachability_unknown: usize,
    pub last_successful_ingest_at: Option<String>,
    pub last_reachability_run_at: Option<String>,
}

/// Folds the latest catalog into coverage counts.
pub fn project_stats(
    entries: &[CatalogEntry],
    last_successful_ingest_at: Option<DateTime<Utc>>,
    last_reachability_run_at: Option<DateTime<Utc>>,
) -> CatalogStats {
    let mut gte1 = 0usize;
    let mut gte25 = 0usize;
    let mut candidates = 0usize;
    let mut known = 0usize;
    let mut reachable_true = 0usize;

    for entry in entries {
        if entry.ragmap.rag_score >= 1 {
            gte1 += 1;
        }
        if entry.ragmap.rag_score >= 25 {
            gte25 += 1;
        }

        let has_remote = entry
            .ragmap
            .has_remote
            .unwrap_or_else(|| rag_enrich::infer_has_remote(&entry.server));
        if !has_remote || probe_url(&entry.server).is_none() {
            continue;
        }
        candidates += 1;
        if entry.ragmap.reachability_known() {
            known += 1;
        }
        if entry.ragmap.reachable == Some(true) {
            reachable_true += 1;
        }
    }

    CatalogStats {
        total_latest_servers: entries.len(),
        count_rag_score_gte1: gte1,
        count_rag_score_gte25: gte25,
        reachability_candidates: candidates,
        reachability_known: known,
        reachability_true: reachable_true,
        reachability_unknown: candidates.saturating_sub(known),
        last_successful_ingest_at: last_successful_ingest_at.map(iso),
        last_reachability_run_at: last_reachability_run_at.map(iso),
    }
}

fn iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_model::{OfficialMeta, RagEnrichment, RemoteEndpoint, ServerRecord};
    use serde_json::json;

    fn entry(name: &str, score: u32, remote_url: Option<&str>) -> CatalogEntry {
        let remotes = remote_url
            .map(|url| {
                vec![RemoteEndpoint {
                    kind: "streamable-http".into(),
                    url: url.into(),
                    headers: Vec::new(),
                    extra: serde_json::Map::new(),
                }]
            })
            .unwrap_or_default();
        let has_remote = !remotes.is_empty();
        CatalogEntry {
            server: ServerRecord {
                name: name.into(),
                version: "1.0.0".into(),
                description: None,
                title: None,
                repository_url: None,
                website_url: None,
                remotes,
                packages: Vec::new(),
                extra: serde_json::Map::new(),
            },
            official: OfficialMeta(json!({})),
            publisher_provided: None,
            ragmap: RagEnrichment {
                rag_score: score,
                has_remote: Some(has_remote),
                local_only: Some(!has_remote),
                embedding_text_hash: "h".into(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn buckets_and_reachability_coverage() {
        let mut probed = entry("acme/probed", 40, Some("https://a.example"));
        probed.ragmap.reachable = Some(true);
        probed.ragmap.reachable_checked_at = Some(Utc::now());

        let unprobed = entry("acme/unprobed", 10, Some("https://b.example"));
        let local = entry("acme/local", 1, None);
        let zero = entry("acme/zero", 0, None);

        let stats = project_stats(&[probed, unprobed, local, zero], None, None);
        assert_eq!(stats.total_latest_servers, 4);
        assert_eq!(stats.count_rag_score_gte1, 3);
        assert_eq!(stats.count_rag_score_gte25, 1);
        assert_eq!(stats.reachability_candidates, 2);
        assert_eq!(stats.reachability_known, 1);
        assert_eq!(stats.reachability_true, 1);
        assert_eq!(stats.reachability_unknown, 1);
        assert!(stats.last_successful_ingest_at.is_none());
    }

    #[test]
    fn timestamps_render_as_compact_iso() {
        let t = "2026-03-01T10:00:00Z".parse().unwrap();
        let stats = project_stats(&[], Some(t), None);
        assert_eq!(
            stats.last_successful_ingest_at.as_deref(),
            Some("2026-03-01T10:00:00Z")
        );
    }
}
