//! The filter predicate applied before any ranking.

use registry_model::{CatalogEntry, ServerKind};

/// Requested filters; every present field must hold for an entry to pass.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub min_score: Option<u32>,
    /// AND semantics, case-insensitive.
    pub categories: Vec<String>,
    /// `stdio` or `streamable-http`.
    pub transport: Option<String>,
    pub registry_type: Option<String>,
    pub has_remote: Option<bool>,
    pub reachable: Option<bool>,
    pub citations: Option<bool>,
    pub local_only: Option<bool>,
    pub server_kind: Option<ServerKind>,
}

/// Whether `entry` passes every requested filter. Missing enrichment
/// booleans fall back to recomputation from the server record; a missing
/// embedding never excludes an entry.
pub fn matches(entry: &CatalogEntry, filters: &SearchFilters) -> bool {
    if let Some(min) = filters.min_score {
        if entry.ragmap.rag_score < min {
            return false;
        }
    }

    if !filters.categories.is_empty() {
        let all_present = filters.categories.iter().all(|wanted| {
            entry
                .ragmap
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(wanted))
        });
        if !all_present {
            return false;
        }
    }

    if let Some(transport) = &filters.transport {
        let in_packages = entry.server.packages.iter().any(|p| {
            p.transport
                .as_ref()
                .is_some_and(|t| t.kind == *transport)
        });
        let in_remotes = entry.server.remotes.iter().any(|r| r.kind == *transport);
        if !in_packages && !in_remotes {
            return false;
        }
    }

    if let Some(registry_type) = &filters.registry_type {
        let any = entry
            .server
            .packages
            .iter()
            .any(|p| p.registry_type.eq_ignore_ascii_case(registry_type));
        if !any {
            return false;
        }
    }

    let inferred_has_remote = entry
        .ragmap
        .has_remote
        .unwrap_or_else(|| rag_enrich::infer_has_remote(&entry.server));

    if let Some(wanted) = filters.has_remote {
        if inferred_has_remote != wanted {
            return false;
        }
    }

    if let Some(wanted) = filters.local_only {
        let local_only = entry.ragmap.local_only.unwrap_or(!inferred_has_remote);
        if local_only != wanted {
            return false;
        }
    }

    if let Some(wanted) = filters.reachable {
        if (entry.ragmap.reachable == Some(true)) != wanted {
            return false;
        }
    }

    if let Some(wanted) = filters.citations {
        if (entry.ragmap.citations == Some(true)) != wanted {
            return false;
        }
    }

    if let Some(kind) = filters.server_kind {
        if entry.ragmap.server_kind != kind {
            return false;
        }
    }

    true
}
