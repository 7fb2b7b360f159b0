//! Hybrid ranking and read-side projections over the latest catalog.
//!
//! Everything here is CPU-only: callers hand in the latest entries (and,
//! for semantic ranking, a query embedding) and get back ranked hits,
//! install projections or coverage stats. No I/O happens in this crate.

mod engine;
mod filters;
mod install;
mod stats;

pub use engine::{
    HitKind, MAX_QUERY_TOKENS, SearchHit, SearchRequest, cosine, quality_cmp, search, top,
    tokenize_query,
};
pub use filters::{SearchFilters, matches};
pub use install::{
    InstallConfigs, InstallHeader, InstallProjection, RemoteInstall, StdioInstall,
    TransportAvailability, TransportSummary, project_install,
};
pub use stats::{CatalogStats, project_stats};
