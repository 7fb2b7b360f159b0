//! Shared data model for the RAGMap catalog.
//!
//! Every other crate in the workspace works in terms of these types:
//! - [`ServerRecord`] — a normalized MCP server version as published upstream
//! - [`OfficialMeta`] — the upstream registry metadata blob, kept opaque with
//!   typed accessors only for the keys RAGMap interprets
//! - [`RagEnrichment`] — the derived RAG-relevance classification
//! - [`CatalogEntry`] — the canonical serialized form of a server version
//!
//! Wire names are camelCase throughout; unknown fields on upstream payloads
//! round-trip unchanged through the `extra` maps and the opaque blobs.

mod entry;
mod enrichment;
mod official;
mod run;
mod server;

pub use entry::CatalogEntry;
pub use enrichment::{EmbeddingInfo, ProbeMethod, RagEnrichment, ServerKind};
pub use official::OfficialMeta;
pub use run::{RunMeta, RunMode};
pub use server::{
    PackageArgument, PackageRef, PackageTransport, RemoteEndpoint, RemoteHeader, ServerRecord,
    TRANSPORT_SSE, TRANSPORT_STDIO, TRANSPORT_STREAMABLE_HTTP, probe_url,
};
