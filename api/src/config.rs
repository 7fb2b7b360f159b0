//! Service configuration from environment variables.

use embed_service::EmbedConfig;
use reachability::ReachabilityPolicy;

use crate::error::AppError;

/// Which [`catalog_store::CatalogStore`] implementation backs the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Surreal,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::Surreal => "surreal",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub upstream_url: String,
    pub upstream_timeout_secs: u64,
    pub storage: StorageKind,
    pub surreal_path: Option<String>,
    /// Shared secret for the protected trigger endpoints; unset means the
    /// endpoints answer 500 until configured.
    pub ingest_token: Option<String>,
    pub policy: ReachabilityPolicy,
    pub embedding: EmbedConfig,
}

impl AppConfig {
    /// Build `AppConfig` from environment variables.
    ///
    /// Recognized vars:
    /// - BIND_ADDR (default 0.0.0.0:8080)
    /// - UPSTREAM_REGISTRY_URL (default https://registry.modelcontextprotocol.io)
    /// - UPSTREAM_TIMEOUT_SECS (default 30)
    /// - STORAGE_KIND = memory|surreal (default memory)
    /// - SURREAL_PATH (required for surreal)
    /// - INGEST_TOKEN (optional)
    /// - REACHABILITY_POLICY = strict|loose (default strict)
    /// - EMBEDDING_* (see `embed-service`)
    pub fn from_env() -> Result<Self, AppError> {
        use std::env;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
        let upstream_url = env::var("UPSTREAM_REGISTRY_URL")
            .unwrap_or_else(|_| "https://registry.modelcontextprotocol.io".into());
        let upstream_timeout_secs = env::var("UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        let storage = match env::var("STORAGE_KIND")
            .unwrap_or_else(|_| "memory".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StorageKind::Memory,
            "surreal" => StorageKind::Surreal,
            other => {
                return Err(AppError::Config(format!("unknown STORAGE_KIND: {other}")));
            }
        };

        let surreal_path = env::var("SURREAL_PATH").ok().filter(|p| !p.is_empty());
        if storage == StorageKind::Surreal && surreal_path.is_none() {
            return Err(AppError::MissingEnv("SURREAL_PATH"));
        }

        let ingest_token = env::var("INGEST_TOKEN").ok().filter(|t| !t.trim().is_empty());

        let policy = match env::var("REACHABILITY_POLICY") {
            Ok(raw) => raw
                .parse::<ReachabilityPolicy>()
                .map_err(|_| AppError::Config(format!("unknown REACHABILITY_POLICY: {raw}")))?,
            Err(_) => ReachabilityPolicy::Strict,
        };

        let embedding = EmbedConfig::from_env().map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Self {
            bind_addr,
            upstream_url,
            upstream_timeout_secs,
            storage,
            surreal_path,
            ingest_token,
            policy,
            embedding,
        })
    }
}
