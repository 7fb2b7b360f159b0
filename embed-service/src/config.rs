//! Embedding provider configuration.

use crate::errors::EmbedError;

/// Which embeddings backend to call, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedProviderKind {
    /// Embeddings are off; `embed` returns `Ok(None)` without side effects.
    Disabled,
    /// Local Ollama runtime, `POST {endpoint}/api/embeddings`.
    Ollama,
    /// OpenAI-compatible API, `POST {endpoint}/v1/embeddings` with Bearer auth.
    OpenAi,
}

/// Configuration for the embedding backend.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    pub provider: EmbedProviderKind,
    /// Base URL of the provider (e.g. http://localhost:11434).
    pub endpoint: String,
    /// Embedding model name (e.g. "nomic-embed-text", "text-embedding-3-small").
    pub model: String,
    /// Required for OpenAI.
    pub api_key: Option<String>,
    /// Expected embedding dimensionality; responses of a different size fail.
    pub dim: Option<usize>,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl EmbedConfig {
    pub fn disabled() -> Self {
        Self {
            provider: EmbedProviderKind::Disabled,
            endpoint: String::new(),
            model: String::new(),
            api_key: None,
            dim: None,
            timeout_secs: 30,
        }
    }

    /// Build `EmbedConfig` from environment variables.
    ///
    /// Recognized vars:
    /// - EMBEDDING_PROVIDER = disabled|ollama|openai (default: disabled)
    /// - EMBEDDING_ENDPOINT, EMBEDDING_MODEL (required unless disabled)
    /// - EMBEDDING_API_KEY (required for openai)
    /// - EMBEDDING_DIM (optional)
    /// - EMBEDDING_TIMEOUT_SECS (default: 30)
    pub fn from_env() -> Result<Self, EmbedError> {
        use std::env;

        let provider = match env::var("EMBEDDING_PROVIDER")
            .unwrap_or_else(|_| "disabled".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "disabled" | "" => return Ok(Self::disabled()),
            "ollama" => EmbedProviderKind::Ollama,
            "openai" => EmbedProviderKind::OpenAi,
            other => {
                return Err(EmbedError::Config(format!(
                    "unknown EMBEDDING_PROVIDER: {other}"
                )));
            }
        };

        let endpoint = must_env("EMBEDDING_ENDPOINT")?;
        validate_http_endpoint("EMBEDDING_ENDPOINT", &endpoint)?;
        let model = must_env("EMBEDDING_MODEL")?;

        let api_key = env::var("EMBEDDING_API_KEY").ok().filter(|k| !k.is_empty());
        if provider == EmbedProviderKind::OpenAi && api_key.is_none() {
            return Err(EmbedError::Config(
                "EMBEDDING_API_KEY is required for the openai provider".into(),
            ));
        }

        let dim = env::var("EMBEDDING_DIM")
            .ok()
            .and_then(|s| s.parse::<usize>().ok());

        let timeout_secs = env::var("EMBEDDING_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(Self {
            provider,
            endpoint,
            model,
            api_key,
            dim,
            timeout_secs,
        })
    }
}

/// Fetches a required, non-empty environment variable.
fn must_env(name: &'static str) -> Result<String, EmbedError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EmbedError::Config(format!(
            "missing required environment variable: {name}"
        ))),
    }
}

fn validate_http_endpoint(var: &'static str, value: &str) -> Result<(), EmbedError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(EmbedError::Config(format!(
            "{var} must start with http:// or https://"
        )))
    }
}
